use anyhow::{Context, Result};
use parking_lot::RwLock;
use searchonion::{
    config::Config,
    crawl::{Crawler, HttpFetcher},
};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use super::load_stores;

pub async fn run_crawler(config: Config, seeds: Vec<String>) -> Result<()> {
    let mut stores = load_stores(&config)?;

    for seed in &seeds {
        let outcome = stores.submit(seed);
        info!("Seed {}: {}", seed, outcome);
    }

    info!(
        "Starting crawler with {} queued URLs, {} known domains",
        stores.queue.size(),
        stores.domains.len()
    );
    info!("Data directory: {}", config.node.data_dir.display());

    let fetcher = HttpFetcher::new(&config.fetch).context("Failed to build HTTP client")?;
    let crawler = Crawler::new(&config, Arc::new(RwLock::new(stores)), Arc::new(fetcher))?;

    let handle = crawler.stop_handle();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => handle.interrupt(),
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    crawler.run().await;

    let summary = crawler.stores().read().summary();
    println!(
        "Crawler stopped. Queue: {}, processed: {}",
        summary.queue_size, summary.processed
    );
    Ok(())
}
