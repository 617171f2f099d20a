use anyhow::Result;
use searchonion::config::Config;

use super::load_stores;

pub async fn show_queue(config: Config) -> Result<()> {
    let stores = load_stores(&config)?;
    let summary = stores.summary();

    println!("Crawl queue size: {}", summary.queue_size);
    if let Some(next) = stores.queue.peek_next() {
        println!("Next URL: {}", next.url);
    }
    Ok(())
}

pub async fn show_history(config: Config) -> Result<()> {
    let stores = load_stores(&config)?;
    let summary = stores.summary();

    println!("\nCrawl History:");
    println!("==============");
    println!("URLs processed: {}", summary.processed);
    println!("Bytes fetched: {}", summary.cumulative_bytes);
    println!(
        "Records retained: {} (capacity {})",
        summary.retained_history,
        stores.history.capacity()
    );
    println!("Known domains: {}", summary.known_domains);
    println!("Deferred onion domains: {}", summary.onion_domains);

    if let Some(latest) = stores.history.latest() {
        println!(
            "Latest: {} [{} {}] at {}",
            latest.url,
            latest.status_code,
            latest.outcome_label,
            latest.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}
