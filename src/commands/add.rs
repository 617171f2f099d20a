use anyhow::{Context, Result};
use searchonion::{config::Config, crawl::SubmitOutcome};

use super::load_stores;

pub async fn add_url(config: Config, url: String) -> Result<()> {
    let mut stores = load_stores(&config)?;

    let outcome = stores.submit(&url);
    if outcome == SubmitOutcome::Accepted {
        stores
            .save(&config.node.data_dir)
            .context("Failed to save crawl stores")?;
    }

    println!("{}: {}", url.trim(), outcome);
    Ok(())
}
