//! CLI subcommands

mod add;
mod init;
mod run;
mod status;

pub use add::add_url;
pub use init::init_config;
pub use run::run_crawler;
pub use status::{show_history, show_queue};

use anyhow::{Context, Result};
use searchonion::{config::Config, crawl::CrawlStores};

/// Load the persisted stores from the configured data directory
fn load_stores(config: &Config) -> Result<CrawlStores> {
    CrawlStores::load(&config.node.data_dir, &config.crawler).with_context(|| {
        format!(
            "Failed to load crawl stores from {}",
            config.node.data_dir.display()
        )
    })
}
