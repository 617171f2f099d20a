//! Crawl frontier configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum number of URLs (queued + already crawled) permitted per domain
pub const DOMAIN_MAX_CRAWL_LIMIT: usize = 1024;

/// Number of history records retained before the oldest are purged
pub const HISTORY_CAPACITY: usize = 1_000_000;

/// Seconds to wait between two fetches against the same domain
pub const DEFAULT_CRAWL_DELAY_SECS: u64 = 2;

/// Crawler limits, intervals and link filters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Domain cap: queued plus crawled URLs allowed per domain
    pub domain_max_crawl_limit: usize,
    /// History ledger retention
    pub history_capacity: usize,
    /// Minimum delay between fetches to the same domain (seconds)
    pub crawl_delay_secs: u64,
    /// Sleep when the frontier is empty (seconds)
    pub empty_queue_backoff_secs: u64,
    /// Sleep after an unexpected failure in a single URL's pipeline (seconds)
    pub error_backoff_secs: u64,
    /// Grace period after an interrupt before the crawler reports stopped (seconds)
    pub interrupt_grace_secs: u64,
    /// Persist the stores every N loop iterations
    pub persist_interval: u64,
    /// Scheme used when fetching protocol-less frontier URLs
    pub default_scheme: String,
    /// Domain suffix that requires a fetch capability we do not have
    pub onion_suffix: String,
    /// Regex patterns; matching links are never admitted
    pub exclude_patterns: Vec<String>,
}

impl CrawlerConfig {
    pub fn crawl_delay(&self) -> Duration {
        Duration::from_secs(self.crawl_delay_secs)
    }

    pub fn empty_queue_backoff(&self) -> Duration {
        Duration::from_secs(self.empty_queue_backoff_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }

    pub fn interrupt_grace(&self) -> Duration {
        Duration::from_secs(self.interrupt_grace_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            domain_max_crawl_limit: DOMAIN_MAX_CRAWL_LIMIT,
            history_capacity: HISTORY_CAPACITY,
            crawl_delay_secs: DEFAULT_CRAWL_DELAY_SECS,
            empty_queue_backoff_secs: 60,
            error_backoff_secs: 10,
            interrupt_grace_secs: 5,
            persist_interval: 25,
            default_scheme: "https".to_string(),
            onion_suffix: ".onion".to_string(),
            exclude_patterns: vec![
                r"(?i)\.(jpe?g|png|gif|svg|webp|ico)$".to_string(),
                r"(?i)\.(zip|tar|gz|7z|rar|exe|dmg|iso)$".to_string(),
                r"(?i)\.(mp3|mp4|avi|mov|pdf)$".to_string(),
            ],
        }
    }
}
