//! Configuration for SearchOnion

mod crawler;
mod fetch;
mod logging;
mod node;

pub use crawler::{CrawlerConfig, DEFAULT_CRAWL_DELAY_SECS, DOMAIN_MAX_CRAWL_LIMIT, HISTORY_CAPACITY};
pub use fetch::FetchConfig;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use node::NodeConfig;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default user agent for all HTTP requests (robots.txt, sitemaps, pages)
pub const DEFAULT_USER_AGENT: &str = "SearchOnionBot/0.1 (+https://github.com/searchonion)";

/// Main configuration, read once at startup and immutable afterwards
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Storage configuration
    #[serde(default)]
    pub node: NodeConfig,
    /// Frontier limits and loop intervals
    #[serde(default)]
    pub crawler: CrawlerConfig,
    /// Fetch capability settings
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML (used by `init`).
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();
        let crawler = &self.crawler;

        if crawler.domain_max_crawl_limit == 0 {
            errors.push("domain_max_crawl_limit must be positive".to_string());
        }
        if crawler.history_capacity == 0 {
            errors.push("history_capacity must be positive".to_string());
        }
        if crawler.persist_interval == 0 {
            errors.push("persist_interval must be positive".to_string());
        }
        if crawler.default_scheme != "http" && crawler.default_scheme != "https" {
            errors.push(format!(
                "default_scheme must be \"http\" or \"https\", got \"{}\"",
                crawler.default_scheme
            ));
        }
        if !crawler.onion_suffix.starts_with('.') || crawler.onion_suffix.len() < 2 {
            errors.push("onion_suffix must start with '.' followed by a label".to_string());
        }
        for pattern in &crawler.exclude_patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                errors.push(format!("invalid exclude pattern '{}': {}", pattern, e));
            }
        }

        if self.fetch.request_timeout_secs == 0 {
            errors.push("request_timeout_secs must be positive".to_string());
        }
        if self.fetch.max_content_size == 0 {
            errors.push("max_content_size must be positive".to_string());
        }
        if self.fetch.user_agent.trim().is_empty() {
            errors.push("user_agent must not be empty".to_string());
        }

        if self.node.data_dir.as_os_str().is_empty() {
            errors.push("data_dir must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}
