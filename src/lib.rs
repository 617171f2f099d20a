//! SearchOnion: a URL crawl frontier
//!
//! Decides which URLs to fetch next, featuring:
//! - Protocol-less URL normalization with SHA-256 fingerprints as dedup keys
//! - Per-domain robots.txt politeness and crawl caps
//! - A bounded crawl history ledger that doubles as the long-term dedup gate
//! - XML and plain-text sitemap seeding
//! - Deferral of `.onion` domains until a capable fetcher exists

pub mod config;
pub mod crawl;
pub mod types;

pub use config::Config;
pub use types::*;
