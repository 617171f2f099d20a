//! URL crawl frontier
//!
//! Decides which URLs to fetch, enforces per-domain politeness and capacity
//! limits, deduplicates against crawl history and seeds the queue from
//! sitemaps.
//!
//! Key components:
//! - `normalize`: protocol-less URL normalization and validation
//! - `Fingerprint`: SHA-256 dedup key shared by every store
//! - `PolitenessStore`: per-domain robots.txt cache and rule evaluation
//! - `HistoryLedger`: bounded record of every terminal crawl outcome
//! - `FrontierQueue`: FIFO work queue with capacity-checked admission
//! - `sitemap`: XML / plain-text sitemap ingestion
//! - `OnionRegistry`: domains deferred until a capable fetcher exists
//! - `Crawler`: the control loop tying them together

pub mod fetcher;
pub mod fingerprint;
pub mod frontier;
pub mod history;
pub mod links;
pub mod normalize;
pub mod onion;
pub mod orchestrator;
pub mod politeness;
pub mod sitemap;
pub mod store;

pub use fetcher::{Fetch, FetchError, FetchResponse, HttpFetcher};
pub use fingerprint::Fingerprint;
pub use frontier::FrontierQueue;
pub use history::HistoryLedger;
pub use normalize::{is_valid_url, normalize, remove_protocol, InvalidUrl, NormalizedUrl};
pub use onion::OnionRegistry;
pub use orchestrator::{CrawlError, CrawlStats, Crawler, CrawlerState, StopHandle};
pub use politeness::{PolitenessStore, RobotsTxt};
pub use sitemap::{SitemapError, SitemapIngest};
pub use store::{CrawlStores, StoreError, StoreSummary, SubmitOutcome};
