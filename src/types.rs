//! Core record types shared by the crawl stores

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crawl::Fingerprint;

// ============================================================================
// Persisted Records
// ============================================================================

/// A live URL awaiting a crawl attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierEntry {
    /// Normalized, protocol-less URL
    pub url: String,
    pub fingerprint: Fingerprint,
    pub domain: String,
    pub domain_fingerprint: Fingerprint,
}

/// Per-domain politeness state, created on first sighting of a domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainStatus {
    pub domain: String,
    pub domain_fingerprint: Fingerprint,
    /// URLs successfully processed for this domain; never decremented
    pub crawl_count: u64,
    pub last_crawl_time: DateTime<Utc>,
    /// Raw robots.txt text; empty means allow everything
    pub robots_txt: String,
}

impl DomainStatus {
    pub fn new(domain: &str, domain_fingerprint: Fingerprint, robots_txt: String) -> Self {
        Self {
            domain: domain.to_string(),
            domain_fingerprint,
            crawl_count: 0,
            last_crawl_time: Utc::now(),
            robots_txt,
        }
    }
}

/// A terminal crawl outcome in the history ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Monotonic record id; the latest id is the lifetime processed count
    pub id: u64,
    pub url: String,
    pub url_fingerprint: Fingerprint,
    pub timestamp: DateTime<Utc>,
    /// HTTP status of the fetch, or 0 when nothing was fetched
    pub status_code: u16,
    pub outcome_label: String,
    pub response_size: u64,
    /// Running total of `response_size` since the ledger's inception
    pub cumulative_size: u64,
}

/// A domain deferred until a capable fetcher exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnionDomainRecord {
    pub domain: String,
    pub domain_fingerprint: Fingerprint,
    pub first_seen: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
}

// ============================================================================
// Typed Outcomes
// ============================================================================

/// Why a URL was not admitted into the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    InvalidUrl,
    DomainLimitExceeded,
    AlreadyCrawled,
}

/// Result of a frontier admission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    AlreadyQueued,
    Rejected(RejectReason),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

/// Terminal result of running one URL through the crawl pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    InvalidUrl,
    AlreadyCrawled,
    OnionUnsupported,
    RobotsDisallowed,
    FetchFailed,
    Crawled {
        status_code: u16,
        links_admitted: usize,
    },
}

impl fmt::Display for CrawlOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlOutcome::InvalidUrl => write!(f, "invalid URL"),
            CrawlOutcome::AlreadyCrawled => write!(f, "already crawled"),
            CrawlOutcome::OnionUnsupported => write!(f, "onion unsupported"),
            CrawlOutcome::RobotsDisallowed => write!(f, "robots disallowed"),
            CrawlOutcome::FetchFailed => write!(f, "fetch failed"),
            CrawlOutcome::Crawled {
                status_code,
                links_admitted,
            } => write!(f, "crawled ({}, {} links admitted)", status_code, links_admitted),
        }
    }
}
