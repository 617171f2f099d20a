//! Persistence of the crawl stores
//!
//! The frontier (queue + domain statuses), the history ledger and the onion
//! registry are kept in three separate JSON snapshots inside the data
//! directory. Each file is written to a temp file and renamed into place, so a
//! crash mid-save leaves the previous snapshot intact.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use super::frontier::FrontierQueue;
use super::history::{HistoryLedger, HistorySnapshot};
use super::onion::OnionRegistry;
use super::politeness::PolitenessStore;
use super::sitemap::{self, SitemapError, SitemapFormat, SitemapIngest};
use crate::config::CrawlerConfig;
use crate::types::{Admission, DomainStatus, FrontierEntry, OnionDomainRecord, RejectReason};

pub const FRONTIER_FILE: &str = "frontier.json";
pub const HISTORY_FILE: &str = "history.json";
pub const REGISTRY_FILE: &str = "registry.json";

const SNAPSHOT_VERSION: u32 = 1;

/// Errors that can occur while loading or saving the stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FrontierSnapshot {
    #[serde(default)]
    version: u32,
    queue: Vec<FrontierEntry>,
    domains: Vec<DomainStatus>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistrySnapshot {
    #[serde(default)]
    version: u32,
    onions: Vec<OnionDomainRecord>,
}

/// What the command interface reports for a user-submitted URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Malformed,
    AlreadyKnown,
    DomainLimitReached,
    Accepted,
}

impl fmt::Display for SubmitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            SubmitOutcome::Malformed => "malformed URL",
            SubmitOutcome::AlreadyKnown => "already known",
            SubmitOutcome::DomainLimitReached => "domain limit reached",
            SubmitOutcome::Accepted => "accepted",
        };
        f.write_str(message)
    }
}

impl From<Admission> for SubmitOutcome {
    fn from(admission: Admission) -> Self {
        match admission {
            Admission::Admitted => SubmitOutcome::Accepted,
            Admission::AlreadyQueued | Admission::Rejected(RejectReason::AlreadyCrawled) => {
                SubmitOutcome::AlreadyKnown
            }
            Admission::Rejected(RejectReason::InvalidUrl) => SubmitOutcome::Malformed,
            Admission::Rejected(RejectReason::DomainLimitExceeded) => SubmitOutcome::DomainLimitReached,
        }
    }
}

/// Aggregate counts for status reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSummary {
    pub queue_size: usize,
    pub known_domains: usize,
    pub onion_domains: usize,
    /// Terminal outcomes ever recorded
    pub processed: u64,
    pub retained_history: usize,
    pub cumulative_bytes: u64,
}

/// The four crawl stores, joined only by fingerprint
#[derive(Debug, Clone)]
pub struct CrawlStores {
    pub queue: FrontierQueue,
    pub domains: PolitenessStore,
    pub history: HistoryLedger,
    pub onions: OnionRegistry,
}

impl CrawlStores {
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            queue: FrontierQueue::new(config.domain_max_crawl_limit),
            domains: PolitenessStore::new(),
            history: HistoryLedger::new(config.history_capacity),
            onions: OnionRegistry::new(),
        }
    }

    /// Load all stores from `dir`. Missing snapshot files yield empty stores.
    pub fn load(dir: &Path, config: &CrawlerConfig) -> Result<Self, StoreError> {
        let frontier: FrontierSnapshot = read_snapshot(&dir.join(FRONTIER_FILE))?;
        let history: HistorySnapshot = read_snapshot(&dir.join(HISTORY_FILE))?;
        let registry: RegistrySnapshot = read_snapshot(&dir.join(REGISTRY_FILE))?;

        for (name, version) in [(FRONTIER_FILE, frontier.version), (REGISTRY_FILE, registry.version)] {
            if version > SNAPSHOT_VERSION {
                warn!(
                    "{} version {} is newer than supported {}",
                    name, version, SNAPSHOT_VERSION
                );
            }
        }

        let stores = Self {
            queue: FrontierQueue::from_entries(frontier.queue, config.domain_max_crawl_limit),
            domains: PolitenessStore::from_statuses(frontier.domains),
            history: HistoryLedger::from_snapshot(history, config.history_capacity),
            onions: OnionRegistry::from_records(registry.onions),
        };

        debug!(
            "Loaded stores from {}: {} queued, {} domains, {} history records",
            dir.display(),
            stores.queue.size(),
            stores.domains.len(),
            stores.history.len()
        );
        Ok(stores)
    }

    /// Write all three snapshots into `dir`
    pub fn save(&self, dir: &Path) -> Result<(), StoreError> {
        fs::create_dir_all(dir)?;

        let frontier = FrontierSnapshot {
            version: SNAPSHOT_VERSION,
            queue: self.queue.entries().cloned().collect(),
            domains: self.domains.statuses().cloned().collect(),
        };
        let registry = RegistrySnapshot {
            version: SNAPSHOT_VERSION,
            onions: self.onions.records().into_iter().cloned().collect(),
        };

        write_snapshot(&dir.join(FRONTIER_FILE), &frontier)?;
        write_snapshot(&dir.join(HISTORY_FILE), &self.history.snapshot())?;
        write_snapshot(&dir.join(REGISTRY_FILE), &registry)?;
        Ok(())
    }

    /// Capacity-checked admission of a single URL
    pub fn admit(&mut self, raw: &str) -> Admission {
        self.queue.admit(raw, false, &self.domains, &self.history)
    }

    /// Admission on behalf of a user, mapped to what they are told
    pub fn submit(&mut self, raw: &str) -> SubmitOutcome {
        self.admit(raw).into()
    }

    /// Ingest a fetched sitemap body, picking the format from its location
    pub fn ingest_sitemap(
        &mut self,
        location: &str,
        body: &str,
    ) -> Result<SitemapIngest, SitemapError> {
        let limit = self.queue.domain_limit();
        match SitemapFormat::detect(location, body) {
            SitemapFormat::Xml => {
                sitemap::ingest_xml(body, limit, &mut self.queue, &self.domains, &self.history)
            }
            SitemapFormat::Txt => Ok(SitemapIngest {
                admitted: sitemap::ingest_txt(body, limit, &mut self.queue, &self.domains, &self.history),
                nested: Vec::new(),
            }),
        }
    }

    pub fn summary(&self) -> StoreSummary {
        StoreSummary {
            queue_size: self.queue.size(),
            known_domains: self.domains.len(),
            onion_domains: self.onions.len(),
            processed: self.history.total_recorded(),
            retained_history: self.history.len(),
            cumulative_bytes: self.history.cumulative_size(),
        }
    }
}

fn read_snapshot<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn write_snapshot<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let encoded = serde_json::to_vec(value)?;

    let temp_path = path.with_extension("json.tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(&encoded)?;
    file.sync_all()?;

    fs::rename(temp_path, path)?;
    Ok(())
}
