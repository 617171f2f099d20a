//! Crawl history ledger
//!
//! Bounded, append-only record of every terminal crawl outcome. The ledger is
//! also the long-term dedup gate: a URL with a record is never crawled again.
//! Eviction is FIFO once `capacity` is exceeded, while the cumulative byte
//! counter and the lifetime record counter survive eviction.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use super::fingerprint::Fingerprint;
use super::normalize::NormalizedUrl;
use crate::types::HistoryRecord;

pub const LABEL_CRAWLED: &str = "crawled";
pub const LABEL_ROBOTS_DISALLOWED: &str = "robots disallowed";
pub const LABEL_FETCH_FAILED: &str = "fetch failed";
pub const LABEL_FETCH_UNAVAILABLE: &str = "fetch capability unavailable";

/// Persisted form of the ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub records: Vec<HistoryRecord>,
    pub cumulative_size: u64,
    pub total_recorded: u64,
}

#[derive(Debug, Clone)]
pub struct HistoryLedger {
    records: VecDeque<HistoryRecord>,
    /// Fingerprint to id of its most recent record
    index: HashMap<Fingerprint, u64>,
    capacity: usize,
    cumulative_size: u64,
    total_recorded: u64,
}

impl HistoryLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::new(),
            index: HashMap::new(),
            capacity,
            cumulative_size: 0,
            total_recorded: 0,
        }
    }

    /// Rebuild the ledger and its index from a snapshot, applying `capacity`
    pub fn from_snapshot(snapshot: HistorySnapshot, capacity: usize) -> Self {
        let mut ledger = Self::new(capacity);
        ledger.cumulative_size = snapshot.cumulative_size;
        ledger.total_recorded = snapshot.total_recorded;

        for record in snapshot.records {
            ledger.total_recorded = ledger.total_recorded.max(record.id);
            ledger.index.insert(record.url_fingerprint.clone(), record.id);
            ledger.records.push_back(record);
        }
        ledger.purge();
        ledger
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            records: self.records.iter().cloned().collect(),
            cumulative_size: self.cumulative_size,
            total_recorded: self.total_recorded,
        }
    }

    /// Append a terminal outcome for `url`, then purge
    pub fn record(
        &mut self,
        url: &NormalizedUrl,
        status_code: u16,
        outcome_label: &str,
        response_size: u64,
    ) -> HistoryRecord {
        self.cumulative_size += response_size;
        self.total_recorded += 1;

        let record = HistoryRecord {
            id: self.total_recorded,
            url: url.url.clone(),
            url_fingerprint: url.fingerprint.clone(),
            timestamp: Utc::now(),
            status_code,
            outcome_label: outcome_label.to_string(),
            response_size,
            cumulative_size: self.cumulative_size,
        };

        self.index.insert(record.url_fingerprint.clone(), record.id);
        self.records.push_back(record.clone());
        self.purge();
        record
    }

    /// Most recent record for a URL fingerprint
    pub fn find(&self, fingerprint: &Fingerprint) -> Option<&HistoryRecord> {
        let id = *self.index.get(fingerprint)?;
        let front = self.records.front()?.id;
        self.records.get(id.checked_sub(front)? as usize)
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.find(fingerprint).is_some()
    }

    /// Evict the oldest records beyond capacity, always keeping at least one
    pub fn purge(&mut self) -> usize {
        let keep = self.capacity.max(1);
        let mut evicted = 0;

        while self.records.len() > keep {
            let Some(oldest) = self.records.pop_front() else {
                break;
            };
            if self.index.get(&oldest.url_fingerprint) == Some(&oldest.id) {
                self.index.remove(&oldest.url_fingerprint);
            }
            evicted += 1;
        }

        evicted
    }

    pub fn latest(&self) -> Option<&HistoryRecord> {
        self.records.back()
    }

    /// Retained records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records ever written, including evicted ones
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }

    /// Bytes fetched since the ledger's inception
    pub fn cumulative_size(&self) -> u64 {
        self.cumulative_size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
