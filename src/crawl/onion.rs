//! Onion domain registry
//!
//! Domains that need a fetch capability we don't have yet. They are recorded
//! on first sighting and short-circuited out of the active frontier.

use chrono::Utc;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::fingerprint::Fingerprint;
use crate::types::OnionDomainRecord;

#[derive(Debug, Clone, Default)]
pub struct OnionRegistry {
    domains: HashMap<Fingerprint, OnionDomainRecord>,
}

impl OnionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = OnionDomainRecord>) -> Self {
        let domains = records
            .into_iter()
            .map(|record| (record.domain_fingerprint.clone(), record))
            .collect();
        Self { domains }
    }

    /// Records sorted by first sighting
    pub fn records(&self) -> Vec<&OnionDomainRecord> {
        let mut records: Vec<_> = self.domains.values().collect();
        records.sort_by(|a, b| a.first_seen.cmp(&b.first_seen).then_with(|| a.domain.cmp(&b.domain)));
        records
    }

    /// Register a domain on first sighting. Returns `true` if it was new.
    pub fn register_if_absent(&mut self, domain: &str) -> bool {
        let fingerprint = Fingerprint::of(domain);
        match self.domains.entry(fingerprint.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(OnionDomainRecord {
                    domain: domain.to_string(),
                    domain_fingerprint: fingerprint,
                    first_seen: Utc::now(),
                    working: None,
                    last_checked: None,
                });
                true
            }
        }
    }

    /// Mark a registered domain's reachability. Unknown domains are left alone.
    pub fn update_status(&mut self, domain: &str, working: bool) -> bool {
        match self.domains.get_mut(&Fingerprint::of(domain)) {
            Some(record) => {
                record.working = Some(working);
                record.last_checked = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    pub fn get(&self, domain: &str) -> Option<&OnionDomainRecord> {
        self.domains.get(&Fingerprint::of(domain))
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}
