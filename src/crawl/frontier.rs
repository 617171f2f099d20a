//! Frontier queue
//!
//! The live work queue, FIFO by insertion. Admission is gated by fingerprint
//! dedup against live entries, the per-domain cap (queued plus crawled) and the
//! history ledger. Entries are keyed by a monotonic sequence number so that
//! head-of-queue is the earliest admission.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use super::fingerprint::Fingerprint;
use super::history::HistoryLedger;
use super::normalize::{normalize, NormalizedUrl};
use super::politeness::PolitenessStore;
use crate::types::{Admission, FrontierEntry, RejectReason};

#[derive(Debug, Clone)]
pub struct FrontierQueue {
    entries: BTreeMap<u64, FrontierEntry>,
    by_fingerprint: HashMap<Fingerprint, u64>,
    /// Live entries per domain fingerprint
    domain_counts: HashMap<Fingerprint, usize>,
    next_seq: u64,
    domain_limit: usize,
}

impl FrontierQueue {
    pub fn new(domain_limit: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            by_fingerprint: HashMap::new(),
            domain_counts: HashMap::new(),
            next_seq: 0,
            domain_limit,
        }
    }

    /// Rebuild from persisted entries, preserving their order
    pub fn from_entries(entries: impl IntoIterator<Item = FrontierEntry>, domain_limit: usize) -> Self {
        let mut queue = Self::new(domain_limit);
        for entry in entries {
            queue.insert_entry(entry);
        }
        queue
    }

    /// Live entries in queue order
    pub fn entries(&self) -> impl Iterator<Item = &FrontierEntry> {
        self.entries.values()
    }

    /// Admit a single URL.
    ///
    /// With `force`, the domain cap and history checks are skipped; only a
    /// live duplicate prevents insertion.
    pub fn admit(
        &mut self,
        raw: &str,
        force: bool,
        domains: &PolitenessStore,
        history: &HistoryLedger,
    ) -> Admission {
        let url = match normalize(raw) {
            Ok(url) => url,
            Err(_) => return Admission::Rejected(RejectReason::InvalidUrl),
        };

        if self.by_fingerprint.contains_key(&url.fingerprint) {
            return Admission::AlreadyQueued;
        }

        if !force {
            let in_flight = self.domain_queue_count(&url.domain_fingerprint) as u64;
            let crawled = domains.crawl_count(&url.domain_fingerprint);
            if in_flight + crawled >= self.domain_limit as u64 {
                return Admission::Rejected(RejectReason::DomainLimitExceeded);
            }
            if history.contains(&url.fingerprint) {
                return Admission::Rejected(RejectReason::AlreadyCrawled);
            }
        }

        self.insert(url)
    }

    /// Bulk admission that never pushes a domain past its cap.
    ///
    /// The remaining budget per domain is computed once up front; URLs beyond
    /// it are dropped. Returns the number of URLs admitted.
    pub fn admit_batch<'a>(
        &mut self,
        urls: impl IntoIterator<Item = &'a str>,
        domains: &PolitenessStore,
        history: &HistoryLedger,
    ) -> usize {
        let mut budgets: HashMap<Fingerprint, u64> = HashMap::new();
        let mut admitted = 0;

        for raw in urls {
            let Ok(url) = normalize(raw) else {
                continue;
            };

            let limit = self.domain_limit as u64;
            let in_flight = self.domain_queue_count(&url.domain_fingerprint) as u64;
            let budget = budgets
                .entry(url.domain_fingerprint.clone())
                .or_insert_with(|| {
                    limit.saturating_sub(domains.crawl_count(&url.domain_fingerprint) + in_flight)
                });

            if *budget == 0 {
                continue;
            }
            if self.admit(&url.url, true, domains, history).is_admitted() {
                *budget -= 1;
                admitted += 1;
            }
        }

        admitted
    }

    /// Earliest-inserted live entry, without removing it
    pub fn peek_next(&self) -> Option<&FrontierEntry> {
        self.entries.values().next()
    }

    /// Remove the live entry for a URL, if any. Invalid URLs are a no-op.
    pub fn remove(&mut self, raw: &str) -> bool {
        match normalize(raw) {
            Ok(url) => self.remove_fingerprint(&url.fingerprint),
            Err(_) => false,
        }
    }

    /// Remove the live entry with this fingerprint, if any
    pub fn remove_fingerprint(&mut self, fingerprint: &Fingerprint) -> bool {
        let Some(seq) = self.by_fingerprint.remove(fingerprint) else {
            return false;
        };
        if let Some(entry) = self.entries.remove(&seq) {
            if let Entry::Occupied(mut count) = self.domain_counts.entry(entry.domain_fingerprint) {
                *count.get_mut() -= 1;
                if *count.get() == 0 {
                    count.remove();
                }
            }
        }
        true
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live entries for a domain fingerprint
    pub fn domain_queue_count(&self, domain_fingerprint: &Fingerprint) -> usize {
        self.domain_counts.get(domain_fingerprint).copied().unwrap_or(0)
    }

    pub fn domain_limit(&self) -> usize {
        self.domain_limit
    }

    fn insert(&mut self, url: NormalizedUrl) -> Admission {
        let entry = FrontierEntry {
            url: url.url,
            fingerprint: url.fingerprint,
            domain: url.domain,
            domain_fingerprint: url.domain_fingerprint,
        };
        if self.insert_entry(entry) {
            Admission::Admitted
        } else {
            Admission::AlreadyQueued
        }
    }

    fn insert_entry(&mut self, entry: FrontierEntry) -> bool {
        match self.by_fingerprint.entry(entry.fingerprint.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let seq = self.next_seq;
                self.next_seq += 1;
                slot.insert(seq);
                *self
                    .domain_counts
                    .entry(entry.domain_fingerprint.clone())
                    .or_insert(0) += 1;
                self.entries.insert(seq, entry);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::history::LABEL_CRAWLED;

    fn stores() -> (PolitenessStore, HistoryLedger) {
        (PolitenessStore::new(), HistoryLedger::new(100))
    }

    #[test]
    fn admit_twice_is_idempotent() {
        let (domains, history) = stores();
        let mut queue = FrontierQueue::new(10);

        assert_eq!(queue.admit("https://example.com/a", false, &domains, &history), Admission::Admitted);
        assert_eq!(queue.admit("http://example.com/a", false, &domains, &history), Admission::AlreadyQueued);
        assert_eq!(queue.size(), 1);
    }

    #[test]
    fn rejects_invalid_url() {
        let (domains, history) = stores();
        let mut queue = FrontierQueue::new(10);
        assert_eq!(
            queue.admit("not a url", false, &domains, &history),
            Admission::Rejected(RejectReason::InvalidUrl)
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn rejects_already_crawled_even_with_empty_queue() {
        let (domains, mut history) = stores();
        history.record(&normalize("example.com/a").unwrap(), 200, LABEL_CRAWLED, 1);
        let mut queue = FrontierQueue::new(10);

        assert_eq!(
            queue.admit("example.com/a", false, &domains, &history),
            Admission::Rejected(RejectReason::AlreadyCrawled)
        );
    }

    #[test]
    fn enforces_domain_cap_with_queue_and_crawl_count() {
        let (mut domains, history) = stores();
        let mut queue = FrontierQueue::new(3);
        domains.update_crawl_count("example.com", 1);

        assert!(queue.admit("example.com/a", false, &domains, &history).is_admitted());
        assert!(queue.admit("example.com/b", false, &domains, &history).is_admitted());
        assert_eq!(
            queue.admit("example.com/c", false, &domains, &history),
            Admission::Rejected(RejectReason::DomainLimitExceeded)
        );
        assert!(queue.admit("other.org/c", false, &domains, &history).is_admitted());
    }

    #[test]
    fn force_bypasses_cap_and_history() {
        let (domains, mut history) = stores();
        history.record(&normalize("example.com/old").unwrap(), 200, LABEL_CRAWLED, 1);
        let mut queue = FrontierQueue::new(1);

        assert!(queue.admit("example.com/a", true, &domains, &history).is_admitted());
        assert!(queue.admit("example.com/old", true, &domains, &history).is_admitted());
        assert_eq!(queue.admit("example.com/a", true, &domains, &history), Admission::AlreadyQueued);
    }

    #[test]
    fn peek_is_fifo_and_non_destructive() {
        let (domains, history) = stores();
        let mut queue = FrontierQueue::new(10);
        assert!(queue.peek_next().is_none());

        queue.admit("example.com/first", false, &domains, &history);
        queue.admit("example.com/second", false, &domains, &history);

        assert_eq!(queue.peek_next().unwrap().url, "example.com/first");
        assert_eq!(queue.peek_next().unwrap().url, "example.com/first");
        assert!(queue.remove("https://example.com/first"));
        assert_eq!(queue.peek_next().unwrap().url, "example.com/second");
    }

    #[test]
    fn remove_is_idempotent_and_frees_domain_slot() {
        let (domains, history) = stores();
        let mut queue = FrontierQueue::new(1);
        queue.admit("example.com/a", false, &domains, &history);
        let domain_fp = Fingerprint::of("example.com");
        assert_eq!(queue.domain_queue_count(&domain_fp), 1);

        assert!(queue.remove("example.com/a"));
        assert!(!queue.remove("example.com/a"));
        assert!(!queue.remove("garbage"));
        assert_eq!(queue.domain_queue_count(&domain_fp), 0);
        assert!(queue.admit("example.com/b", false, &domains, &history).is_admitted());
    }

    #[test]
    fn batch_respects_remaining_budget() {
        let (mut domains, history) = stores();
        let mut queue = FrontierQueue::new(4);
        domains.update_crawl_count("example.com", 1);
        queue.admit("example.com/queued", false, &domains, &history);

        let urls = [
            "example.com/1",
            "example.com/2",
            "example.com/3",
            "example.com/4",
            "other.org/1",
            "bogus",
        ];
        let admitted = queue.admit_batch(urls, &domains, &history);

        assert_eq!(admitted, 3);
        assert_eq!(queue.domain_queue_count(&Fingerprint::of("example.com")), 3);
        assert_eq!(queue.domain_queue_count(&Fingerprint::of("other.org")), 1);
    }

    #[test]
    fn batch_admits_nothing_for_capped_domain() {
        let (mut domains, history) = stores();
        let mut queue = FrontierQueue::new(2);
        domains.update_crawl_count("example.com", 2);

        let admitted = queue.admit_batch(["example.com/x", "example.com/y"], &domains, &history);
        assert_eq!(admitted, 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn duplicates_in_batch_do_not_consume_budget() {
        let (domains, history) = stores();
        let mut queue = FrontierQueue::new(2);
        let admitted = queue.admit_batch(
            ["example.com/a", "https://example.com/a", "example.com/b"],
            &domains,
            &history,
        );
        assert_eq!(admitted, 2);
    }

    #[test]
    fn rebuild_preserves_order_and_counts() {
        let (domains, history) = stores();
        let mut queue = FrontierQueue::new(10);
        queue.admit("example.com/1", false, &domains, &history);
        queue.admit("other.org/1", false, &domains, &history);
        queue.admit("example.com/2", false, &domains, &history);
        queue.remove("example.com/1");

        let saved: Vec<FrontierEntry> = queue.entries().cloned().collect();
        let restored = FrontierQueue::from_entries(saved, 10);

        let order: Vec<&str> = restored.entries().map(|e| e.url.as_str()).collect();
        assert_eq!(order, vec!["other.org/1", "example.com/2"]);
        assert_eq!(restored.domain_queue_count(&Fingerprint::of("example.com")), 1);
    }
}
