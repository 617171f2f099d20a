//! Politeness store
//!
//! Caches robots.txt per domain and evaluates paths against it. Only the
//! wildcard user-agent block is honored, and paths are matched by prefix:
//! `*` and `$` patterns are not interpreted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use url::{Position, Url};

use super::fingerprint::Fingerprint;
use super::normalize::NormalizedUrl;
use crate::types::DomainStatus;

/// Parsed robots.txt as an ordered list of `(directive, value)` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsTxt {
    directives: Vec<(String, String)>,
}

impl RobotsTxt {
    /// Parse robots.txt content. Unparseable lines are skipped.
    pub fn parse(content: &str) -> Self {
        let mut directives = Vec::new();

        for line in content.lines() {
            let line = match line.split_once('#') {
                Some((before, _)) => before,
                None => line,
            }
            .trim();

            if line.is_empty() {
                continue;
            }

            if let Some((directive, value)) = line.split_once(':') {
                let directive = directive.trim().to_lowercase();
                let value = match directive.as_str() {
                    "allow" | "disallow" => encode_rule_path(value.trim()),
                    _ => value.trim().to_string(),
                };
                directives.push((directive, value));
            }
        }

        Self { directives }
    }

    /// Evaluate a path (with query) against the wildcard user-agent block.
    ///
    /// Directives are applied in order and a later match overrides an earlier one.
    pub fn is_allowed(&self, path: &str) -> bool {
        let mut matches_user_agent = false;
        let mut allowed = true;

        for (directive, value) in &self.directives {
            match directive.as_str() {
                "user-agent" => matches_user_agent = value == "*",
                "allow" if matches_user_agent && !value.is_empty() => {
                    if path.starts_with(value.as_str()) {
                        allowed = true;
                    }
                }
                "disallow" if matches_user_agent && !value.is_empty() => {
                    if path.starts_with(value.as_str()) {
                        allowed = false;
                    }
                }
                _ => {}
            }
        }

        allowed
    }

    /// `Sitemap:` locations, in document order
    pub fn sitemaps(&self) -> Vec<&str> {
        self.directives
            .iter()
            .filter(|(directive, value)| directive == "sitemap" && !value.is_empty())
            .map(|(_, value)| value.as_str())
            .collect()
    }
}

/// Bytes the `url` crate percent-encodes in a path, besides non-ASCII and controls
const PATH_ENCODED: &[u8] = b" \"<>`{}";

/// Encode a rule path the way normalized URL paths are encoded, so that
/// `Disallow: /café` matches the request path `/caf%C3%A9`
fn encode_rule_path(value: &str) -> String {
    let needs_encoding = value
        .bytes()
        .any(|b| !b.is_ascii_graphic() || PATH_ENCODED.contains(&b));
    if !needs_encoding || !value.starts_with('/') {
        return value.to_string();
    }

    match Url::parse("http://robots.invalid/").and_then(|base| base.join(value)) {
        Ok(url) => url[Position::BeforePath..Position::AfterQuery].to_string(),
        Err(_) => value.to_string(),
    }
}

/// Per-domain robots.txt cache and crawl counters, keyed by domain fingerprint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolitenessStore {
    domains: HashMap<Fingerprint, DomainStatus>,
}

impl PolitenessStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted domain statuses
    pub fn from_statuses(statuses: impl IntoIterator<Item = DomainStatus>) -> Self {
        let domains = statuses
            .into_iter()
            .map(|status| (status.domain_fingerprint.clone(), status))
            .collect();
        Self { domains }
    }

    pub fn statuses(&self) -> impl Iterator<Item = &DomainStatus> {
        self.domains.values()
    }

    pub fn get(&self, domain: &str) -> Option<&DomainStatus> {
        self.domains.get(&Fingerprint::of(domain))
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.get(domain).is_some()
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Crawl count for a domain fingerprint; 0 for an unknown domain
    pub fn crawl_count(&self, domain_fingerprint: &Fingerprint) -> u64 {
        self.domains
            .get(domain_fingerprint)
            .map(|status| status.crawl_count)
            .unwrap_or(0)
    }

    /// Insert a status with the given robots.txt unless one already exists.
    ///
    /// Returns `true` only for the call that created the row.
    pub fn create_if_absent(&mut self, domain: &str, robots_txt: String) -> bool {
        let fingerprint = Fingerprint::of(domain);
        match self.domains.entry(fingerprint.clone()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(DomainStatus::new(domain, fingerprint, robots_txt));
                true
            }
        }
    }

    /// Evaluate a URL against its domain's robots.txt.
    ///
    /// Returns `None` when the domain has no status yet: the caller must create
    /// it before a decision can be made.
    pub fn is_allowed(&self, url: &NormalizedUrl) -> Option<bool> {
        self.domains
            .get(&url.domain_fingerprint)
            .map(|status| RobotsTxt::parse(&status.robots_txt).is_allowed(url.path()))
    }

    /// Add `delta` processed URLs to a domain, creating its row if needed
    pub fn update_crawl_count(&mut self, domain: &str, delta: i64) {
        if delta < 1 {
            return;
        }
        let fingerprint = Fingerprint::of(domain);
        let status = self
            .domains
            .entry(fingerprint.clone())
            .or_insert_with(|| DomainStatus::new(domain, fingerprint, String::new()));
        status.crawl_count += delta as u64;
        status.last_crawl_time = Utc::now();
    }

    /// Record that a request was just made against the domain
    pub fn touch(&mut self, domain: &str) {
        if let Some(status) = self.domains.get_mut(&Fingerprint::of(domain)) {
            status.last_crawl_time = Utc::now();
        }
    }

    /// Time left before the domain may be fetched again
    pub fn crawl_delay_remaining(&self, domain: &str, delay: Duration, now: DateTime<Utc>) -> Duration {
        let Some(status) = self.get(domain) else {
            return Duration::ZERO;
        };
        let elapsed = (now - status.last_crawl_time).to_std().unwrap_or(Duration::ZERO);
        delay.saturating_sub(elapsed)
    }
}

/// Location of a domain's robots.txt, without protocol
pub fn robots_url(domain: &str) -> String {
    format!("{}/robots.txt", domain)
}
