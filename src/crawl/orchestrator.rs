//! Crawl orchestrator
//!
//! The control loop: peek the head of the frontier, run it through the
//! pipeline, record the outcome. The orchestrator is the only writer across
//! the stores. A stop request is observed between iterations, never mid-fetch,
//! and backoff sleeps wake early when a stop arrives.

use chrono::Utc;
use futures::FutureExt;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::fetcher::Fetch;
use super::fingerprint::Fingerprint;
use super::history::{
    LABEL_CRAWLED, LABEL_FETCH_FAILED, LABEL_FETCH_UNAVAILABLE, LABEL_ROBOTS_DISALLOWED,
};
use super::links::{extract_links, resolve_link, LinkFilter};
use super::normalize::{normalize, NormalizedUrl};
use super::politeness::{robots_url, RobotsTxt};
use super::sitemap::resolve_location;
use super::store::{CrawlStores, StoreError};
use crate::config::{Config, CrawlerConfig};
use crate::types::CrawlOutcome;

/// Unexpected failures in a single URL's pipeline
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("no domain status for {0} after creating it")]
    MissingDomainStatus(String),

    #[error("invalid exclude pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("pipeline panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlerState {
    Stopped,
    Running,
}

/// Per-session counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub iterations: u64,
    pub crawled: u64,
    pub invalid: u64,
    pub already_crawled: u64,
    pub onion_deferred: u64,
    pub robots_disallowed: u64,
    pub fetch_failed: u64,
    pub links_admitted: u64,
    pub sitemap_urls_admitted: u64,
    pub unexpected_failures: u64,
}

impl CrawlStats {
    fn record(&mut self, outcome: &CrawlOutcome) {
        match outcome {
            CrawlOutcome::InvalidUrl => self.invalid += 1,
            CrawlOutcome::AlreadyCrawled => self.already_crawled += 1,
            CrawlOutcome::OnionUnsupported => self.onion_deferred += 1,
            CrawlOutcome::RobotsDisallowed => self.robots_disallowed += 1,
            CrawlOutcome::FetchFailed => self.fetch_failed += 1,
            CrawlOutcome::Crawled { links_admitted, .. } => {
                self.crawled += 1;
                self.links_admitted += *links_admitted as u64;
            }
        }
    }
}

impl fmt::Display for CrawlStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} iterations, {} crawled, {} links admitted, {} sitemap URLs, {} disallowed, {} fetch failures, {} onion, {} unexpected failures",
            self.iterations,
            self.crawled,
            self.links_admitted,
            self.sitemap_urls_admitted,
            self.robots_disallowed,
            self.fetch_failed,
            self.onion_deferred,
            self.unexpected_failures
        )
    }
}

/// Requests a running crawler to stop after its current iteration
#[derive(Clone)]
pub struct StopHandle {
    stop_tx: Arc<watch::Sender<bool>>,
    interrupted: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        info!("Stopping crawler");
        self.stop_tx.send_replace(true);
    }

    /// Stop with a grace period before the final save
    pub fn interrupt(&self) {
        info!("Interrupt detected, stopping crawler");
        self.interrupted.store(true, Ordering::SeqCst);
        self.stop_tx.send_replace(true);
    }
}

pub struct Crawler {
    config: CrawlerConfig,
    data_dir: PathBuf,
    stores: Arc<RwLock<CrawlStores>>,
    fetcher: Arc<dyn Fetch>,
    link_filter: LinkFilter,
    state: watch::Sender<CrawlerState>,
    stop_tx: Arc<watch::Sender<bool>>,
    interrupted: Arc<AtomicBool>,
    stats: RwLock<CrawlStats>,
}

impl Crawler {
    pub fn new(
        config: &Config,
        stores: Arc<RwLock<CrawlStores>>,
        fetcher: Arc<dyn Fetch>,
    ) -> Result<Self, CrawlError> {
        let link_filter = LinkFilter::new(&config.crawler.exclude_patterns)?;
        let (state, _) = watch::channel(CrawlerState::Stopped);
        let (stop_tx, _) = watch::channel(false);

        Ok(Self {
            config: config.crawler.clone(),
            data_dir: config.node.data_dir.clone(),
            stores,
            fetcher,
            link_filter,
            state,
            stop_tx: Arc::new(stop_tx),
            interrupted: Arc::new(AtomicBool::new(false)),
            stats: RwLock::new(CrawlStats::default()),
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stop_tx: Arc::clone(&self.stop_tx),
            interrupted: Arc::clone(&self.interrupted),
        }
    }

    pub fn stop(&self) {
        self.stop_handle().stop();
    }

    pub fn state(&self) -> CrawlerState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<CrawlerState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> CrawlStats {
        self.stats.read().clone()
    }

    pub fn stores(&self) -> Arc<RwLock<CrawlStores>> {
        Arc::clone(&self.stores)
    }

    /// Run until stopped. Failures in a single URL's pipeline never end the loop.
    pub async fn run(&self) {
        self.stop_tx.send_replace(false);
        self.interrupted.store(false, Ordering::SeqCst);
        self.state.send_replace(CrawlerState::Running);
        info!("Crawler started");

        let persist_interval = self.config.persist_interval.max(1);

        while !*self.stop_tx.borrow() {
            let next = self
                .stores
                .read()
                .queue
                .peek_next()
                .map(|entry| (entry.url.clone(), entry.fingerprint.clone()));
            let Some((url, fingerprint)) = next else {
                debug!(
                    "Frontier is empty, sleeping {:?}",
                    self.config.empty_queue_backoff()
                );
                self.backoff(self.config.empty_queue_backoff()).await;
                continue;
            };

            let result = AssertUnwindSafe(self.crawl(&url))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(CrawlError::Panicked(panic_message(&*panic))));

            match result {
                Ok(outcome) => self.stats.write().record(&outcome),
                Err(e) => {
                    warn!("Unexpected failure while crawling {}, dropping it: {}", url, e);
                    self.stats.write().unexpected_failures += 1;
                    // a failing head URL is dropped, never retried
                    self.stores.write().queue.remove_fingerprint(&fingerprint);
                    self.backoff(self.config.error_backoff()).await;
                }
            }

            let iterations = {
                let mut stats = self.stats.write();
                stats.iterations += 1;
                stats.iterations
            };
            if iterations % persist_interval == 0 {
                self.persist();
            }
        }

        if self.interrupted.load(Ordering::SeqCst) {
            info!(
                "Waiting {:?} before stopping",
                self.config.interrupt_grace()
            );
            tokio::time::sleep(self.config.interrupt_grace()).await;
        }

        self.persist();
        self.state.send_replace(CrawlerState::Stopped);
        info!("Crawler stopped: {}", self.stats());
    }

    /// Run one URL through the pipeline
    pub async fn crawl(&self, raw: &str) -> Result<CrawlOutcome, CrawlError> {
        let url = match normalize(raw) {
            Ok(url) => url,
            Err(e) => {
                debug!("{}, skipping crawl", e);
                self.stores.write().queue.remove_fingerprint(&Fingerprint::of(raw));
                return Ok(CrawlOutcome::InvalidUrl);
            }
        };

        if self.stores.read().history.contains(&url.fingerprint) {
            debug!("{} found in crawl history, skipping", url.url);
            self.dequeue(raw, &url);
            return Ok(CrawlOutcome::AlreadyCrawled);
        }

        if url.is_onion(&self.config.onion_suffix) {
            info!("Deferring {}: no fetch capability for {}", url.url, self.config.onion_suffix);
            let mut stores = self.stores.write();
            if stores.onions.register_if_absent(&url.domain) {
                info!("New onion domain {} registered", url.domain);
            }
            remove_entry(&mut stores, raw, &url);
            stores.history.record(&url, 0, LABEL_FETCH_UNAVAILABLE, 0);
            return Ok(CrawlOutcome::OnionUnsupported);
        }

        if !self.stores.read().domains.contains(&url.domain) {
            self.discover_domain(&url.domain).await;
        }

        let allowed = self.stores.read().domains.is_allowed(&url);
        match allowed {
            None => return Err(CrawlError::MissingDomainStatus(url.domain.clone())),
            Some(false) => {
                info!("Not allowed to fetch {}", url.url);
                let mut stores = self.stores.write();
                remove_entry(&mut stores, raw, &url);
                stores.history.record(&url, 0, LABEL_ROBOTS_DISALLOWED, 0);
                return Ok(CrawlOutcome::RobotsDisallowed);
            }
            Some(true) => {}
        }

        self.wait_for_crawl_delay(&url.domain).await;
        let response = self.fetcher.fetch(&url.absolute(&self.config.default_scheme)).await;
        self.stores.write().domains.touch(&url.domain);

        if response.is_failure() {
            info!("Can't fetch {}", url.url);
            let mut stores = self.stores.write();
            remove_entry(&mut stores, raw, &url);
            stores.history.record(&url, 0, LABEL_FETCH_FAILED, 0);
            return Ok(CrawlOutcome::FetchFailed);
        }

        let links: Vec<String> = extract_links(&response.body)
            .iter()
            .map(|link| resolve_link(link, &url.url, &url.domain))
            .filter(|link| !self.link_filter.is_excluded(link))
            .collect();

        let links_admitted = {
            let mut stores = self.stores.write();
            let admitted = links
                .iter()
                .filter(|link| stores.admit(link).is_admitted())
                .count();

            remove_entry(&mut stores, raw, &url);
            stores.history.record(
                &url,
                response.status_code,
                LABEL_CRAWLED,
                response.body.len() as u64,
            );
            stores.domains.update_crawl_count(&url.domain, 1);
            admitted
        };

        info!(
            "Crawled {} ({}), {} of {} links admitted",
            url.url,
            response.status_code,
            links_admitted,
            links.len()
        );
        Ok(CrawlOutcome::Crawled {
            status_code: response.status_code,
            links_admitted,
        })
    }

    /// First sighting of a domain: fetch robots.txt, create the status and
    /// ingest any sitemaps it lists
    async fn discover_domain(&self, domain: &str) {
        info!("New domain {} found", domain);

        let robots_location = self.absolute(&robots_url(domain));
        let response = self.fetcher.fetch(&robots_location).await;
        let robots_txt = if response.is_success() {
            response.body
        } else {
            debug!(
                "No robots.txt for {} (status {}), allowing everything",
                domain, response.status_code
            );
            String::new()
        };

        let sitemaps: Vec<String> = RobotsTxt::parse(&robots_txt)
            .sitemaps()
            .into_iter()
            .map(|location| resolve_location(location, domain))
            .collect();

        if !self.stores.write().domains.create_if_absent(domain, robots_txt) {
            return;
        }

        for location in sitemaps {
            // a sitemap index is followed one level deep
            for child in self.ingest_sitemap(&location).await {
                self.ingest_sitemap(&resolve_location(&child, domain)).await;
            }
        }
    }

    /// Fetch and ingest one sitemap, returning the child sitemaps it lists
    async fn ingest_sitemap(&self, location: &str) -> Vec<String> {
        let response = self.fetcher.fetch(&self.absolute(location)).await;
        if !response.is_success() {
            debug!("Sitemap {} unavailable (status {})", location, response.status_code);
            return Vec::new();
        }

        let result = self.stores.write().ingest_sitemap(location, &response.body);
        match result {
            Ok(ingest) => {
                info!("Sitemap {}: {} URLs admitted", location, ingest.admitted);
                self.stats.write().sitemap_urls_admitted += ingest.admitted as u64;
                ingest.nested
            }
            Err(e) => {
                warn!("Failed to ingest sitemap {}: {}", location, e);
                Vec::new()
            }
        }
    }

    async fn wait_for_crawl_delay(&self, domain: &str) {
        let remaining =
            self.stores
                .read()
                .domains
                .crawl_delay_remaining(domain, self.config.crawl_delay(), Utc::now());
        if !remaining.is_zero() {
            debug!("Waiting {:?} before fetching from {}", remaining, domain);
            tokio::time::sleep(remaining).await;
        }
    }

    /// Sleep for `duration`, waking early if a stop is requested
    async fn backoff(&self, duration: Duration) {
        let mut stop_rx = self.stop_tx.subscribe();
        let stopped = async move {
            loop {
                if *stop_rx.borrow_and_update() {
                    break;
                }
                if stop_rx.changed().await.is_err() {
                    break;
                }
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = stopped => {}
        }
    }

    fn dequeue(&self, raw: &str, url: &NormalizedUrl) {
        remove_entry(&mut self.stores.write(), raw, url);
    }

    fn absolute(&self, location: &str) -> String {
        format!("{}://{}", self.config.default_scheme, location)
    }

    /// Write the stores to the data directory
    pub fn save(&self) -> Result<(), CrawlError> {
        self.stores.read().save(&self.data_dir)?;
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            warn!("Failed to persist crawl stores to {}: {}", self.data_dir.display(), e);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Remove a URL from the queue under both its raw and normalized fingerprints
fn remove_entry(stores: &mut CrawlStores, raw: &str, url: &NormalizedUrl) {
    stores.queue.remove_fingerprint(&url.fingerprint);
    if raw != url.url {
        stores.queue.remove_fingerprint(&Fingerprint::of(raw));
    }
}
