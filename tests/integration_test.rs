//! Integration tests for searchonion
//!
//! These tests drive the crawl pipeline end to end against a scripted fetcher.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use searchonion::{
    config::Config,
    crawl::{
        history::{LABEL_CRAWLED, LABEL_FETCH_FAILED, LABEL_FETCH_UNAVAILABLE, LABEL_ROBOTS_DISALLOWED},
        normalize, remove_protocol, CrawlStores, Crawler, CrawlerState, Fetch, FetchResponse,
        Fingerprint, HistoryLedger, SubmitOutcome,
    },
    types::{Admission, CrawlOutcome, RejectReason},
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// In-memory fetcher serving canned responses; unknown URLs fail with status 0
#[derive(Default)]
struct ScriptedFetcher {
    pages: HashMap<String, FetchResponse>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn page(mut self, url: &str, body: &str, status: u16) -> Self {
        self.pages.insert(url.to_string(), FetchResponse::new(body, status));
        self
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Fetch for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> FetchResponse {
        self.requests.lock().push(url.to_string());
        self.pages.get(url).cloned().unwrap_or_else(FetchResponse::failed)
    }
}

fn test_config(dir: &TempDir, domain_limit: usize) -> Config {
    let mut config = Config::default();
    config.node.data_dir = dir.path().to_path_buf();
    config.crawler.domain_max_crawl_limit = domain_limit;
    config.crawler.crawl_delay_secs = 0;
    config.crawler.error_backoff_secs = 0;
    config.crawler.interrupt_grace_secs = 0;
    config.crawler.persist_interval = 1;
    config
}

fn setup(config: &Config, fetcher: ScriptedFetcher) -> (Crawler, Arc<ScriptedFetcher>) {
    let fetcher = Arc::new(fetcher);
    let stores = Arc::new(RwLock::new(CrawlStores::new(&config.crawler)));
    let crawler = Crawler::new(config, stores, fetcher.clone()).unwrap();
    (crawler, fetcher)
}

#[test]
fn test_admission_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, 10);
    let mut stores = CrawlStores::new(&config.crawler);

    assert_eq!(stores.admit("https://example.com/a"), Admission::Admitted);
    assert_eq!(stores.admit("https://example.com/a"), Admission::AlreadyQueued);
    assert_eq!(stores.queue.size(), 1);
}

#[test]
fn test_domain_cap_rejects_new_urls() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, 2);
    let mut stores = CrawlStores::new(&config.crawler);

    stores.domains.update_crawl_count("example.com", 1);
    assert_eq!(stores.admit("example.com/a"), Admission::Admitted);
    assert_eq!(
        stores.admit("example.com/b"),
        Admission::Rejected(RejectReason::DomainLimitExceeded)
    );
    assert_eq!(stores.submit("example.com/b"), SubmitOutcome::DomainLimitReached);
}

#[tokio::test]
async fn test_crawled_url_is_never_readmitted() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, 10);
    let (crawler, _) = setup(
        &config,
        ScriptedFetcher::default().page("https://example.com/a", "<p>hello</p>", 200),
    );

    let stores = crawler.stores();
    stores.write().admit("example.com/a");
    let outcome = crawler.crawl("example.com/a").await.unwrap();
    assert_eq!(outcome, CrawlOutcome::Crawled { status_code: 200, links_admitted: 0 });

    assert_eq!(stores.read().queue.size(), 0);
    assert_eq!(
        stores.write().admit("http://example.com/a"),
        Admission::Rejected(RejectReason::AlreadyCrawled)
    );
    assert_eq!(stores.write().submit("example.com/a"), SubmitOutcome::AlreadyKnown);

    // re-running the pipeline writes no new history record
    assert_eq!(crawler.crawl("example.com/a").await.unwrap(), CrawlOutcome::AlreadyCrawled);
    assert_eq!(stores.read().history.total_recorded(), 1);
}

#[tokio::test]
async fn test_sitemap_admits_nothing_once_domain_cap_reached() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, 2);
    let (crawler, _) = setup(
        &config,
        ScriptedFetcher::default()
            .page("https://example.com/a", "<p>a</p>", 200)
            .page("https://example.com/b", "<p>b</p>", 200),
    );

    let stores = crawler.stores();
    assert!(stores.write().admit("example.com/a").is_admitted());
    assert!(stores.write().admit("example.com/b").is_admitted());

    crawler.crawl("example.com/a").await.unwrap();
    crawler.crawl("example.com/b").await.unwrap();
    assert_eq!(stores.read().domains.get("example.com").unwrap().crawl_count, 2);

    let sitemap = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/c</loc></url>
  <url><loc>https://example.com/d</loc></url>
  <url><loc>https://example.com/e</loc></url>
</urlset>"#;
    let ingest = stores
        .write()
        .ingest_sitemap("example.com/sitemap.xml", sitemap)
        .unwrap();

    assert_eq!(ingest.admitted, 0);
    assert_eq!(stores.read().queue.size(), 0);
}

#[tokio::test]
async fn test_onion_domain_is_deferred() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, 10);
    let (crawler, fetcher) = setup(&config, ScriptedFetcher::default());

    let stores = crawler.stores();
    assert!(stores.write().admit("foo.onion").is_admitted());

    let outcome = crawler.crawl("foo.onion/").await.unwrap();
    assert_eq!(outcome, CrawlOutcome::OnionUnsupported);

    {
        let stores = stores.read();
        assert!(stores.onions.get("foo.onion").is_some());
        assert_eq!(stores.queue.size(), 0);

        let record = stores.history.find(&Fingerprint::of("foo.onion/")).unwrap();
        assert_eq!(record.status_code, 0);
        assert_eq!(record.outcome_label, LABEL_FETCH_UNAVAILABLE);
    }

    assert_eq!(
        stores.write().admit("foo.onion"),
        Admission::Rejected(RejectReason::AlreadyCrawled)
    );
    assert!(fetcher.requests().is_empty(), "onion URLs must never be fetched");
}

#[tokio::test]
async fn test_robots_rules_gate_fetches() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, 10);
    let (crawler, fetcher) = setup(
        &config,
        ScriptedFetcher::default()
            .page(
                "https://example.com/robots.txt",
                "User-agent: *\nDisallow: /private\nAllow: /private/public",
                200,
            )
            .page("https://example.com/private/public/x", "<p>open</p>", 200),
    );

    let blocked = crawler.crawl("example.com/private/x").await.unwrap();
    assert_eq!(blocked, CrawlOutcome::RobotsDisallowed);

    let open = crawler.crawl("example.com/private/public/x").await.unwrap();
    assert!(matches!(open, CrawlOutcome::Crawled { .. }));

    let stores = crawler.stores();
    let stores = stores.read();
    let record = stores
        .history
        .find(&normalize("example.com/private/x").unwrap().fingerprint)
        .unwrap();
    assert_eq!(record.outcome_label, LABEL_ROBOTS_DISALLOWED);
    assert_eq!(record.status_code, 0);

    // robots.txt is fetched once, on first sighting of the domain
    let robots_fetches = fetcher
        .requests()
        .iter()
        .filter(|url| url.ends_with("/robots.txt"))
        .count();
    assert_eq!(robots_fetches, 1);
    assert!(!fetcher.requests().contains(&"https://example.com/private/x".to_string()));
}

#[tokio::test]
async fn test_missing_robots_allows_everything() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, 10);
    let (crawler, _) = setup(
        &config,
        ScriptedFetcher::default()
            .page("https://example.com/robots.txt", "Disallow: /", 404)
            .page("https://example.com/page", "<p>ok</p>", 200),
    );

    let outcome = crawler.crawl("example.com/page").await.unwrap();
    assert!(matches!(outcome, CrawlOutcome::Crawled { .. }));
    assert_eq!(crawler.stores().read().domains.get("example.com").unwrap().robots_txt, "");
}

#[tokio::test]
async fn test_fetch_failure_is_recorded() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, 10);
    let (crawler, _) = setup(&config, ScriptedFetcher::default());

    let stores = crawler.stores();
    stores.write().admit("example.com/down");
    let outcome = crawler.crawl("example.com/down").await.unwrap();
    assert_eq!(outcome, CrawlOutcome::FetchFailed);

    let stores = stores.read();
    assert_eq!(stores.queue.size(), 0);
    let record = stores.history.latest().unwrap();
    assert_eq!(record.outcome_label, LABEL_FETCH_FAILED);
    assert_eq!(record.status_code, 0);
    assert_eq!(stores.domains.get("example.com").unwrap().crawl_count, 0);
}

#[tokio::test]
async fn test_robots_sitemaps_seed_the_queue() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, 10);
    let index = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://example.com/posts.xml</loc></sitemap>
</sitemapindex>"#;
    let posts = r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/posts/1</loc></url>
  <url><loc>https://example.com/posts/2</loc></url>
</urlset>"#;

    let (crawler, _) = setup(
        &config,
        ScriptedFetcher::default()
            .page(
                "https://example.com/robots.txt",
                "User-agent: *\nDisallow:\nSitemap: /sitemap_index.xml\nSitemap: /pages.txt\n",
                200,
            )
            .page("https://example.com/sitemap_index.xml", index, 200)
            .page("https://example.com/posts.xml", posts, 200)
            .page("https://example.com/pages.txt", "https://example.com/about\n", 200)
            .page("https://example.com/", "<p>home</p>", 200),
    );

    crawler.crawl("example.com").await.unwrap();

    let stores = crawler.stores();
    let queued: Vec<String> = stores.read().queue.entries().map(|e| e.url.clone()).collect();
    assert_eq!(
        queued,
        vec!["example.com/posts/1", "example.com/posts/2", "example.com/about"]
    );
    assert_eq!(crawler.stats().sitemap_urls_admitted, 3);
}

#[tokio::test]
async fn test_outbound_links_are_resolved_and_admitted() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, 10);
    let page = r#"<html><body>
        <a href="/about">About</a>
        <a href="guide">Guide</a>
        <a href="https://other.org/">Other</a>
        <a href="//cdn.example.net/lib">CDN</a>
        <a href="mailto:me@example.com">Mail</a>
        <a href="/archive.zip">Zip</a>
    </body></html>"#;
    let (crawler, _) = setup(
        &config,
        ScriptedFetcher::default().page("https://example.com/docs/intro", page, 200),
    );

    let outcome = crawler.crawl("example.com/docs/intro").await.unwrap();
    assert_eq!(outcome, CrawlOutcome::Crawled { status_code: 200, links_admitted: 4 });

    let stores = crawler.stores();
    let queued: Vec<String> = stores.read().queue.entries().map(|e| e.url.clone()).collect();
    assert_eq!(
        queued,
        vec![
            "example.com/about",
            "example.com/docs/guide",
            "other.org/",
            "cdn.example.net/lib",
        ]
    );
}

#[tokio::test]
async fn test_run_drains_queue_and_persists() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, 10);
    let (crawler, _) = setup(
        &config,
        ScriptedFetcher::default()
            .page("https://example.com/", r#"<a href="/next">next</a>"#, 200)
            .page("https://example.com/next", "<p>end</p>", 200),
    );
    let crawler = Arc::new(crawler);
    crawler.stores().write().admit("example.com");

    let runner = Arc::clone(&crawler);
    let task = tokio::spawn(async move { runner.run().await });

    let stores = crawler.stores();
    tokio::time::timeout(Duration::from_secs(10), async {
        while stores.read().history.total_recorded() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    crawler.stop_handle().interrupt();
    tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(crawler.state(), CrawlerState::Stopped);
    assert_eq!(crawler.stats().crawled, 2);

    let restored = CrawlStores::load(dir.path(), &config.crawler).unwrap();
    assert_eq!(restored.queue.size(), 0);
    assert_eq!(restored.history.total_recorded(), 2);
    assert_eq!(restored.domains.get("example.com").unwrap().crawl_count, 2);
}

#[tokio::test]
async fn test_non_ascii_links_are_crawled_percent_encoded() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, 10);
    let (crawler, fetcher) = setup(
        &config,
        ScriptedFetcher::default()
            .page("https://a.io/", r#"<a href="éé">accents</a>"#, 200)
            .page("https://a.io/%C3%A9%C3%A9", "<p>done</p>", 200),
    );
    let crawler = Arc::new(crawler);
    crawler.stores().write().admit("a.io/");

    let runner = Arc::clone(&crawler);
    let task = tokio::spawn(async move { runner.run().await });

    let stores = crawler.stores();
    tokio::time::timeout(Duration::from_secs(10), async {
        while stores.read().history.total_recorded() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    crawler.stop();
    tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .unwrap()
        .unwrap();

    let stats = crawler.stats();
    assert_eq!(stats.crawled, 2);
    assert_eq!(stats.unexpected_failures, 0);
    assert_eq!(crawler.state(), CrawlerState::Stopped);
    assert!(fetcher
        .requests()
        .contains(&"https://a.io/%C3%A9%C3%A9".to_string()));
}

#[test]
fn test_history_bounds_and_cumulative_size() {
    let mut ledger = HistoryLedger::new(4);
    let mut expected = 0u64;

    for n in 0..25u64 {
        let url = normalize(&format!("example.com/{}", n)).unwrap();
        let size = n * 31 % 97;
        expected += size;
        ledger.record(&url, 200, LABEL_CRAWLED, size);

        assert!(ledger.len() <= 4);
        assert!(ledger.len() >= 1);
        assert_eq!(ledger.cumulative_size(), expected);
    }
}

#[test]
fn test_normalization_round_trip() {
    for raw in [
        "https://example.com",
        "http://Example.com/Path?q=1#frag",
        "  example.org/a/b/ ",
        "https://sub.domain.co.uk:8443/x",
    ] {
        let direct = normalize(raw).unwrap();
        let stripped = normalize(remove_protocol(raw)).unwrap();
        assert_eq!(normalize(&stripped.url).unwrap(), direct);
    }
}
