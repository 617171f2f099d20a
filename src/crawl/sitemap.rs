//! Sitemap ingestion
//!
//! Parses XML (`<urlset>` / `<sitemapindex>`) and plain-text sitemaps and bulk
//! admits the discovered URLs through [`FrontierQueue::admit_batch`], so a
//! sitemap can never push a domain past its cap.

use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use thiserror::Error;

use super::frontier::FrontierQueue;
use super::history::HistoryLedger;
use super::normalize::{is_valid_url, remove_protocol};
use super::politeness::PolitenessStore;

/// Namespace `<url>`, `<sitemap>` and `<loc>` must be bound to
pub const SITEMAP_NS: &[u8] = b"http://www.sitemaps.org/schemas/sitemap/0.9";

/// Errors that fail ingestion of a single sitemap
#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("document ended inside an open element")]
    UnexpectedEof,

    #[error("document has no root element")]
    NoRoot,
}

impl From<quick_xml::Error> for SitemapError {
    fn from(e: quick_xml::Error) -> Self {
        SitemapError::XmlParse(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitemapFormat {
    Xml,
    Txt,
}

impl SitemapFormat {
    /// Choose a format from the location's extension, sniffing the body otherwise
    pub fn detect(location: &str, body: &str) -> Self {
        let path = location
            .split(['?', '#'])
            .next()
            .unwrap_or(location)
            .to_ascii_lowercase();

        if path.ends_with(".xml") {
            SitemapFormat::Xml
        } else if path.ends_with(".txt") {
            SitemapFormat::Txt
        } else if body.trim_start().starts_with('<') {
            SitemapFormat::Xml
        } else {
            SitemapFormat::Txt
        }
    }
}

/// `<loc>` values found in an XML sitemap
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSitemap {
    /// Page locations from `<url><loc>`
    pub urls: Vec<String>,
    /// Child sitemap locations from `<sitemap><loc>`
    pub sitemaps: Vec<String>,
}

/// Result of ingesting one sitemap document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapIngest {
    pub admitted: usize,
    /// Child sitemaps listed by a sitemap index, not yet fetched
    pub nested: Vec<String>,
}

/// Parse an XML sitemap or sitemap index
pub fn parse_xml(document: &str) -> Result<ParsedSitemap, SitemapError> {
    let mut reader = NsReader::from_str(document);
    let mut parsed = ParsedSitemap::default();

    let mut depth = 0usize;
    let mut saw_root = false;
    let mut in_url = false;
    let mut in_sitemap = false;
    let mut loc: Option<String> = None;

    loop {
        match reader.read_resolved_event()? {
            (ns, Event::Start(e)) => {
                depth += 1;
                saw_root = true;
                if !in_sitemap_ns(&ns) {
                    continue;
                }
                match e.local_name().as_ref() {
                    b"url" => in_url = true,
                    b"sitemap" => in_sitemap = true,
                    b"loc" if in_url || in_sitemap => loc = Some(String::new()),
                    _ => {}
                }
            }
            (ns, Event::End(e)) => {
                depth = depth.saturating_sub(1);
                if !in_sitemap_ns(&ns) {
                    continue;
                }
                match e.local_name().as_ref() {
                    b"loc" => {
                        if let Some(text) = loc.take() {
                            let text = text.trim();
                            if text.is_empty() {
                                continue;
                            }
                            if in_url {
                                parsed.urls.push(text.to_string());
                            } else if in_sitemap {
                                parsed.sitemaps.push(text.to_string());
                            }
                        }
                    }
                    b"url" => in_url = false,
                    b"sitemap" => in_sitemap = false,
                    _ => {}
                }
            }
            (_, Event::Empty(_)) => saw_root = true,
            (_, Event::Text(text)) => {
                if let Some(buf) = loc.as_mut() {
                    buf.push_str(&text.unescape()?);
                }
            }
            (_, Event::CData(data)) => {
                if let Some(buf) = loc.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&data));
                }
            }
            (_, Event::Eof) => break,
            _ => {}
        }
    }

    if depth > 0 {
        return Err(SitemapError::UnexpectedEof);
    }
    if !saw_root {
        return Err(SitemapError::NoRoot);
    }
    Ok(parsed)
}

fn in_sitemap_ns(ns: &ResolveResult) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == SITEMAP_NS)
}

/// Parse a plain-text sitemap: one URL per line
pub fn parse_txt(document: &str) -> Vec<String> {
    document
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Ingest an XML sitemap, admitting at most `limit` valid page URLs
pub fn ingest_xml(
    document: &str,
    limit: usize,
    queue: &mut FrontierQueue,
    domains: &PolitenessStore,
    history: &HistoryLedger,
) -> Result<SitemapIngest, SitemapError> {
    let parsed = parse_xml(document)?;
    let admitted = admit_valid(&parsed.urls, limit, queue, domains, history);
    Ok(SitemapIngest {
        admitted,
        nested: parsed.sitemaps,
    })
}

/// Ingest a plain-text sitemap, admitting at most `limit` valid URLs
pub fn ingest_txt(
    document: &str,
    limit: usize,
    queue: &mut FrontierQueue,
    domains: &PolitenessStore,
    history: &HistoryLedger,
) -> usize {
    admit_valid(&parse_txt(document), limit, queue, domains, history)
}

fn admit_valid(
    urls: &[String],
    limit: usize,
    queue: &mut FrontierQueue,
    domains: &PolitenessStore,
    history: &HistoryLedger,
) -> usize {
    let candidates: Vec<&str> = urls
        .iter()
        .map(|url| remove_protocol(url))
        .filter(|url| is_valid_url(url))
        .take(limit)
        .collect();

    queue.admit_batch(candidates, domains, history)
}

/// Resolve a `Sitemap:` value from robots.txt against its domain
pub fn resolve_location(location: &str, domain: &str) -> String {
    let stripped = remove_protocol(location);
    if stripped.len() != location.trim().len() {
        stripped.to_string()
    } else if let Some(path) = stripped.strip_prefix('/') {
        format!("{}/{}", domain, path)
    } else {
        format!("{}/{}", domain, stripped)
    }
}
