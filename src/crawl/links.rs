//! Outbound link extraction and resolution

use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;

/// href prefixes that never point at a crawlable page
const SKIPPED_PREFIXES: &[&str] = &["#", "mailto:", "tel:", "javascript:", "data:"];

/// Extract raw `href` values from `<a>` elements, in document order, deduplicated
pub fn extract_links(body: &str) -> Vec<String> {
    let document = Html::parse_document(body);
    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() {
            continue;
        }

        let lower = href.to_ascii_lowercase();
        if SKIPPED_PREFIXES.iter().any(|prefix| lower.starts_with(prefix)) {
            continue;
        }

        if seen.insert(href.to_string()) {
            links.push(href.to_string());
        }
    }

    links
}

/// Resolve a link found on `url` (normalized, protocol-less) of `domain`.
///
/// Absolute and protocol-relative links are kept, root-relative links are
/// joined to the domain, anything else replaces the last path segment.
pub fn resolve_link(link: &str, url: &str, domain: &str) -> String {
    if link.contains("://") {
        return link.to_string();
    }
    if let Some(rest) = link.strip_prefix("//") {
        return rest.to_string();
    }
    if link.starts_with('/') {
        return format!("{}{}", domain, link);
    }

    match url.rsplit_once('/') {
        Some((parent, _)) => format!("{}/{}", parent, link),
        None => format!("{}/{}", url, link),
    }
}

/// Exclusion patterns for links that should never be admitted
#[derive(Debug, Clone, Default)]
pub struct LinkFilter {
    patterns: Vec<Regex>,
}

impl LinkFilter {
    pub fn new(patterns: &[String]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_excluded(&self, link: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(link))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_anchor_hrefs() {
        let html = r##"<html><body>
            <a href="https://other.org/x">x</a>
            <a href="/about">about</a>
            <a href="page2.html">next</a>
            <a href="/about">dup</a>
            <a href="#top">top</a>
            <a href="mailto:a@b.com">mail</a>
            <a href="JavaScript:void(0)">js</a>
            <a href="tel:+123">call</a>
            <a>no href</a>
        </body></html>"##;

        assert_eq!(
            extract_links(html),
            vec!["https://other.org/x", "/about", "page2.html"]
        );
    }

    #[test]
    fn extract_from_empty_body() {
        assert!(extract_links("").is_empty());
    }

    #[test]
    fn resolves_links() {
        let url = "example.com/docs/intro";
        let domain = "example.com";

        assert_eq!(resolve_link("https://other.org/a", url, domain), "https://other.org/a");
        assert_eq!(resolve_link("//cdn.example.com/a", url, domain), "cdn.example.com/a");
        assert_eq!(resolve_link("/about", url, domain), "example.com/about");
        assert_eq!(resolve_link("setup", url, domain), "example.com/docs/setup");
        assert_eq!(resolve_link("setup", "example.com/", domain), "example.com/setup");
    }

    #[test]
    fn filter_excludes_matching_links() {
        let filter = LinkFilter::new(&[r"(?i)\.pdf$".to_string()]).unwrap();
        assert!(filter.is_excluded("example.com/paper.PDF"));
        assert!(!filter.is_excluded("example.com/paper.html"));
        assert!(!LinkFilter::default().is_excluded("anything"));
        assert!(LinkFilter::new(&["(".to_string()]).is_err());
    }
}
