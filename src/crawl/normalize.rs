//! URL normalization and validation
//!
//! Frontier URLs are stored without their protocol (`example.com/page`), with
//! a lowercase host and fragment stripped. Normalization is idempotent:
//! normalizing an already-normalized URL yields the same string, which is what
//! makes fingerprints usable as a dedup key across every store.

use thiserror::Error;
use url::{Host, Url};

use super::fingerprint::Fingerprint;

/// Rejected input; callers drop it and never retry or record it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid URL '{input}': {reason}")]
pub struct InvalidUrl {
    pub input: String,
    pub reason: &'static str,
}

impl InvalidUrl {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

/// A syntactically valid, protocol-less URL with its domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUrl {
    /// `domain` followed by path and query, e.g. `example.com/a?b=1`
    pub url: String,
    /// Host (plus explicit port), e.g. `example.com` or `example.com:8080`
    pub domain: String,
    pub fingerprint: Fingerprint,
    pub domain_fingerprint: Fingerprint,
}

impl NormalizedUrl {
    /// Path and query relative to the domain, always starting with `/`
    pub fn path(&self) -> &str {
        &self.url[self.domain.len()..]
    }

    /// Absolute URL for the fetch capability
    pub fn absolute(&self, scheme: &str) -> String {
        format!("{}://{}", scheme, self.url)
    }

    pub fn is_onion(&self, onion_suffix: &str) -> bool {
        self.domain_host().ends_with(onion_suffix)
    }

    fn domain_host(&self) -> &str {
        self.domain
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or(&self.domain)
    }
}

/// Strip a leading `http://` or `https://` (any case) and surrounding whitespace
pub fn remove_protocol(raw: &str) -> &str {
    let trimmed = raw.trim();
    for prefix in ["https://", "http://"] {
        let has_prefix = trimmed
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if has_prefix {
            return trimmed[prefix.len()..].trim_start();
        }
    }
    trimmed
}

/// Normalize a raw URL, or reject it as garbage
pub fn normalize(raw: &str) -> Result<NormalizedUrl, InvalidUrl> {
    let stripped = remove_protocol(raw);
    if stripped.is_empty() {
        return Err(InvalidUrl::new(raw, "empty"));
    }
    if stripped.contains("://") || stripped.starts_with("//") {
        return Err(InvalidUrl::new(raw, "unsupported scheme"));
    }

    let parsed = Url::parse(&format!("http://{}", stripped))
        .map_err(|_| InvalidUrl::new(raw, "unparseable"))?;
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(InvalidUrl::new(raw, "credentials or foreign scheme"));
    }

    let host = match parsed.host() {
        Some(Host::Domain(host)) => host.to_string(),
        Some(_) => return Err(InvalidUrl::new(raw, "IP addresses have no registrable domain")),
        None => return Err(InvalidUrl::new(raw, "missing host")),
    };
    if !is_plausible_domain(&host) {
        return Err(InvalidUrl::new(raw, "implausible domain"));
    }

    let domain = match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    };

    // Url always yields at least "/" as path, so a bare domain gets its trailing slash here
    let mut url = format!("{}{}", domain, parsed.path());
    if let Some(query) = parsed.query() {
        url.push('?');
        url.push_str(query);
    }

    Ok(NormalizedUrl {
        fingerprint: Fingerprint::of(&url),
        domain_fingerprint: Fingerprint::of(&domain),
        url,
        domain,
    })
}

/// Syntactic validity check used by sitemap ingestion and link admission
pub fn is_valid_url(raw: &str) -> bool {
    normalize(raw).is_ok()
}

/// A domain label followed by a known-shape suffix
fn is_plausible_domain(host: &str) -> bool {
    if host.len() > 253 {
        return false;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    let valid_label = |label: &str| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
    };
    if !labels.iter().all(|l| valid_label(l)) {
        return false;
    }

    let tld = labels[labels.len() - 1];
    let punycode_tld = tld.starts_with("xn--") && tld.len() > 4;
    punycode_tld || (tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
}
