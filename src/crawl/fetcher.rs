//! Fetch capability
//!
//! The crawl pipeline only needs `fetch(url) -> (body, status)`. A status of 0
//! means the fetch failed at the transport level; any HTTP status, including
//! 4xx and 5xx, is a valid response.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::FetchConfig;

/// Errors that can occur while fetching
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Content too large: {0} bytes")]
    ContentTooLarge(usize),
}

/// Body and status of a fetch attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    pub body: String,
    /// HTTP status code, or 0 when nothing was received
    pub status_code: u16,
}

impl FetchResponse {
    pub fn new(body: impl Into<String>, status_code: u16) -> Self {
        Self {
            body: body.into(),
            status_code,
        }
    }

    /// A transport-level failure
    pub fn failed() -> Self {
        Self::default()
    }

    pub fn is_failure(&self) -> bool {
        self.status_code == 0
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Something that can fetch an absolute URL
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch `url`. Never errors: failures are reported as status 0.
    async fn fetch(&self, url: &str) -> FetchResponse;
}

/// Default fetch capability over HTTP(S)
pub struct HttpFetcher {
    http_client: reqwest::Client,
    max_content_size: usize,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            http_client,
            max_content_size: config.max_content_size,
        })
    }

    async fn fetch_http(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let response = self.http_client.get(url).send().await?;
        let status = response.status();

        if let Some(len) = response.content_length() {
            if len as usize > self.max_content_size {
                return Err(FetchError::ContentTooLarge(len as usize));
            }
        }

        let body = response.text().await?;
        if body.len() > self.max_content_size {
            return Err(FetchError::ContentTooLarge(body.len()));
        }

        Ok(FetchResponse::new(body, status.as_u16()))
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResponse {
        match self.fetch_http(url).await {
            Ok(response) => {
                debug!("Fetched {} ({}, {} bytes)", url, response.status_code, response.body.len());
                response
            }
            Err(e) => {
                warn!("Fetch failed for {}: {}", url, e);
                FetchResponse::failed()
            }
        }
    }
}
