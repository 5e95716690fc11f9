//! HTTP fetcher implementation
//!
//! This module handles all outbound requests for the crawler:
//! - Building the HTTP client with user agent and bounded timeouts
//! - Single GET requests with no retry and no caching
//! - Classifying failures into `FetchError` instead of propagating panics
//!
//! Retry policy belongs to the worker pool, not to this layer.

use crate::config::{CrawlerConfig, UserAgentConfig};
use reqwest::{redirect::Policy, Client};
use std::future::Future;
use thiserror::Error;

/// Content of a successfully fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    /// Final URL after redirects
    pub url: String,

    /// HTTP status code
    pub status_code: u16,

    /// Response body
    pub body: String,
}

impl PageContent {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status_code: 200,
            body: body.into(),
        }
    }
}

/// A failed fetch, carrying the requested URL and the cause
#[derive(Debug, Clone, Error)]
#[error("failed to fetch {url}: {kind}")]
pub struct FetchError {
    pub url: String,
    pub kind: FetchErrorKind,
}

/// Why a fetch failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchErrorKind {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("failed to read body: {0}")]
    Body(String),

    #[error("request error: {0}")]
    Request(String),
}

impl FetchError {
    pub fn new(url: impl Into<String>, kind: FetchErrorKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }

    fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            FetchErrorKind::Timeout
        } else if error.is_connect() {
            FetchErrorKind::Connect(error.to_string())
        } else if error.is_body() || error.is_decode() {
            FetchErrorKind::Body(error.to_string())
        } else {
            FetchErrorKind::Request(error.to_string())
        };
        Self::new(url, kind)
    }
}

/// Performs a single GET per call
///
/// Implementations must never panic on network failure; every problem is
/// reported as a `FetchError`.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<PageContent, FetchError>> + Send;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `crawler` - Crawler settings carrying the request and connect timeouts
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(crawler.request_timeout())
        .connect_timeout(crawler.connect_timeout())
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// `Fetcher` backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds the client from configuration and wraps it
    pub fn from_config(
        user_agent: &UserAgentConfig,
        crawler: &CrawlerConfig,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(user_agent, crawler)?))
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<PageContent, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(url, FetchErrorKind::Status(status.as_u16())));
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        Ok(PageContent {
            url: final_url,
            status_code: status.as_u16(),
            body,
        })
    }
}
