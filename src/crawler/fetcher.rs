//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests for search and listing pages
//! - Error classification into transient, rate-limited and permanent failures
//!
//! Retries are delegated to the [`retry`](super::retry) state machine so the
//! policy can be tested without a network.

use crate::config::Config;
use crate::crawler::retry::{retry_with_policy, RetryPolicy};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Terminal failure of a fetch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Cancelled")]
    Cancelled,
}

/// How a fetch failure should be treated by the retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Timeouts, connection failures, 5xx: retried
    Transient,
    /// HTTP 429: retried with an extended backoff
    RateLimited,
    /// Other non-2xx: surfaced immediately
    Permanent,
    /// Operator abort: surfaced immediately
    Cancelled,
}

impl FetchError {
    /// Classifies the error for the retry policy
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Timeout | Self::Network(_) => ErrorClass::Transient,
            Self::HttpStatus(429) => ErrorClass::RateLimited,
            Self::HttpStatus(code) if (500..600).contains(code) => ErrorClass::Transient,
            Self::HttpStatus(_) => ErrorClass::Permanent,
            Self::Cancelled => ErrorClass::Cancelled,
        }
    }

    /// Returns true if another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self.class(), ErrorClass::Transient | ErrorClass::RateLimited)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if let Some(status) = e.status() {
            Self::HttpStatus(status.as_u16())
        } else if e.is_connect() {
            Self::Network(format!("connection failed: {}", e))
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Retrieves page markup by URL
///
/// The production implementation is [`HttpFetcher`]; tests substitute
/// in-memory fakes.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url` and returns its body, retrying per the fetcher's policy
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use villa_sweep::config::Config;
/// use villa_sweep::crawler::build_http_client;
///
/// let client = build_http_client(&Config::default()).unwrap();
/// ```
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = config.user_agent.header_value();

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.fetcher.timeout_seconds))
        .connect_timeout(Duration::from_secs(config.fetcher.connect_timeout_seconds))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed fetcher with retry and cancellation
pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl HttpFetcher {
    /// Creates a fetcher from the crawl configuration
    pub fn new(config: &Config, cancel: CancellationToken) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config)?;
        Ok(Self::with_client(
            client,
            RetryPolicy::from_config(&config.fetcher),
            cancel,
        ))
    }

    /// Creates a fetcher around an existing client
    pub fn with_client(client: Client, policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            client,
            policy,
            cancel,
        }
    }

    /// One GET request without retries
    ///
    /// Requests already in flight are not interrupted by cancellation; they
    /// finish or time out on their own.
    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::debug!("Rate limited on {}", url);
        }
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        retry_with_policy(&self.policy, &self.cancel, url, || self.fetch_once(url)).await
    }
}
