//! Platform sources that poll Twitter and Reddit
//!
//! Each source normalizes its platform payloads into [`CollectedTopic`]s at
//! the boundary; nothing downstream sees a platform response shape.
//!
//! Requests go through [`ApiClient`], which applies a per-source `governor`
//! rate limit and retries transient failures with exponential backoff. The
//! monitor additionally wraps each source in a [`CircuitBreaker`] via
//! [`fetch_guarded`].

pub mod reddit;
pub mod twitter;

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::time::Duration;

use crate::models::{CollectedTopic, Platform};
use crate::utils::circuit::CircuitBreaker;
use crate::utils::retry::{with_retry_if, RetryConfig};

pub use reddit::RedditSource;
pub use twitter::TwitterSource;

/// Result type for source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors raised while polling a platform
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Credentials missing from the configuration
    #[error("{0} source is not configured")]
    NotConfigured(&'static str),

    /// Transport-level failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 429
    #[error("Rate limited by upstream API")]
    RateLimited,

    /// HTTP 5xx
    #[error("Upstream unavailable: HTTP {0}")]
    Unavailable(u16),

    /// Credentials rejected (401/403)
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Any other non-success status
    #[error("Request rejected: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Payload did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Source skipped because its circuit breaker is open
    #[error("Circuit open for {0}")]
    CircuitOpen(String),
}

impl SourceError {
    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::RateLimited | Self::Unavailable(_) => true,
            Self::NotConfigured(_)
            | Self::Auth(_)
            | Self::Rejected { .. }
            | Self::InvalidResponse(_)
            | Self::CircuitOpen(_) => false,
        }
    }

    /// Map a non-success status to an error
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status.as_u16() {
            429 => Self::RateLimited,
            401 | 403 => Self::Auth(format!("HTTP {status}: {body}")),
            code if status.is_server_error() => Self::Unavailable(code),
            code => Self::Rejected { status: code, body },
        }
    }
}

/// A platform that can be polled for topics
#[async_trait]
pub trait TrendSource: Send + Sync {
    /// Platform this source reports for
    fn platform(&self) -> Platform;

    /// Source name used in logs, metrics and alerts
    fn name(&self) -> &'static str {
        self.platform().as_str()
    }

    /// Poll the platform once
    ///
    /// A failure means "no observation this cycle"; callers never substitute
    /// zero-valued snapshots.
    async fn fetch(&self) -> SourceResult<Vec<CollectedTopic>>;
}

/// Poll `source` unless its breaker is open, recording the outcome
pub async fn fetch_guarded(
    source: &dyn TrendSource,
    breaker: &CircuitBreaker,
) -> SourceResult<Vec<CollectedTopic>> {
    if !breaker.allow() {
        tracing::warn!(
            source = source.name(),
            state = breaker.state().as_str(),
            "Skipping source while circuit is open"
        );
        return Err(SourceError::CircuitOpen(source.name().to_string()));
    }

    match source.fetch().await {
        Ok(topics) => {
            breaker.record_success();
            Ok(topics)
        }
        Err(e) => {
            breaker.record_failure();
            Err(e)
        }
    }
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate-limited HTTP client shared by the platform sources
pub struct ApiClient {
    client: Client,
    limiter: DirectLimiter,
    retry: RetryConfig,
}

impl ApiClient {
    pub fn new(
        timeout: Duration,
        requests_per_minute: u32,
        user_agent: &str,
        retry: RetryConfig,
    ) -> SourceResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .user_agent(user_agent)
            .build()?;

        let rate = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_minute(rate));

        Ok(Self {
            client,
            limiter,
            retry,
        })
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Send the request built by `build`, retrying transient failures
    ///
    /// `build` is invoked once per attempt.
    pub async fn send_json<T, F>(&self, build: F) -> SourceResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        with_retry_if(
            &self.retry,
            || self.send_once(build(&self.client)),
            SourceError::is_retryable,
        )
        .await
    }

    async fn send_once<T: DeserializeOwned>(&self, request: RequestBuilder) -> SourceResult<T> {
        self.limiter.until_ready().await;
        let response = request.send().await?;
        parse_json(response).await
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> SourceResult<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(SourceError::from_status(status, body));
    }

    serde_json::from_str(&body).map_err(|e| SourceError::InvalidResponse(e.to_string()))
}

/// Join a base URL and a path, tolerating a trailing slash on the base
pub(crate) fn endpoint(base: &str, path: &str) -> SourceResult<url::Url> {
    let joined = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));
    url::Url::parse(&joined).map_err(|e| SourceError::InvalidResponse(format!("bad URL {joined}: {e}")))
}
