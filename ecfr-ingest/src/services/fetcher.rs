//! Rate-limited HTTP retrieval with retry on "too many requests"
//!
//! **Policy:**
//! 1. Take a token from the shared [`RateLimiter`] before every attempt
//! 2. HTTP 2xx: return the body
//! 3. HTTP 429: back off `initial_delay × 2^attempt` and retry, up to
//!    `max_attempts` attempts in total (no sleep after the last one)
//! 4. Anything else: return at once, classified by the [`FailureClassifier`]
//!
//! The network sits behind [`HttpTransport`] so the policy can be driven by a
//! scripted transport in tests.

use crate::error::{FetchError, FetchErrorKind};
use crate::services::rate_limiter::RateLimiter;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// HTTP status the source uses to signal rate limiting
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

// ============================================================================
// Transport
// ============================================================================

/// Raw response: status code and body bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failure (no HTTP status available)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Connect(String),
    Timeout(String),
    Other(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connect(msg) => write!(f, "connection failed: {}", msg),
            TransportError::Timeout(msg) => write!(f, "timed out: {}", msg),
            TransportError::Other(msg) => write!(f, "request failed: {}", msg),
        }
    }
}

/// Issues one GET request
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(
        user_agent: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

// ============================================================================
// Policy
// ============================================================================

/// What went wrong on one attempt, as seen by the classifier
#[derive(Debug, Clone, Copy)]
pub enum AttemptFailure<'a> {
    Status(u16),
    Transport(&'a TransportError),
}

/// Maps a non-429 failure to a fetch error kind
pub type FailureClassifier = Arc<dyn Fn(AttemptFailure<'_>) -> FetchErrorKind + Send + Sync>;

/// Connect/timeout failures and 5xx are transient; everything else permanent
pub fn default_classifier(failure: AttemptFailure<'_>) -> FetchErrorKind {
    match failure {
        AttemptFailure::Status(status) if (500..600).contains(&status) => FetchErrorKind::Transient,
        AttemptFailure::Status(_) => FetchErrorKind::Permanent,
        AttemptFailure::Transport(TransportError::Connect(_) | TransportError::Timeout(_)) => {
            FetchErrorKind::Transient
        }
        AttemptFailure::Transport(TransportError::Other(_)) => FetchErrorKind::Permanent,
    }
}

/// Retry bounds for rate-limited responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl RetryPolicy {
    /// Delay after the given zero-based attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
        }
    }
}

// ============================================================================
// Fetcher
// ============================================================================

/// Fetches URLs through the shared rate limiter, retrying on 429
#[derive(Clone)]
pub struct RetryingFetcher {
    transport: Arc<dyn HttpTransport>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    classifier: FailureClassifier,
}

impl RetryingFetcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            limiter,
            policy,
            classifier: Arc::new(default_classifier),
        }
    }

    /// Replace the failure classifier
    pub fn with_classifier(mut self, classifier: FailureClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetch the body of `url`
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_cause = String::new();

        for attempt in 0..max_attempts {
            self.limiter.acquire().await;

            if attempt > 0 {
                tracing::debug!(url = %url, attempt = attempt + 1, "Retrying request");
            }

            let response = match self.transport.get(url).await {
                Ok(response) => response,
                Err(e) => {
                    let kind = (self.classifier)(AttemptFailure::Transport(&e));
                    tracing::warn!(url = %url, attempt = attempt + 1, kind = %kind, error = %e, "Request failed");
                    return Err(FetchError::new(kind, url, attempt + 1, e.to_string()));
                }
            };

            if response.is_success() {
                return Ok(response.body);
            }

            if response.status != STATUS_TOO_MANY_REQUESTS {
                let kind = (self.classifier)(AttemptFailure::Status(response.status));
                tracing::warn!(url = %url, status = response.status, kind = %kind, "Request rejected");
                return Err(FetchError::new(
                    kind,
                    url,
                    attempt + 1,
                    status_cause(&response),
                ));
            }

            last_cause = status_cause(&response);

            if attempt + 1 < max_attempts {
                let delay = self.policy.delay_for(attempt);
                tracing::warn!(
                    url = %url,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited by source, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }

        tracing::error!(url = %url, attempts = max_attempts, "Rate limit retries exhausted");
        Err(FetchError::new(
            FetchErrorKind::RateLimited,
            url,
            max_attempts,
            last_cause,
        ))
    }
}

fn status_cause(response: &TransportResponse) -> String {
    let snippet: String = String::from_utf8_lossy(&response.body)
        .chars()
        .take(200)
        .collect();
    if snippet.trim().is_empty() {
        format!("HTTP {}", response.status)
    } else {
        format!("HTTP {}: {}", response.status, snippet.trim())
    }
}
