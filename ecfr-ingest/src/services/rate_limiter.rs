//! Process-wide token bucket for outbound requests
//!
//! Capacity is the burst size; tokens refill continuously at `rate` per
//! second. Refill is lazy: it is computed from the elapsed time whenever a
//! caller asks for a token. The bucket starts full.
//!
//! One instance is built at startup and shared as `Arc<RateLimiter>` by every
//! fetcher, so all workers draw from the same budget.

use crate::error::{IngestError, IngestResult};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Longest single sleep in [`RateLimiter::acquire`]; the bucket is rechecked after it
const MAX_WAIT: Duration = Duration::from_secs(3600);

/// Mutable bucket state, only touched under the limiter's mutex
#[derive(Debug)]
struct RateBudget {
    tokens: f64,
    last_refill: Instant,
}

impl RateBudget {
    fn refill(&mut self, now: Instant, rate: f64, capacity: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last_refill = now;
    }
}

/// Token bucket rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    budget: Mutex<RateBudget>,
    rate: f64,
    burst: u32,
}

impl RateLimiter {
    /// Create a limiter admitting `rate` requests/second with bursts up to `burst`
    pub fn new(rate: f64, burst: u32) -> IngestResult<Self> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(IngestError::Config(format!(
                "rate limit must be a positive number of requests per second, got {}",
                rate
            )));
        }
        if burst == 0 {
            return Err(IngestError::Config("rate limit burst must be at least 1".into()));
        }

        Ok(Self {
            budget: Mutex::new(RateBudget {
                tokens: f64::from(burst),
                last_refill: Instant::now(),
            }),
            rate,
            burst,
        })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Wait for a token and take it
    ///
    /// The refill and debit happen in one critical section. A caller that
    /// finds the bucket empty releases the lock and sleeps until the next
    /// token is due, then tries again.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut budget = self.budget.lock().await;
                budget.refill(Instant::now(), self.rate, f64::from(self.burst));

                if budget.tokens >= 1.0 {
                    budget.tokens -= 1.0;
                    return;
                }

                Duration::try_from_secs_f64((1.0 - budget.tokens) / self.rate)
                    .map_or(MAX_WAIT, |wait| wait.min(MAX_WAIT))
            };

            tracing::trace!(wait_ms = wait.as_millis() as u64, "Rate limit: waiting for token");
            tokio::time::sleep(wait).await;
        }
    }

    /// Take a token if one is available right now
    pub async fn try_acquire(&self) -> bool {
        let mut budget = self.budget.lock().await;
        budget.refill(Instant::now(), self.rate, f64::from(self.burst));

        if budget.tokens >= 1.0 {
            budget.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Whole tokens currently available
    pub async fn available(&self) -> u32 {
        let mut budget = self.budget.lock().await;
        budget.refill(Instant::now(), self.rate, f64::from(self.burst));
        budget.tokens.floor() as u32
    }
}
