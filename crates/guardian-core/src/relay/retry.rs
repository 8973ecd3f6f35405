//! Retry with exponential backoff for AI worker calls.
//!
//! Delay before retry `n` (1-indexed) is
//! `min(initial * multiplier^(n-1), max)`, optionally jittered by ±25% and
//! capped again.

use guardian_types::{BackoffConfig, RelayError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use super::prometheus;

const JITTER_RATIO: f64 = 0.25;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: &BackoffConfig) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(backoff.initial_delay_ms),
            max_delay: Duration::from_millis(backoff.max_delay_ms),
            multiplier: backoff.multiplier,
            jitter: backoff.jitter,
        }
    }

    /// Delay before retry `retry` without jitter.
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let raw_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let max_ms = self.max_delay.as_millis() as f64;
        Duration::from_millis(raw_ms.min(max_ms) as u64)
    }

    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        if !self.jitter {
            return base;
        }
        let factor = rand::thread_rng().gen_range(-JITTER_RATIO..=JITTER_RATIO);
        let jittered_ms = (base.as_millis() as f64 * (1.0 + factor)).max(0.0);
        Duration::from_millis(jittered_ms as u64).min(self.max_delay)
    }

    /// Run `attempt` until it succeeds, fails with a non-retryable error, or
    /// `max_attempts` is exhausted. The closure receives the 1-indexed attempt.
    pub async fn run<T, F, Fut>(&self, endpoint: &'static str, mut attempt: F) -> Result<T, RelayError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, RelayError>>,
    {
        let mut n = 1;
        loop {
            match attempt(n).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && n < self.max_attempts => {
                    let delay = self.delay_for_retry(n);
                    debug!(
                        endpoint,
                        attempt = n,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying AI worker request"
                    );
                    prometheus::record_worker_retry(endpoint);
                    sleep(delay).await;
                    n += 1;
                },
                Err(err) => return Err(err),
            }
        }
    }
}
