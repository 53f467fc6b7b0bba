//! Retry of advisor requests with capped exponential backoff.

use std::future::Future;
use std::time::Duration;

use crate::config::AdvisoryConfig;
use crate::error::BridgeError;

/// How often, and how patiently, a failing advisor request is repeated.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts including the first; zero behaves like one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&AdvisoryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AdvisoryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }

    /// Backoff before retry number `retry` (1-based), without jitter.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_backoff.as_secs_f64()))
    }

    /// Run `operation` until it succeeds, fails permanently, or runs out of attempts.
    ///
    /// A `RateLimited` error carrying a retry-after hint waits that long
    /// (capped at `max_backoff`) instead of the computed backoff.
    pub async fn execute<F, Fut, T>(&self, advisor: &str, mut operation: F) -> Result<T, BridgeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BridgeError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !err.is_retryable() || attempt >= max_attempts {
                return Err(err);
            }

            let delay = match &err {
                BridgeError::RateLimited {
                    retry_after_ms: Some(ms),
                } => Duration::from_millis(*ms).min(self.max_backoff),
                _ => jittered(self.backoff_for(attempt)),
            };
            tracing::warn!(
                advisor,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "advisor request failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Spread `base` over 75%..125% so concurrent callers do not retry in lockstep.
fn jittered(base: Duration) -> Duration {
    let sample = (uuid::Uuid::new_v4().as_u128() % 10_000) as f64 / 10_000.0;
    base.mul_f64(0.75 + sample * 0.5)
}
