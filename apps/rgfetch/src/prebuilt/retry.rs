//! Retry policy for network operations.
//!
//! The installer wraps the asset fetch in a [`RetryPolicy`]. Each failed
//! attempt is classified with [`crate::errors::is_retryable`]; fatal errors
//! return immediately, transient ones are retried after an exponentially
//! growing delay until the attempt budget is spent.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;

use crate::errors::is_retryable;

/// Default number of attempts, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay before the first retry.
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default growth factor between consecutive delays.
const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Exponential backoff policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Factor applied to the delay after each retry.
    pub multiplier: f64,
    /// Whether to spread delays by +/- 25%.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Returns a policy that makes exactly one attempt.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Returns a copy of this policy with a different attempt count.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Returns the delay to wait before retry number `retry` (starting at 1).
    ///
    /// Without jitter the sequence is `base, base*m, base*m^2, ...`.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let nominal = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let seconds = if self.jitter && nominal > 0.0 {
            let spread = nominal / 4.0;
            rand::rng().random_range((nominal - spread)..=(nominal + spread))
        } else {
            nominal
        };
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }

    /// Runs `operation` until it succeeds, fails fatally, or the attempts run out.
    ///
    /// The closure receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the last error once every
    /// attempt has failed.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= max_attempts || !is_retryable(&e) => return Err(e),
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "Attempt {attempt}/{max_attempts} failed: {e:#}. Retrying in {:.1}s",
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
