//! Retry policy for upstream requests
//!
//! Only a small set of HTTP statuses is treated as transient: 429, 503 and the
//! rest of the 5xx range. Everything else is final on the first attempt.
//! The wait after failed attempt `n` (counting from 1) is `backoff_unit * 2^n`,
//! optionally stretched by random jitter.
//!
//! # Example
//!
//! ```
//! use marketdata_hub::config::RetryConfig;
//! use marketdata_hub::retry::{IsRetryable, RetryPolicy};
//! use reqwest::StatusCode;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::from(&RetryConfig::default());
//! assert!(StatusCode::TOO_MANY_REQUESTS.is_retryable());
//! assert!(!StatusCode::BAD_REQUEST.is_retryable());
//! assert_eq!(policy.delay_after(1), Duration::from_secs(2));
//! assert_eq!(policy.delay_after(2), Duration::from_secs(4));
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use rand::Rng;
use reqwest::StatusCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Classification of a failure as transient or final
pub trait IsRetryable {
    /// Returns true if the failure is transient and the request should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for StatusCode {
    fn is_retryable(&self) -> bool {
        *self == StatusCode::TOO_MANY_REQUESTS
            || *self == StatusCode::SERVICE_UNAVAILABLE
            || self.is_server_error()
    }
}

/// Attempt cap and backoff schedule
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_unit: Duration,
    jitter: bool,
}

impl RetryPolicy {
    /// Create a policy
    ///
    /// `max_attempts` counts the first request; a value of 0 is treated as 1.
    pub fn new(max_attempts: u32, backoff_unit: Duration, jitter: bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_unit,
            jitter,
        }
    }

    /// Total number of attempts, first one included
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Un-jittered wait after failed attempt `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.backoff_unit.saturating_mul(factor)
    }

    /// Sleep before the next attempt
    ///
    /// # Errors
    ///
    /// [`Error::Cancelled`] if `cancel` fires during the wait.
    pub async fn backoff(&self, attempt: u32, cancel: &CancellationToken) -> Result<()> {
        let delay = self.delay_after(attempt);
        let delay = if self.jitter {
            add_jitter(delay)
        } else {
            delay
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.backoff_unit_ms),
            config.jitter,
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
