//! Bounded exponential backoff for the completion and image endpoints.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::Result;

/// Total attempts, first call included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Base backoff. Delay before retry `i` is `base * 2^i + jitter`.
pub const DEFAULT_RETRY_BASE: Duration = Duration::from_secs(1);
/// Exclusive upper bound of the random jitter added to every delay.
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base: DEFAULT_RETRY_BASE,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base: Duration, max_jitter: Duration) -> Self {
        Self {
            max_attempts,
            base,
            max_jitter,
        }
    }

    /// Same attempt budget, no sleeping between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// Half-open range `[low, high)` the delay before retry `attempt` falls in.
    pub fn delay_bounds(&self, attempt: u32) -> (Duration, Duration) {
        let low = self.base.saturating_mul(2u32.saturating_pow(attempt));
        (low, low + self.max_jitter)
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let (low, _) = self.delay_bounds(attempt);
        let jitter_nanos = self.max_jitter.as_nanos() as u64;
        if jitter_nanos == 0 {
            return low;
        }
        low + Duration::from_nanos(rand::rng().random_range(0..jitter_nanos))
    }

    /// Run `call` until it succeeds, fails terminally, or the attempt budget
    /// is spent. The last error is returned as-is.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt + 1 < attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
