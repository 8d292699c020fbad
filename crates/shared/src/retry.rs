use std::future::Future;
use std::time::Duration;

use crate::error::{ApiError, Result};

/// Bounded retry with exponential backoff for transient API failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(1000),
            rate_limit_delay: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries without sleeping, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            rate_limit_delay: Duration::ZERO,
        }
    }

    /// Delay before the retry that follows failed attempt number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32, err: &ApiError) -> Duration {
        if err.is_rate_limit() {
            // Longer, linear backoff for rate limits
            self.rate_limit_delay * (attempt + 1)
        } else {
            self.base_delay * 2_u32.saturating_pow(attempt)
        }
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, what: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_if(what, ApiError::is_transient, op).await
    }

    /// Like [`run`](Self::run), but `retryable` decides which errors get another attempt.
    pub async fn run_if<T, F, Fut, P>(&self, what: &str, retryable: P, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&ApiError) -> bool,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if retryable(&e) && attempt + 1 < attempts => {
                    let backoff = self.backoff(attempt, &e);
                    if e.is_rate_limit() {
                        tracing::warn!(what, ?backoff, "rate limit hit, waiting before retry");
                    } else {
                        tracing::debug!(what, attempt, error = %e, ?backoff, "retrying");
                    }
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
