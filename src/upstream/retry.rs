//! Retry Policy
//!
//! Bounded retry for upstream fetches. Only transient failures (timeouts and
//! transport errors) are retried; auth, format and rate-limit failures end
//! the call immediately.

use crate::error::FetchError;
use backoff::backoff::Constant;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::warn;

/// Retry policy owned by the upstream adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Check whether attempt number `attempt` (1-based) may be followed by another
    pub fn should_retry(&self, error: &FetchError, attempt: u32) -> bool {
        attempt < self.max_attempts.max(1) && error.is_transient()
    }

    /// Run `operation` under this policy. `operation` receives the 1-based
    /// attempt number.
    pub async fn run<T, F, Fut>(&self, source: &str, mut operation: F) -> Result<T, FetchError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let policy = *self;
        let attempts = AtomicU32::new(0);

        backoff::future::retry_notify(
            Constant::new(self.backoff),
            || {
                let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                let call = operation(attempt);
                async move {
                    call.await.map_err(|e| {
                        if policy.should_retry(&e, attempt) {
                            backoff::Error::transient(e)
                        } else {
                            backoff::Error::permanent(e)
                        }
                    })
                }
            },
            |e: FetchError, delay: Duration| {
                warn!(
                    source = %source,
                    attempt = attempts.load(Ordering::Relaxed),
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Upstream fetch failed, retrying"
                );
            },
        )
        .await
    }
}
