//! Bounded exponential backoff.
//!
//! The store may be restarting mid-migration, so callers poll with growing
//! delays instead of blocking indefinitely. Non-retryable errors are
//! surfaced immediately; exhausting the time budget yields a typed
//! [`CoordinatorError::Timeout`].

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::errors::{CoordinatorError, Result};

/// Retry policy: initial 1s delay, doubling to a 10s cap, ~60s total.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub total_timeout: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            total_timeout: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// Tight policy for tests: millisecond delays, sub-second budget.
    pub fn fast() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            total_timeout: Duration::from_millis(500),
        }
    }
}

/// Run `op` until it succeeds, fails non-retryably, or the budget runs out.
pub async fn retry_with_backoff<T, F, Fut>(
    operation: &str,
    policy: BackoffPolicy,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let mut delay = policy.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => {
                let elapsed = started.elapsed();
                if elapsed + delay > policy.total_timeout {
                    debug!(
                        operation,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "retry budget exhausted"
                    );
                    return Err(CoordinatorError::timeout(operation, elapsed.as_millis() as u64));
                }
                debug!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(policy.max_delay);
            }
        }
    }
}
