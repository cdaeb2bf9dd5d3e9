//! Bounded exponential backoff for ledger and fetch calls.
//!
//! Only errors the caller classifies as transient are retried; everything
//! else is returned after the first attempt.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub base_delay_ms: u64,
    /// Upper bound for any single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based): 200ms, 400ms, 800ms, ...
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }
}

/// The last error of a retried operation and how many attempts were made.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub error: E,
    pub attempts: u32,
}

/// Run `f` until it succeeds, fails with a non-retriable error, or the
/// policy's attempts are used up.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    is_retriable: impl Fn(&E) -> bool,
    mut f: F,
) -> Result<T, Exhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < max_attempts && is_retriable(&error) => {
                let delay = policy.delay_for(attempt - 1);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts,
                    "transient failure, retrying in {delay:?}: {error}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => {
                return Err(Exhausted {
                    error,
                    attempts: attempt,
                })
            }
        }
    }
}
