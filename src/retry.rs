//! Retry-with-backoff wrapper for fallible async operations.
//!
//! Every remote page interaction goes through [`retry`]; it is the sole
//! retry mechanism at single-action granularity. Workflow-level recovery
//! (proxy swap) lives in the orchestrator at a coarser grain.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff policy for a retried operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt; an operation runs at
    /// most `max_attempts + 1` times.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            exponential: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following failed attempt number `attempt`
    /// (zero-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.exponential {
            let factor = 2u32.saturating_pow(attempt);
            self.base_delay.saturating_mul(factor).min(self.max_delay)
        } else {
            self.base_delay
        }
    }
}

/// Run `operation` until it succeeds or the policy is exhausted, sleeping
/// between attempts. The last error is returned to the caller unchanged.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    description: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= policy.max_attempts {
                    return Err(error);
                }
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    operation = description,
                    attempt = attempt + 1,
                    max_retries = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "retrying operation"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
