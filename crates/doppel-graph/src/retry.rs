//! Retry with exponential backoff for transient store failures
//!
//! Wraps a store call in a timeout and retries it while
//! [`GraphError::is_retryable`] holds, doubling the delay between
//! attempts. When attempts run out the last error is surfaced as
//! [`GraphError::Transaction`] with the attempt count, marked
//! non-retryable so callers do not loop again.

use crate::error::GraphError;
use std::future::Future;
use std::time::Duration;

/// Backoff parameters for transient-failure handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Ceiling for the doubled delay
    pub max_delay: Duration,
    /// Per-attempt timeout on the wrapped call
    pub op_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            op_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Override the attempt budget
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Override the initial backoff delay
    #[must_use]
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Override the backoff ceiling
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Override the per-attempt timeout
    #[must_use]
    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    /// Delay to wait after the given attempt (1-based)
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1 << exp)
            .min(self.max_delay)
    }
}

/// Run `op` under the policy, retrying transient failures
///
/// `op` is invoked fresh per attempt, so it must be cheap to rebuild its
/// input (clone the batch, not re-abstract the resource).
///
/// # Errors
/// Non-retryable errors pass through unchanged. A retryable error that
/// survives the attempt budget comes back as [`GraphError::Transaction`]
/// with `attempts` set and `retryable: false`.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, GraphError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GraphError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let outcome = match tokio::time::timeout(policy.op_timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(GraphError::Timeout(policy.op_timeout)),
        };
        match outcome {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient graph failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) if err.is_retryable() => {
                tracing::error!(
                    operation,
                    attempts = attempt,
                    error = %err,
                    "retries exhausted"
                );
                return Err(GraphError::Transaction {
                    attempts: attempt,
                    reason: err.to_string(),
                    retryable: false,
                });
            }
            Err(err) => return Err(err),
        }
    }
}
