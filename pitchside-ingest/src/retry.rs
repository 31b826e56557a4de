//! Retry controller
//!
//! Bounded exponential backoff around the per-message unit of work.
//! Transient storage failures are retried with a doubling, capped delay;
//! everything else fails on the spot. Exhaustion produces a terminal
//! result the worker routes to the dead-letter channel, never a silent
//! drop or an unbounded loop.

use std::time::Duration;

use crate::error::IngestError;

/// Backoff policy for transient failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total delivery attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles per attempt
    pub base_delay: Duration,
    /// Ceiling for the per-attempt delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay to apply after the given (1-based) failed attempt
    fn delay_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << shift);
        delay.min(self.max_delay)
    }
}

/// Terminal failure of a unit of work: retries exhausted, or a
/// non-retryable storage error. Carries the context the dead-letter
/// channel records.
#[derive(Debug)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last_error: IngestError,
}

/// Run an operation under the retry policy.
///
/// Only errors classified transient are retried. A non-transient error
/// fails immediately with the attempt count reached so far; conflict-class
/// errors never reach this layer (the pipeline resolves them internally).
pub async fn run_with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, IngestError>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = operation_name,
                        attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if !err.is_transient() => {
                tracing::error!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    "Non-retryable failure"
                );
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: err,
                });
            }
            Err(err) => {
                if attempt >= policy.max_attempts {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Retries exhausted"
                    );
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: err,
                    });
                }

                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, will retry after backoff"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
