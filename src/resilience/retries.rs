//! Caller-side retry of guarded operations.
//!
//! # Responsibilities
//! - Re-issue an operation whose guard reported a timeout
//! - Space attempts with exponential backoff + jitter
//! - Stop at the configured attempt count
//!
//! # Design Decisions
//! - Only `Timeout` is retried; upstream failures belong to the caller
//! - The guard itself never retries; this sits one level above it
//! - Delays come from backoff.rs

use std::future::Future;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::timeouts::GuardError;

/// Run `make_operation` until it yields something other than a timeout or
/// the policy's attempts are spent.
///
/// `make_operation` receives the 1-based attempt number and must return a
/// freshly guarded attempt. With retries disabled it runs exactly once.
pub async fn retry_on_timeout<M, Fut, T, E>(
    policy: &RetryConfig,
    mut make_operation: M,
) -> Result<T, GuardError<E>>
where
    M: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GuardError<E>>>,
{
    let max_attempts = if policy.enabled { policy.max_attempts.max(1) } else { 1 };
    let mut attempt = 1;

    loop {
        match make_operation(attempt).await {
            Err(GuardError::Timeout { message, .. }) if attempt < max_attempts => {
                let delay = calculate_backoff(attempt, policy.base_delay_ms, policy.max_delay_ms);
                tracing::info!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    timeout_message = %message,
                    "Guarded operation timed out, retrying"
                );
                metrics::record_retry();
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}
