//! Timeout enforcement.
//!
//! # Responsibilities
//! - Race a pending operation against a deadline
//! - Keep timeout failures distinct from upstream failures
//! - Release the timer on whichever path settles the race
//!
//! # Design Decisions
//! - Uses Tokio's timer facilities (`sleep` raced in `select!`)
//! - The guard changes what is observed, not what is running: pass `&mut fut`
//!   to keep the operation alive past a timeout, or use `spawn_with_timeout`
//! - Ties go to the operation (biased select, operation polled first)
//!
//! # Example
//! ```no_run
//! use std::time::Duration;
//! use timeout_guard::resilience::timeouts::{with_backend_timeout, with_timeout};
//!
//! # async fn demo() {
//! let listings = with_timeout(
//!     async { Ok::<_, std::io::Error>(vec!["flat", "villa"]) },
//!     Duration::from_millis(50),
//!     None,
//! )
//! .await;
//! assert!(listings.is_ok());
//!
//! let session = with_backend_timeout(async { Ok::<_, std::io::Error>(()) }, Some("session refresh")).await;
//! assert!(session.is_ok());
//! # }
//! ```

use std::future::{Future, IntoFuture};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::config::TimeoutConfig;
use crate::observability::metrics;

/// Deadline of the generic guard.
pub const DEFAULT_DEADLINE: Duration = Duration::from_millis(30_000);

/// Deadline of the backend-data guard.
pub const BACKEND_DEADLINE: Duration = Duration::from_millis(15_000);

/// Message carried by a timeout when the caller supplies none.
pub const DEFAULT_TIMEOUT_MESSAGE: &str = "the operation took too long";

/// Operation name used by the backend-data message when none is given.
pub const DEFAULT_OPERATION_NAME: &str = "operation";

/// Failure produced by a guarded operation.
#[derive(Debug, Error, PartialEq)]
pub enum GuardError<E> {
    /// The deadline elapsed before the operation settled.
    #[error("{message}")]
    Timeout { message: String, deadline: Duration },

    /// The operation itself failed; the error is passed through untouched.
    #[error("{0}")]
    Upstream(E),
}

impl<E> GuardError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, GuardError::Timeout { .. })
    }

    /// The upstream error, if this is not a timeout.
    pub fn upstream(&self) -> Option<&E> {
        match self {
            GuardError::Upstream(e) => Some(e),
            GuardError::Timeout { .. } => None,
        }
    }

    pub fn into_upstream(self) -> Option<E> {
        match self {
            GuardError::Upstream(e) => Some(e),
            GuardError::Timeout { .. } => None,
        }
    }
}

/// Render the backend-data timeout message for `operation_name`.
pub fn backend_timeout_message(operation_name: &str) -> String {
    format!(
        "The {} took too long. Check your connection or try again.",
        operation_name
    )
}

/// Race `operation` against `deadline`.
///
/// Resolves with the operation's value or its error if it settles first,
/// otherwise fails with [`GuardError::Timeout`] carrying `message` (or
/// [`DEFAULT_TIMEOUT_MESSAGE`]).
///
/// An operation passed by value is dropped when the deadline wins. Pass
/// `&mut fut` for an `Unpin` future to keep ownership and poll it further.
pub async fn with_timeout<F, T, E>(
    operation: F,
    deadline: Duration,
    message: Option<&str>,
) -> Result<T, GuardError<E>>
where
    F: IntoFuture<Output = Result<T, E>>,
{
    let message = message.unwrap_or(DEFAULT_TIMEOUT_MESSAGE).to_owned();
    race(operation.into_future(), deadline, message).await
}

/// [`with_timeout`] with the 30 second default deadline.
pub async fn with_default_timeout<F, T, E>(
    operation: F,
    message: Option<&str>,
) -> Result<T, GuardError<E>>
where
    F: IntoFuture<Output = Result<T, E>>,
{
    with_timeout(operation, DEFAULT_DEADLINE, message).await
}

/// Guard for backend-data calls: 15 second deadline and a
/// connection-check message naming the operation.
pub async fn with_backend_timeout<F, T, E>(
    operation: F,
    operation_name: Option<&str>,
) -> Result<T, GuardError<E>>
where
    F: IntoFuture<Output = Result<T, E>>,
{
    let message = backend_timeout_message(operation_name.unwrap_or(DEFAULT_OPERATION_NAME));
    race(operation.into_future(), BACKEND_DEADLINE, message).await
}

/// Spawn `operation` as its own task and wait for it at most `deadline`.
///
/// On timeout the task is detached, not aborted: it runs to completion and
/// its result is discarded. A panic inside the operation is resumed here.
pub async fn spawn_with_timeout<F, T, E>(
    operation: F,
    deadline: Duration,
    message: Option<&str>,
) -> Result<T, GuardError<E>>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let message = message.unwrap_or(DEFAULT_TIMEOUT_MESSAGE).to_owned();
    race(detach(operation), deadline, message).await
}

async fn detach<F, T>(operation: F) -> T
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    join_detached(tokio::spawn(operation)).await
}

async fn join_detached<T>(handle: JoinHandle<T>) -> T {
    match handle.await {
        Ok(output) => output,
        Err(err) => match err.try_into_panic() {
            Ok(payload) => std::panic::resume_unwind(payload),
            // Cancelled (runtime shutdown): no result will ever come, so
            // never settle and leave the outcome to the caller's deadline.
            Err(err) => {
                tracing::debug!(error = %err, "Guarded task cancelled");
                std::future::pending().await
            }
        },
    }
}

async fn race<F, T, E>(operation: F, deadline: Duration, message: String) -> Result<T, GuardError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    let started = Instant::now();

    let outcome = tokio::select! {
        biased;
        result = operation => result.map_err(GuardError::Upstream),
        () = time::sleep(deadline) => Err(GuardError::Timeout { message, deadline }),
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &outcome {
        Ok(_) => {
            metrics::record_outcome(metrics::Outcome::Success);
            tracing::trace!(elapsed_ms, "Guarded operation completed");
        }
        Err(GuardError::Upstream(_)) => {
            metrics::record_outcome(metrics::Outcome::UpstreamError);
            tracing::debug!(elapsed_ms, "Guarded operation failed upstream");
        }
        Err(GuardError::Timeout { message, deadline }) => {
            metrics::record_outcome(metrics::Outcome::Timeout);
            tracing::warn!(
                deadline_ms = deadline.as_millis() as u64,
                timeout_message = %message,
                "Guarded operation timed out"
            );
        }
    }

    outcome
}

/// Timeout guard bound to a [`TimeoutConfig`].
#[derive(Debug, Clone)]
pub struct TimeoutGuard {
    default_deadline: Duration,
    backend_deadline: Duration,
    default_message: String,
}

impl TimeoutGuard {
    pub fn new(config: &TimeoutConfig) -> Self {
        Self {
            default_deadline: Duration::from_millis(config.default_ms),
            backend_deadline: Duration::from_millis(config.backend_ms),
            default_message: config.default_message.clone(),
        }
    }

    pub fn default_deadline(&self) -> Duration {
        self.default_deadline
    }

    pub fn backend_deadline(&self) -> Duration {
        self.backend_deadline
    }

    /// Guard with the configured default deadline and message.
    pub async fn guard<F, T, E>(&self, operation: F, message: Option<&str>) -> Result<T, GuardError<E>>
    where
        F: IntoFuture<Output = Result<T, E>>,
    {
        let message = message.unwrap_or(&self.default_message).to_owned();
        race(operation.into_future(), self.default_deadline, message).await
    }

    /// Guard with the configured backend deadline and connection-check message.
    pub async fn guard_backend<F, T, E>(
        &self,
        operation: F,
        operation_name: Option<&str>,
    ) -> Result<T, GuardError<E>>
    where
        F: IntoFuture<Output = Result<T, E>>,
    {
        let message = backend_timeout_message(operation_name.unwrap_or(DEFAULT_OPERATION_NAME));
        race(operation.into_future(), self.backend_deadline, message).await
    }

    /// Detached variant of [`TimeoutGuard::guard`]; see [`spawn_with_timeout`].
    pub async fn spawn_guard<F, T, E>(&self, operation: F, message: Option<&str>) -> Result<T, GuardError<E>>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let message = message.unwrap_or(&self.default_message).to_owned();
        race(detach(operation), self.default_deadline, message).await
    }
}

impl Default for TimeoutGuard {
    fn default() -> Self {
        Self::new(&TimeoutConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    async fn settle_after<T, E>(ms: u64, result: Result<T, E>) -> Result<T, E> {
        time::sleep(Duration::from_millis(ms)).await;
        result
    }

    fn assert_elapsed_about(started: Instant, expected: Duration) {
        let elapsed = started.elapsed();
        assert!(elapsed >= expected, "elapsed {:?} < {:?}", elapsed, expected);
        assert!(
            elapsed < expected + Duration::from_millis(5),
            "elapsed {:?} overshot {:?}",
            elapsed,
            expected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_operation_wins() {
        let result = with_timeout(
            settle_after(5, Ok::<_, &str>("ok")),
            Duration::from_millis(50),
            None,
        )
        .await;
        assert_eq!(result, Ok("ok"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_operation_times_out_with_default_message() {
        let result = with_timeout(
            settle_after(100, Ok::<_, &str>("ok")),
            Duration::from_millis(50),
            None,
        )
        .await;

        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), DEFAULT_TIMEOUT_MESSAGE);
        assert_eq!(
            err,
            GuardError::Timeout {
                message: "the operation took too long".to_string(),
                deadline: Duration::from_millis(50),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_message() {
        let err = with_timeout(
            std::future::pending::<Result<(), &str>>(),
            Duration::from_millis(10),
            Some("listing search stalled"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "listing search stalled");
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_guard_names_operation() {
        let started = Instant::now();
        let err = with_backend_timeout(std::future::pending::<Result<(), &str>>(), Some("query"))
            .await
            .unwrap_err();

        assert_elapsed_about(started, Duration::from_millis(15_000));
        let message = err.to_string();
        assert!(message.contains("query"));
        assert!(message.contains("Check your connection or try again."));
        assert_eq!(
            message,
            "The query took too long. Check your connection or try again."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_guard_default_name() {
        let err = with_backend_timeout(std::future::pending::<Result<(), &str>>(), None)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "The operation took too long. Check your connection or try again."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_failure_is_not_reworded() {
        let err = with_timeout(
            async { Err::<(), _>("DB down") },
            Duration::from_millis(50),
            None,
        )
        .await
        .unwrap_err();

        assert_eq!(err, GuardError::Upstream("DB down"));
        assert_eq!(err.to_string(), "DB down");
        assert_eq!(err.into_upstream(), Some("DB down"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_failure_still_times_out() {
        let err = with_timeout(
            settle_after(80, Err::<(), _>("DB down")),
            Duration::from_millis(50),
            None,
        )
        .await
        .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.upstream().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_deadline_is_thirty_seconds() {
        let started = Instant::now();
        let err = with_default_timeout(std::future::pending::<Result<(), ()>>(), None)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_elapsed_about(started, Duration::from_millis(30_000));

        let just_in_time =
            with_default_timeout(settle_after(29_999, Ok::<_, ()>(1)), None).await;
        assert_eq!(just_in_time, Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_operation_beats_zero_deadline() {
        let result = with_timeout(async { Ok::<_, ()>(42) }, Duration::ZERO, None).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_borrowed_operation_survives_timeout() {
        let mut operation = Box::pin(settle_after(100, Ok::<_, ()>("late")));

        let err = with_timeout(&mut operation, Duration::from_millis(50), None)
            .await
            .unwrap_err();
        assert!(err.is_timeout());

        // Still owned by the caller and able to finish.
        assert_eq!(operation.await, Ok("late"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_operation_keeps_running_after_timeout() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let err = spawn_with_timeout(
            async move {
                time::sleep(Duration::from_millis(100)).await;
                flag.store(true, Ordering::SeqCst);
                Ok::<_, ()>(())
            },
            Duration::from_millis(50),
            None,
        )
        .await
        .unwrap_err();
        assert!(err.is_timeout());
        assert!(!finished.load(Ordering::SeqCst));

        time::sleep(Duration::from_millis(100)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_task_settles_as_timeout() {
        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();

        let err = with_timeout(
            async { Ok::<_, &str>(join_detached(handle).await) },
            Duration::from_millis(50),
            None,
        )
        .await
        .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_operation_result_is_returned() {
        let result = spawn_with_timeout(
            settle_after(5, Ok::<_, String>("spawned")),
            Duration::from_millis(50),
            None,
        )
        .await;
        assert_eq!(result, Ok("spawned"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_uses_configured_values() {
        let config = TimeoutConfig {
            default_ms: 200,
            backend_ms: 100,
            default_message: "lookup is slow".to_string(),
        };
        let guard = TimeoutGuard::new(&config);
        assert_eq!(guard.default_deadline(), Duration::from_millis(200));
        assert_eq!(guard.backend_deadline(), Duration::from_millis(100));

        let started = Instant::now();
        let err = guard
            .guard(std::future::pending::<Result<(), &str>>(), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "lookup is slow");
        assert_elapsed_about(started, Duration::from_millis(200));

        let started = Instant::now();
        let err = guard
            .guard_backend(std::future::pending::<Result<(), &str>>(), Some("session refresh"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "The session refresh took too long. Check your connection or try again."
        );
        assert_elapsed_about(started, Duration::from_millis(100));

        let ok = guard.spawn_guard(settle_after(10, Ok::<_, ()>(3)), None).await;
        assert_eq!(ok, Ok(3));
    }

    #[test]
    fn test_default_guard_matches_constants() {
        let guard = TimeoutGuard::default();
        assert_eq!(guard.default_deadline(), DEFAULT_DEADLINE);
        assert_eq!(guard.backend_deadline(), BACKEND_DEADLINE);
    }
}
