//! Metrics collection.
//!
//! # Metrics
//! - `guard_operations_total` (counter): guarded operations by `outcome`
//! - `guard_retries_total` (counter): re-issued attempts after a timeout
//!
//! Calls are no-ops until the host installs a `metrics` recorder.

/// How a guarded operation settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    UpstreamError,
    Timeout,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::UpstreamError => "upstream_error",
            Outcome::Timeout => "timeout",
        }
    }
}

/// Count one settled guarded operation.
pub fn record_outcome(outcome: Outcome) {
    ::metrics::counter!("guard_operations_total", "outcome" => outcome.as_str()).increment(1);
}

/// Count one retry after a timeout.
pub fn record_retry() {
    ::metrics::counter!("guard_retries_total").increment(1);
}
