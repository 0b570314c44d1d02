//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Caller's pending operation:
//!     → timeouts.rs (race against the deadline)
//!     → Ok(value) | Upstream(error) | Timeout(message)
//!     → On Timeout, optionally: retries.rs (re-issue after backoff.rs delay)
//! ```
//!
//! # Design Decisions
//! - Every backend-data call gets a deadline
//! - Timeout is the only failure the guard invents; upstream errors pass through
//! - Retries are opt-in and live outside the guard

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use timeouts::{GuardError, TimeoutGuard};
