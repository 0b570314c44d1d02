//! Deadline guard for asynchronous backend-data operations.
//!
//! Races a pending operation against a timer and reports whichever settles
//! first, with a caller-facing message when the deadline wins.

pub mod config;
pub mod health;
pub mod observability;
pub mod resilience;

pub use config::GuardConfig;
pub use resilience::timeouts::{
    backend_timeout_message, spawn_with_timeout, with_backend_timeout, with_default_timeout,
    with_timeout, BACKEND_DEADLINE, DEFAULT_DEADLINE, DEFAULT_TIMEOUT_MESSAGE,
};
pub use resilience::{GuardError, TimeoutGuard};
