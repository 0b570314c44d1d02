//! Connection checks for backend-data endpoints.
//!
//! # Data Flow
//! ```text
//! probe.rs:
//!     URL list
//!     → GET each endpoint through TimeoutGuard::guard_backend
//!     → ProbeReport (healthy / unhealthy / failed / timed out)
//! ```
//!
//! # Design Decisions
//! - Probes never fail as a whole; every endpoint gets a report
//! - Timeout wording comes from the guard, not from the probe

pub mod probe;

pub use probe::{EndpointProbe, ProbeOutcome, ProbeReport};
