//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Guard, retries and probes produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (outcome and retry counters)
//!
//! Consumers:
//!     → stderr (pretty or JSON lines)
//!     → whatever `metrics` recorder the host application installs
//! ```
//!
//! # Design Decisions
//! - Structured fields over interpolated strings
//! - Metrics go through the `metrics` facade; no exporter is bundled
pub mod logging;
pub mod metrics;
