//! Connection check against backend-data endpoints.
//!
//! # Responsibilities
//! - Issue a GET through the backend-data guard
//! - Classify the result (healthy, unhealthy status, failed, timed out)
//! - Probe several endpoints concurrently

use futures_util::future::join_all;
use reqwest::header::USER_AGENT;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::RetryConfig;
use crate::resilience::retries::retry_on_timeout;
use crate::resilience::{GuardError, TimeoutGuard};

/// Result of a single connection check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// Endpoint answered with a 2xx status.
    Healthy { status: u16 },
    /// Endpoint answered, but not with 2xx.
    Unhealthy { status: u16 },
    /// Request failed before a response (DNS, refused, TLS, ...).
    Failed { error: String },
    /// No response before the backend deadline.
    TimedOut { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub url: String,
    #[serde(flatten)]
    pub outcome: ProbeOutcome,
    pub elapsed_ms: u64,
}

impl ProbeReport {
    pub fn is_healthy(&self) -> bool {
        matches!(self.outcome, ProbeOutcome::Healthy { .. })
    }
}

impl std::fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.outcome {
            ProbeOutcome::Healthy { status } => {
                write!(f, "{} ok ({}) in {}ms", self.url, status, self.elapsed_ms)
            }
            ProbeOutcome::Unhealthy { status } => {
                write!(f, "{} unhealthy ({}) in {}ms", self.url, status, self.elapsed_ms)
            }
            ProbeOutcome::Failed { error } => write!(f, "{} failed: {}", self.url, error),
            ProbeOutcome::TimedOut { message } => write!(f, "{} timed out: {}", self.url, message),
        }
    }
}

/// HTTP connection checker guarded by the backend deadline.
pub struct EndpointProbe {
    client: reqwest::Client,
    guard: TimeoutGuard,
    retries: RetryConfig,
}

impl EndpointProbe {
    pub fn new(guard: TimeoutGuard) -> Self {
        Self::with_client(reqwest::Client::new(), guard)
    }

    pub fn with_client(client: reqwest::Client, guard: TimeoutGuard) -> Self {
        Self {
            client,
            guard,
            retries: RetryConfig::default(),
        }
    }

    /// Re-issue timed-out checks according to `retries`.
    pub fn with_retries(mut self, retries: RetryConfig) -> Self {
        self.retries = retries;
        self
    }

    /// Check one endpoint. `operation_name` feeds the timeout message.
    pub async fn probe(&self, url: &str, operation_name: &str) -> ProbeReport {
        let started = Instant::now();
        let result = retry_on_timeout(&self.retries, move |_| {
            let request = self
                .client
                .get(url)
                .header(USER_AGENT, "timeout-guard-check")
                .send();
            self.guard.guard_backend(request, Some(operation_name))
        })
        .await;

        let outcome = match result {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    ProbeOutcome::Healthy { status: status.as_u16() }
                } else {
                    tracing::warn!(url = %url, status = %status, "Connection check failed: non-success status");
                    ProbeOutcome::Unhealthy { status: status.as_u16() }
                }
            }
            Err(GuardError::Upstream(e)) => {
                tracing::warn!(url = %url, error = %e, "Connection check failed: request error");
                ProbeOutcome::Failed { error: e.to_string() }
            }
            Err(GuardError::Timeout { message, .. }) => ProbeOutcome::TimedOut { message },
        };

        ProbeReport {
            url: url.to_string(),
            outcome,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Check every endpoint concurrently; reports keep the input order.
    pub async fn probe_all(&self, urls: &[String], operation_name: &str) -> Vec<ProbeReport> {
        join_all(urls.iter().map(|url| self.probe(url, operation_name))).await
    }
}
