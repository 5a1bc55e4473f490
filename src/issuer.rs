//! Issues single GET requests and records how they turned out.
//!
//! `RequestIssuer::issue` counts the attempt, spawns the request onto the
//! runtime and returns immediately. The spawned task owns the attempt context
//! (sequence number, endpoint, start time) and is the only place that ever
//! sees it; the registry is the only shared state it touches.

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{info, warn};

use crate::errors::{error_chain_text, ErrorCategory};
use crate::metrics::MetricsRegistry;

/// How one attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        status: u16,
        elapsed: Duration,
        service: Option<String>,
    },
    Failure {
        /// `None` for transport failures, which never produced a response.
        status: Option<u16>,
        elapsed: Duration,
        category: ErrorCategory,
        description: String,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            Outcome::Success { elapsed, .. } | Outcome::Failure { elapsed, .. } => *elapsed,
        }
    }
}

/// A finished attempt, as handed back to whoever awaits the spawned task.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptReport {
    pub sequence: u64,
    pub endpoint: String,
    pub outcome: Outcome,
}

impl fmt::Display for AttemptReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.outcome.elapsed().as_millis();
        match &self.outcome {
            Outcome::Success {
                status, service, ..
            } => {
                write!(f, "✓ {} {} ({}ms) [{}]", status, self.endpoint, ms, self.sequence)?;
                if let Some(service) = service {
                    write!(f, " -> {}", service)?;
                }
                Ok(())
            }
            Outcome::Failure {
                status: Some(status),
                ..
            } => write!(f, "✗ {} {} ({}ms) [{}]", status, self.endpoint, ms, self.sequence),
            Outcome::Failure {
                status: None,
                description,
                ..
            } => write!(
                f,
                "✗ ERROR {} ({}ms) [{}] - {}",
                self.endpoint, ms, self.sequence, description
            ),
        }
    }
}

#[derive(Deserialize)]
struct ServiceBody {
    service: Option<serde_json::Value>,
}

/// Pulls the `service` field out of a JSON object body.
///
/// Anything that is not a JSON object, or has no usable `service` field,
/// yields `None`. Non-string values are rendered as their JSON text.
pub fn extract_service(body: &[u8]) -> Option<String> {
    let parsed: ServiceBody = serde_json::from_slice(body).ok()?;
    match parsed.service? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Sends GET requests for one target server over a shared client.
pub struct RequestIssuer {
    client: reqwest::Client,
    base_url: String,
    metrics: Arc<MetricsRegistry>,
}

impl RequestIssuer {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            metrics,
        }
    }

    /// Dispatches one attempt against `endpoint` without waiting for it.
    ///
    /// `total` is incremented here, before the request leaves. Exactly one of
    /// `success`/`error` is incremented later by the spawned task. Must be
    /// called from within a tokio runtime.
    pub fn issue(&self, endpoint: &str) -> JoinHandle<AttemptReport> {
        let sequence = self.metrics.record_dispatch();
        let started = Instant::now();
        let request = self.client.get(format!("{}{}", self.base_url, endpoint));
        let metrics = self.metrics.clone();
        let endpoint = endpoint.to_string();

        tokio::spawn(async move {
            let outcome = complete(request, started, &metrics).await;
            let report = AttemptReport {
                sequence,
                endpoint,
                outcome,
            };
            log_report(&report);
            report
        })
    }
}

async fn complete(
    request: reqwest::RequestBuilder,
    started: Instant,
    metrics: &MetricsRegistry,
) -> Outcome {
    match request.send().await {
        Ok(response) => {
            let elapsed = started.elapsed();
            let status = response.status();

            if status.is_success() {
                metrics.record_success(status.as_u16(), elapsed);
                // Body problems never change the classification.
                let service = match response.bytes().await {
                    Ok(body) => extract_service(&body),
                    Err(_) => None,
                };
                Outcome::Success {
                    status: status.as_u16(),
                    elapsed,
                    service,
                }
            } else {
                let category =
                    ErrorCategory::from_status_code(status.as_u16()).unwrap_or(ErrorCategory::OtherError);
                metrics.record_failure(Some(status.as_u16()), category, elapsed);
                Outcome::Failure {
                    status: Some(status.as_u16()),
                    elapsed,
                    category,
                    description: status
                        .canonical_reason()
                        .unwrap_or("Unknown Status")
                        .to_string(),
                }
            }
        }
        Err(e) => {
            let elapsed = started.elapsed();
            let category = ErrorCategory::from_reqwest_error(&e);
            metrics.record_failure(None, category, elapsed);
            Outcome::Failure {
                status: None,
                elapsed,
                category,
                description: error_chain_text(&e),
            }
        }
    }
}

fn log_report(report: &AttemptReport) {
    let elapsed_ms = report.outcome.elapsed().as_millis() as u64;
    match &report.outcome {
        Outcome::Success {
            status, service, ..
        } => info!(
            sequence = report.sequence,
            endpoint = %report.endpoint,
            status_code = status,
            elapsed_ms = elapsed_ms,
            service = service.as_deref().unwrap_or(""),
            "{}",
            report
        ),
        Outcome::Failure {
            status, category, ..
        } => warn!(
            sequence = report.sequence,
            endpoint = %report.endpoint,
            status_code = status.unwrap_or(0),
            elapsed_ms = elapsed_ms,
            error_category = %category,
            "{}",
            report
        ),
    }
}
