use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::errors::ErrorCategory;

/// The three counters every attempt moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Total,
    Success,
    Error,
}

/// Point-in-time read of the three counters.
///
/// Each value is read atomically on its own; the three reads together are
/// not a transaction, so `success + error` may trail `total` while attempts
/// are in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total: u64,
    pub success: u64,
    pub error: u64,
}

impl StatsSnapshot {
    /// Percentage of dispatched attempts that succeeded, `0.0` before any dispatch.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.success as f64 * 100.0 / self.total as f64).clamp(0.0, 100.0)
    }

    /// Attempts dispatched but not yet completed.
    pub fn in_flight(&self) -> u64 {
        self.total.saturating_sub(self.success + self.error)
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requests, {} success, {} errors ({:.1}% success rate)",
            self.total,
            self.success,
            self.error,
            self.success_rate()
        )
    }
}

/// Shared counters for one generator instance.
///
/// The total, success and error counts live in plain atomics that `snapshot` reads with
/// acquire ordering; their Prometheus counterparts are mirrors for exposition.
/// Everything sits on a private Prometheus registry rather than the default
/// one, so several generators (or tests) in one process never collide.
pub struct MetricsRegistry {
    registry: Registry,
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    total: IntCounter,
    success: IntCounter,
    error: IntCounter,
    status_codes: IntCounterVec,
    errors_by_category: IntCounterVec,
    in_flight: IntGauge,
    duration: Histogram,
}

impl MetricsRegistry {
    pub fn new(namespace: &str) -> Result<Self, prometheus::Error> {
        let total = IntCounter::with_opts(
            Opts::new("requests_total", "Total number of HTTP requests dispatched")
                .namespace(namespace),
        )?;
        let success = IntCounter::with_opts(
            Opts::new(
                "requests_success_total",
                "Number of HTTP requests that completed with a 2xx status",
            )
            .namespace(namespace),
        )?;
        let error = IntCounter::with_opts(
            Opts::new(
                "requests_error_total",
                "Number of HTTP requests that failed or completed with a non-2xx status",
            )
            .namespace(namespace),
        )?;
        let status_codes = IntCounterVec::new(
            Opts::new(
                "requests_status_codes_total",
                "Number of HTTP requests by status code",
            )
            .namespace(namespace),
            &["status_code"],
        )?;
        let errors_by_category = IntCounterVec::new(
            Opts::new(
                "requests_errors_by_category_total",
                "Number of failed HTTP requests by error category",
            )
            .namespace(namespace),
            &["category"],
        )?;
        let in_flight = IntGauge::with_opts(
            Opts::new("requests_in_flight", "Number of HTTP requests currently in flight")
                .namespace(namespace),
        )?;
        let duration = Histogram::with_opts(
            HistogramOpts::new("request_duration_seconds", "HTTP request latencies in seconds.")
                .namespace(namespace),
        )?;

        let registry = Registry::new();
        registry.register(Box::new(total.clone()))?;
        registry.register(Box::new(success.clone()))?;
        registry.register(Box::new(error.clone()))?;
        registry.register(Box::new(status_codes.clone()))?;
        registry.register(Box::new(errors_by_category.clone()))?;
        registry.register(Box::new(in_flight.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            dispatched: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            total,
            success,
            error,
            status_codes,
            errors_by_category,
            in_flight,
            duration,
        })
    }

    /// Adds one to the named counter and returns its new value.
    pub fn increment(&self, counter: Counter) -> u64 {
        let (value, mirror) = match counter {
            Counter::Total => (&self.dispatched, &self.total),
            Counter::Success => (&self.succeeded, &self.success),
            Counter::Error => (&self.failed, &self.error),
        };
        let new = value.fetch_add(1, Ordering::AcqRel) + 1;
        mirror.inc();
        new
    }

    /// Counts a new attempt and returns its sequence number.
    ///
    /// Sequence numbers start at 1 and are unique per registry: the sequence
    /// is the value `total` was incremented to.
    pub fn record_dispatch(&self) -> u64 {
        let sequence = self.increment(Counter::Total);
        self.in_flight.inc();
        sequence
    }

    pub fn record_success(&self, status: u16, elapsed: Duration) {
        self.increment(Counter::Success);
        self.finish(Some(status), elapsed);
    }

    pub fn record_failure(&self, status: Option<u16>, category: ErrorCategory, elapsed: Duration) {
        self.increment(Counter::Error);
        self.errors_by_category
            .with_label_values(&[category.label()])
            .inc();
        self.finish(status, elapsed);
    }

    fn finish(&self, status: Option<u16>, elapsed: Duration) {
        let label = status.map(status_code_label).unwrap_or("error");
        self.status_codes.with_label_values(&[label]).inc();
        self.duration.observe(elapsed.as_secs_f64());
        self.in_flight.dec();
    }

    /// Reads the three counters.
    ///
    /// An attempt's dispatch increment happens-before its completion
    /// increment. Completions are loaded first with acquire ordering, so the
    /// later `total` load observes every dispatch behind them and the snapshot
    /// satisfies `success + error <= total`.
    pub fn snapshot(&self) -> StatsSnapshot {
        let success = self.succeeded.load(Ordering::Acquire);
        let error = self.failed.load(Ordering::Acquire);
        StatsSnapshot {
            total: self.dispatched.load(Ordering::Acquire),
            success,
            error,
        }
    }

    pub fn status_code_count(&self, label: &str) -> u64 {
        self.status_codes.with_label_values(&[label]).get()
    }

    pub fn category_count(&self, category: ErrorCategory) -> u64 {
        self.errors_by_category
            .with_label_values(&[category.label()])
            .get()
    }

    pub fn in_flight(&self) -> i64 {
        self.in_flight.get()
    }

    /// Encodes every metric in Prometheus text exposition format.
    pub fn gather_text(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            error!(error = %e, "Failed to encode metrics");
            return String::from("# ERROR ENCODING METRICS");
        }
        String::from_utf8(buffer).unwrap_or_else(|_| String::from("# ERROR ENCODING METRICS TO UTF-8"))
    }
}

/// Returns a static string label for common HTTP status codes.
///
/// Keeps the label set bounded; uncommon codes collapse to "other".
fn status_code_label(code: u16) -> &'static str {
    match code {
        200 => "200",
        201 => "201",
        204 => "204",
        301 => "301",
        302 => "302",
        304 => "304",
        400 => "400",
        401 => "401",
        403 => "403",
        404 => "404",
        408 => "408",
        429 => "429",
        500 => "500",
        502 => "502",
        503 => "503",
        504 => "504",
        _ => "other",
    }
}

async fn metrics_handler(
    req: Request<Body>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Body>, hyper::Error> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", TextEncoder::new().format_type())
            .body(Body::from(metrics.gather_text())),
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::empty()),
    };

    Ok(response.unwrap_or_else(|_| Response::new(Body::empty())))
}

/// Serves the registry on `0.0.0.0:<port>/metrics` until the task is aborted.
pub async fn start_metrics_server(port: u16, metrics: Arc<MetricsRegistry>) {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    let make_svc = make_service_fn(move |_conn| {
        let metrics = metrics.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req| metrics_handler(req, metrics.clone())))
        }
    });

    let server = match Server::try_bind(&addr) {
        Ok(builder) => builder.serve(make_svc),
        Err(e) => {
            error!(port = port, error = %e, "Failed to bind metrics server");
            return;
        }
    };
    info!(port = port, addr = %addr, "Metrics server listening");

    if let Err(e) = server.await {
        error!(error = %e, "Metrics server error");
    }
}
