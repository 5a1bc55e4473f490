use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::metrics::{MetricsRegistry, StatsSnapshot};
use crate::scheduler::Scheduler;

/// One-shot teardown: final summary, stop the timers, drop the client handle.
pub struct ShutdownHandler {
    metrics: Arc<MetricsRegistry>,
    scheduler: Arc<Scheduler>,
    client: Mutex<Option<reqwest::Client>>,
    done: AtomicBool,
}

impl ShutdownHandler {
    pub fn new(
        metrics: Arc<MetricsRegistry>,
        scheduler: Arc<Scheduler>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            metrics,
            scheduler,
            client: Mutex::new(Some(client)),
            done: AtomicBool::new(false),
        }
    }

    /// Runs teardown on the first call and returns the final snapshot.
    /// Later calls do nothing and return `None`. Never panics and never waits
    /// for pending HTTP completions.
    pub fn shutdown(&self) -> Option<StatsSnapshot> {
        if self.done.swap(true, Ordering::SeqCst) {
            return None;
        }

        let snapshot = self.metrics.snapshot();
        info!("📊 Final Statistics:");
        info!(total = snapshot.total, "Total requests: {}", snapshot.total);
        info!(success = snapshot.success, "Successful: {}", snapshot.success);
        info!(errors = snapshot.error, "Errors: {}", snapshot.error);
        info!(
            success_rate = snapshot.success_rate(),
            "Success rate: {:.1}%",
            snapshot.success_rate()
        );
        if snapshot.in_flight() > 0 {
            warn!(in_flight = snapshot.in_flight(), "Abandoning in-flight requests");
        }
        info!("👋 Load generator shutting down...");

        self.scheduler.shutdown();

        // Only releases this handle. The issuer and every in-flight attempt
        // hold clones too, so the pool stays open until those attempts finish
        // or the runtime drops them in `shutdown_background`.
        match self.client.lock() {
            Ok(mut client) => drop(client.take()),
            Err(poisoned) => drop(poisoned.into_inner().take()),
        }

        Some(snapshot)
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
