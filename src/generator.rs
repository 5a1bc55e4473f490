use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use crate::client::{build_client, ClientError};
use crate::config::Config;
use crate::dispatcher::{EndpointSet, LoadDispatcher};
use crate::issuer::RequestIssuer;
use crate::metrics::{start_metrics_server, MetricsRegistry, StatsSnapshot};
use crate::reporter::StatisticsReporter;
use crate::scheduler::Scheduler;
use crate::shutdown::{wait_for_signal, ShutdownHandler};

#[derive(Error, Debug)]
pub enum StartError {
    #[error("Failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// A running generator: registry, timers and teardown wired together.
pub struct LoadGenerator {
    metrics: Arc<MetricsRegistry>,
    scheduler: Arc<Scheduler>,
    shutdown: ShutdownHandler,
    metrics_server: Mutex<Option<JoinHandle<()>>>,
}

impl LoadGenerator {
    /// Builds every component and arms the timers against the default endpoints.
    /// Must be called from within a tokio runtime.
    pub fn start(config: &Config) -> Result<Self, StartError> {
        Self::start_with_endpoints(config, EndpointSet::default())
    }

    pub fn start_with_endpoints(config: &Config, endpoints: EndpointSet) -> Result<Self, StartError> {
        let metrics = Arc::new(MetricsRegistry::new(&config.metric_namespace)?);
        let client = build_client(&config.to_client_config())?;

        let issuer = Arc::new(RequestIssuer::new(
            client.clone(),
            config.server_url.clone(),
            metrics.clone(),
        ));
        let dispatcher = Arc::new(LoadDispatcher::new(
            issuer,
            endpoints,
            config.concurrent_requests,
        ));
        let reporter = Arc::new(StatisticsReporter::new(metrics.clone()));

        let metrics_server = config.metrics_port.map(|port| {
            let metrics = metrics.clone();
            tokio::spawn(async move { start_metrics_server(port, metrics).await })
        });

        info!("🚀 Load generator started!");
        let scheduler = Arc::new(Scheduler::start(
            dispatcher,
            reporter,
            config.to_schedule_config(),
        ));
        let shutdown = ShutdownHandler::new(metrics.clone(), scheduler.clone(), client);

        Ok(Self {
            metrics,
            scheduler,
            shutdown,
            metrics_server: Mutex::new(metrics_server),
        })
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn is_running(&self) -> bool {
        !self.scheduler.is_stopped()
    }

    /// Final summary and teardown; see [`ShutdownHandler::shutdown`].
    pub fn shutdown(&self) -> Option<StatsSnapshot> {
        let summary = self.shutdown.shutdown()?;
        let server = match self.metrics_server.lock() {
            Ok(mut server) => server.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(server) = server {
            server.abort();
        }
        Some(summary)
    }

    /// Runs until Ctrl-C or SIGTERM, then tears down.
    pub async fn run_until_signal(&self) -> Option<StatsSnapshot> {
        wait_for_signal().await;
        self.shutdown()
    }
}
