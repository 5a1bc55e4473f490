use std::sync::Arc;
use tracing::info;

use crate::metrics::{MetricsRegistry, StatsSnapshot};

/// Periodic statistics line.
pub struct StatisticsReporter {
    metrics: Arc<MetricsRegistry>,
}

impl StatisticsReporter {
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self { metrics }
    }

    /// Logs the current counters, or nothing before the first dispatch.
    pub fn report(&self) -> Option<StatsSnapshot> {
        let snapshot = self.metrics.snapshot();
        if snapshot.total == 0 {
            return None;
        }

        info!(
            total = snapshot.total,
            success = snapshot.success,
            errors = snapshot.error,
            success_rate = snapshot.success_rate(),
            in_flight = snapshot.in_flight(),
            "📊 Statistics: {}",
            snapshot
        );
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Counter;

    #[test]
    fn silent_before_first_dispatch() {
        let metrics = Arc::new(MetricsRegistry::new("test").unwrap());
        let reporter = StatisticsReporter::new(metrics);
        assert_eq!(reporter.report(), None);
    }

    #[test]
    fn reports_counters_once_traffic_exists() {
        let metrics = Arc::new(MetricsRegistry::new("test").unwrap());
        metrics.increment(Counter::Total);
        metrics.increment(Counter::Total);
        metrics.increment(Counter::Success);

        let reporter = StatisticsReporter::new(metrics);
        let snap = reporter.report().unwrap();
        assert_eq!(snap.total, 2);
        assert_eq!(snap.success, 1);
        assert_eq!(snap.error, 0);
        assert_eq!(snap.success_rate(), 50.0);
    }

    #[test]
    fn successive_reports_never_go_backwards() {
        let metrics = Arc::new(MetricsRegistry::new("test").unwrap());
        let reporter = StatisticsReporter::new(metrics.clone());

        metrics.increment(Counter::Total);
        metrics.increment(Counter::Error);
        let first = reporter.report().unwrap();

        metrics.increment(Counter::Total);
        metrics.increment(Counter::Total);
        metrics.increment(Counter::Success);
        let second = reporter.report().unwrap();

        assert!(second.total >= first.total);
        assert!(second.success >= first.success);
        assert!(second.error >= first.error);
    }
}
