//! Timers driving the generator.
//!
//! Two independent tasks run on the shared runtime:
//!
//! - the load timer sleeps for the startup delay, then fires the dispatcher at
//!   a fixed rate starting immediately;
//! - the statistics timer fires the reporter at a fixed rate, first firing
//!   one period after start, regardless of the startup delay.
//!
//! Both use `MissedTickBehavior::Burst`, so ticks stay anchored to the
//! original schedule: a late tick is followed by catch-up ticks rather than
//! shifting every later tick. Dispatch itself is pure fan-out, so a tick never
//! waits on HTTP completions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::dispatcher::LoadDispatcher;
use crate::reporter::StatisticsReporter;

/// `tokio::time::interval` panics on a zero period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Longest accepted delay or period: 365 days. Longer values would overflow
/// `Instant` arithmetic inside the timers.
pub const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleConfig {
    /// One-shot wait before the load timer is armed.
    pub startup_delay: Duration,
    pub tick_interval: Duration,
    pub stats_interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_secs(5),
            tick_interval: Duration::from_millis(2000),
            stats_interval: Duration::from_secs(10),
        }
    }
}

pub struct Scheduler {
    tasks: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl Scheduler {
    /// Arms both timers. Must be called from within a tokio runtime.
    pub fn start(
        dispatcher: Arc<LoadDispatcher>,
        reporter: Arc<StatisticsReporter>,
        config: ScheduleConfig,
    ) -> Self {
        let concurrency = dispatcher.concurrency();
        Self::start_with(
            move || {
                // Attempts are detached; their handles are not needed here.
                drop(dispatcher.tick());
            },
            move || {
                reporter.report();
            },
            concurrency,
            config,
        )
    }

    /// Arms both timers around arbitrary tick and report actions.
    ///
    /// Delays and periods are clamped to `MIN_PERIOD..=MAX_PERIOD` (the
    /// startup delay only from above).
    pub fn start_with<T, R>(on_tick: T, on_report: R, concurrency: usize, config: ScheduleConfig) -> Self
    where
        T: Fn() + Send + Sync + 'static,
        R: Fn() + Send + Sync + 'static,
    {
        let load = tokio::spawn(run_load_timer(
            on_tick,
            concurrency,
            config.startup_delay.min(MAX_PERIOD),
            config.tick_interval.clamp(MIN_PERIOD, MAX_PERIOD),
        ));
        let stats = tokio::spawn(run_stats_timer(
            on_report,
            config.stats_interval.clamp(MIN_PERIOD, MAX_PERIOD),
        ));

        Self {
            tasks: Mutex::new(vec![load, stats]),
            stopped: AtomicBool::new(false),
        }
    }

    /// Stops both timers. In-flight attempts are left to finish or be dropped
    /// with the runtime. Returns `true` only for the call that stopped them.
    pub fn shutdown(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        let mut tasks = self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for task in tasks.drain(..) {
            task.abort();
        }
        debug!("Scheduler stopped");
        true
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_load_timer<T>(on_tick: T, concurrency: usize, startup_delay: Duration, period: Duration)
where
    T: Fn(),
{
    if !startup_delay.is_zero() {
        debug!(delay_ms = startup_delay.as_millis() as u64, "Waiting before first tick");
        time::sleep(startup_delay).await;
    }
    info!(
        period_ms = period.as_millis() as u64,
        concurrency, "Load generation started"
    );

    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
    loop {
        ticker.tick().await;
        on_tick();
    }
}

async fn run_stats_timer<R>(on_report: R, period: Duration)
where
    R: Fn(),
{
    let now = Instant::now();
    let first = now.checked_add(period).unwrap_or(now);
    let mut ticker = time::interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
    loop {
        ticker.tick().await;
        on_report();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counts {
        ticks: Arc<AtomicUsize>,
        reports: Arc<AtomicUsize>,
    }

    impl Counts {
        fn ticks(&self) -> usize {
            self.ticks.load(Ordering::SeqCst)
        }

        fn reports(&self) -> usize {
            self.reports.load(Ordering::SeqCst)
        }
    }

    fn counting_scheduler(config: ScheduleConfig) -> (Scheduler, Counts) {
        let ticks = Arc::new(AtomicUsize::new(0));
        let reports = Arc::new(AtomicUsize::new(0));
        let scheduler = {
            let ticks = ticks.clone();
            let reports = reports.clone();
            Scheduler::start_with(
                move || {
                    ticks.fetch_add(1, Ordering::SeqCst);
                },
                move || {
                    reports.fetch_add(1, Ordering::SeqCst);
                },
                1,
                config,
            )
        };
        (scheduler, Counts { ticks, reports })
    }

    /// Lets the spawned timer tasks run up to their next await point.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance(by: Duration) {
        time::advance(by).await;
        settle().await;
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_fires_right_after_startup_delay() {
        let (_scheduler, counts) = counting_scheduler(ScheduleConfig {
            startup_delay: secs(5),
            tick_interval: secs(2),
            stats_interval: secs(10),
        });
        settle().await;
        assert_eq!(counts.ticks(), 0);

        advance(Duration::from_millis(4999)).await;
        assert_eq!(counts.ticks(), 0);

        advance(Duration::from_millis(1)).await;
        assert_eq!(counts.ticks(), 1, "first tick at T+delay");

        advance(secs(2)).await;
        assert_eq!(counts.ticks(), 2);

        advance(secs(2)).await;
        assert_eq!(counts.ticks(), 3);
        assert_eq!(counts.reports(), 0);

        advance(secs(1)).await;
        assert_eq!(counts.reports(), 1, "first report at T+stats_interval");
        assert_eq!(counts.ticks(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stats_timer_runs_while_startup_delay_is_pending() {
        let (_scheduler, counts) = counting_scheduler(ScheduleConfig {
            startup_delay: secs(30),
            tick_interval: secs(2),
            stats_interval: secs(10),
        });
        settle().await;

        advance(secs(10)).await;
        assert_eq!(counts.reports(), 1);
        assert_eq!(counts.ticks(), 0);

        advance(secs(10)).await;
        assert_eq!(counts.reports(), 2);
        assert_eq!(counts.ticks(), 0);

        advance(secs(10)).await;
        assert_eq!(counts.reports(), 3);
        assert_eq!(counts.ticks(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stats_timer_does_not_fire_before_first_period() {
        let (_scheduler, counts) = counting_scheduler(ScheduleConfig {
            startup_delay: Duration::ZERO,
            tick_interval: secs(1),
            stats_interval: secs(10),
        });
        settle().await;
        assert_eq!(counts.reports(), 0);

        advance(Duration::from_millis(9999)).await;
        assert_eq!(counts.reports(), 0);

        advance(Duration::from_millis(1)).await;
        assert_eq!(counts.reports(), 1);

        advance(secs(10)).await;
        assert_eq!(counts.reports(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn late_ticks_catch_up_to_original_schedule() {
        let (_scheduler, counts) = counting_scheduler(ScheduleConfig {
            startup_delay: Duration::ZERO,
            tick_interval: secs(2),
            stats_interval: secs(60),
        });
        settle().await;
        assert_eq!(counts.ticks(), 1, "first tick immediately without a delay");

        // One jump over three periods: the missed ticks at 2s, 4s and 6s all fire.
        advance(secs(6)).await;
        assert_eq!(counts.ticks(), 4);

        // The next tick is still due at 8s, not 6s + period from a late start.
        advance(secs(2)).await;
        assert_eq!(counts.ticks(), 5);
        advance(Duration::from_millis(1999)).await;
        assert_eq!(counts.ticks(), 5);
        advance(Duration::from_millis(1)).await;
        assert_eq!(counts.ticks(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_both_timers() {
        let (scheduler, counts) = counting_scheduler(ScheduleConfig {
            startup_delay: Duration::ZERO,
            tick_interval: secs(1),
            stats_interval: secs(2),
        });
        settle().await;
        advance(secs(2)).await;
        let ticks = counts.ticks();
        let reports = counts.reports();
        assert_eq!(reports, 1);

        assert!(scheduler.shutdown());
        assert!(!scheduler.shutdown());
        assert!(scheduler.is_stopped());

        advance(secs(10)).await;
        assert_eq!(counts.ticks(), ticks);
        assert_eq!(counts.reports(), reports);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_periods_are_clamped_instead_of_panicking() {
        let (scheduler, counts) = counting_scheduler(ScheduleConfig {
            startup_delay: Duration::MAX,
            tick_interval: Duration::MAX,
            stats_interval: Duration::MAX,
        });
        settle().await;
        advance(secs(60)).await;
        assert_eq!(counts.ticks(), 0);
        assert_eq!(counts.reports(), 0);

        let tasks = scheduler.tasks.lock().unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|task| !task.is_finished()));
    }
}
