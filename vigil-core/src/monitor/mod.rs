//! Background sampling of host and application health with threshold alerts.
//!
//! [`RealTimeMonitor`] owns one OS thread while running. Every tick it samples
//! the host, derives application metrics from its collaborators, appends both
//! to bounded histories, fires alerts to registered callbacks and periodically
//! writes a JSON snapshot. All collaborators are injected through
//! [`MonitorBuilder`].

mod alerts;
mod history;
mod host;
mod records;
mod sample;
mod session;
mod snapshot;
mod status;

pub use alerts::{evaluate_alerts, Alert, AlertKind, AlertSeverity, AlertThresholds};
pub use history::BoundedHistory;
pub use host::{HostMetricsSource, HostSample, NullHostSource, SysinfoHostSource};
pub use records::{RecordCounter, SqliteRecordCounter};
pub use sample::{ApplicationMetricsSample, SystemMetricsSample};
pub use session::{SessionRegistry, SessionSource};
pub use snapshot::{MetricsSnapshot, SnapshotWriter};
pub use status::{
    health_status, recommendations, trend, CurrentStatus, HealthStatus, HistoricalStats,
    MonitorReport, RangeStats, Trend, Trends,
};

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::cache::CacheStatsSource;
use crate::config::{MonitorConfig, ThresholdConfig};
use crate::error::{VigilError, VigilResult};
use crate::perf::PerformanceMonitor;

const ERROR_RING_CAPACITY: usize = 1000;
const ERROR_WINDOW_SECS: i64 = 3600;
const TREND_SAMPLES: usize = 10;
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub type AlertCallback = Arc<dyn Fn(&Alert) -> VigilResult<()> + Send + Sync>;

struct Histories {
    system: BoundedHistory<SystemMetricsSample>,
    application: BoundedHistory<ApplicationMetricsSample>,
    ticks: u64,
}

struct Shared {
    host: Arc<dyn HostMetricsSource>,
    perf: Arc<PerformanceMonitor>,
    sessions: Arc<dyn SessionSource>,
    records: Option<Arc<dyn RecordCounter>>,
    cache: Option<Arc<dyn CacheStatsSource>>,
    thresholds: AlertThresholds,
    snapshots: Option<SnapshotWriter>,
    snapshot_every_ticks: u64,
    snapshot_window: usize,
    histories: Mutex<Histories>,
    errors: Mutex<VecDeque<DateTime<Utc>>>,
    callbacks: RwLock<Vec<AlertCallback>>,
    wake_lock: Mutex<()>,
    wake: Condvar,
}

impl Shared {
    fn tick(&self) -> Vec<Alert> {
        let now = Utc::now();

        let host = self.host.sample().unwrap_or_else(|e| {
            warn!(error = %e, "Host metrics collection failed, using zeroed sample");
            HostSample::default()
        });
        let system = SystemMetricsSample::from_host(now, host);
        let application = self.collect_application(now);

        let ticks = {
            let mut histories = self.histories.lock();
            histories.system.push(system.clone());
            histories.application.push(application.clone());
            histories.ticks += 1;
            histories.ticks
        };

        debug!(
            tick = ticks,
            cpu = system.cpu_percent,
            memory = system.memory_percent,
            sessions = application.active_sessions,
            errors_last_hour = application.errors_last_hour,
            "Monitor tick"
        );

        let alerts = evaluate_alerts(&system, &application, &self.thresholds);
        for alert in &alerts {
            self.dispatch(alert);
        }

        if self.snapshot_every_ticks > 0 && ticks % self.snapshot_every_ticks == 0 {
            self.write_snapshot();
        }

        alerts
    }

    fn collect_application(&self, now: DateTime<Utc>) -> ApplicationMetricsSample {
        let memory_records = match &self.records {
            Some(records) => records.count_records().unwrap_or_else(|e| {
                warn!(error = %e, "Failed to count memory records, defaulting to 0");
                0
            }),
            None => 0,
        };

        let cache_hit_rate = self
            .cache
            .as_ref()
            .map(|cache| cache.cache_stats())
            .filter(|stats| stats.lookups() > 0)
            .map(|stats| stats.hit_rate);

        ApplicationMetricsSample {
            timestamp: now,
            active_sessions: self.sessions.active_count(),
            memory_records,
            cache_hit_rate,
            average_response_time: self.perf.report().average_execution_time(),
            errors_last_hour: self.errors_since(now - chrono::Duration::seconds(ERROR_WINDOW_SECS)),
        }
    }

    fn errors_since(&self, cutoff: DateTime<Utc>) -> u64 {
        self.errors.lock().iter().filter(|t| **t > cutoff).count() as u64
    }

    fn dispatch(&self, alert: &Alert) {
        match alert.severity {
            AlertSeverity::Critical => error!(alert = %alert.kind, "{}", alert.message),
            AlertSeverity::Warning => warn!(alert = %alert.kind, "{}", alert.message),
        }

        let callbacks: Vec<AlertCallback> = self.callbacks.read().clone();
        for callback in callbacks {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(alert))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(alert = %alert.kind, error = %e, "Alert callback failed"),
                Err(_) => error!(alert = %alert.kind, "Alert callback panicked"),
            }
        }
    }

    fn write_snapshot(&self) {
        let Some(writer) = &self.snapshots else {
            return;
        };

        let (system, application) = {
            let histories = self.histories.lock();
            (
                histories.system.last_n(self.snapshot_window),
                histories.application.last_n(self.snapshot_window),
            )
        };

        if let Err(e) = writer.write(system, application) {
            warn!(error = %e, "Failed to save metrics snapshot");
        }
    }

    /// Sleep for `interval` unless `running` is cleared first. An interval
    /// too large to represent as a deadline waits for the stop signal only.
    fn wait(&self, interval: Duration, running: &AtomicBool) {
        let deadline = Instant::now().checked_add(interval);
        let mut guard = self.wake_lock.lock();
        while running.load(Ordering::SeqCst) {
            match deadline {
                Some(deadline) => {
                    if self.wake.wait_until(&mut guard, deadline).timed_out() {
                        break;
                    }
                }
                None => self.wake.wait(&mut guard),
            }
        }
    }

    fn signal_stop(&self, running: &AtomicBool) {
        {
            let _guard = self.wake_lock.lock();
            running.store(false, Ordering::SeqCst);
        }
        self.wake.notify_all();
    }
}

/// One spawned sampling loop and the flag only that loop watches.
struct Worker {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

pub struct MonitorBuilder {
    perf: Arc<PerformanceMonitor>,
    host: Arc<dyn HostMetricsSource>,
    sessions: Arc<dyn SessionSource>,
    records: Option<Arc<dyn RecordCounter>>,
    cache: Option<Arc<dyn CacheStatsSource>>,
    thresholds: AlertThresholds,
    history_capacity: usize,
    snapshot_dir: Option<PathBuf>,
    snapshot_every_ticks: u64,
    snapshot_window: usize,
    stop_timeout: Duration,
}

impl MonitorBuilder {
    /// Builder with default settings, a [`NullHostSource`], an empty session
    /// registry and snapshots disabled.
    pub fn new(perf: Arc<PerformanceMonitor>) -> Self {
        let defaults = MonitorConfig::default();
        Self {
            perf,
            host: Arc::new(NullHostSource),
            sessions: Arc::new(SessionRegistry::new()),
            records: None,
            cache: None,
            thresholds: AlertThresholds::default(),
            history_capacity: defaults.history_capacity,
            snapshot_dir: None,
            snapshot_every_ticks: defaults.snapshot_every_ticks,
            snapshot_window: defaults.snapshot_window,
            stop_timeout: defaults.stop_timeout(),
        }
    }

    pub fn from_config(
        perf: Arc<PerformanceMonitor>,
        monitor: &MonitorConfig,
        thresholds: &ThresholdConfig,
    ) -> Self {
        Self::new(perf)
            .thresholds(AlertThresholds::from(thresholds))
            .history_capacity(monitor.history_capacity)
            .snapshots(monitor.snapshot_dir.clone(), monitor.snapshot_every_ticks)
            .snapshot_window(monitor.snapshot_window)
            .stop_timeout(monitor.stop_timeout())
    }

    pub fn host(mut self, host: Arc<dyn HostMetricsSource>) -> Self {
        self.host = host;
        self
    }

    pub fn sessions(mut self, sessions: Arc<dyn SessionSource>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn records(mut self, records: Arc<dyn RecordCounter>) -> Self {
        self.records = Some(records);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn CacheStatsSource>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn thresholds(mut self, thresholds: AlertThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn snapshots(mut self, dir: impl Into<PathBuf>, every_ticks: u64) -> Self {
        self.snapshot_dir = Some(dir.into());
        self.snapshot_every_ticks = every_ticks;
        self
    }

    pub fn without_snapshots(mut self) -> Self {
        self.snapshot_dir = None;
        self
    }

    pub fn snapshot_window(mut self, window: usize) -> Self {
        self.snapshot_window = window;
        self
    }

    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn build(self) -> RealTimeMonitor {
        let shared = Shared {
            host: self.host,
            perf: self.perf,
            sessions: self.sessions,
            records: self.records,
            cache: self.cache,
            thresholds: self.thresholds,
            snapshots: self.snapshot_dir.map(SnapshotWriter::new),
            snapshot_every_ticks: self.snapshot_every_ticks,
            snapshot_window: self.snapshot_window,
            histories: Mutex::new(Histories {
                system: BoundedHistory::new(self.history_capacity),
                application: BoundedHistory::new(self.history_capacity),
                ticks: 0,
            }),
            errors: Mutex::new(VecDeque::with_capacity(ERROR_RING_CAPACITY)),
            callbacks: RwLock::new(Vec::new()),
            wake_lock: Mutex::new(()),
            wake: Condvar::new(),
        };

        RealTimeMonitor {
            shared: Arc::new(shared),
            worker: Mutex::new(None),
            stop_timeout: self.stop_timeout,
        }
    }
}

pub struct RealTimeMonitor {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
    stop_timeout: Duration,
}

impl RealTimeMonitor {
    pub fn builder(perf: Arc<PerformanceMonitor>) -> MonitorBuilder {
        MonitorBuilder::new(perf)
    }

    /// Spawn the sampling thread. A no-op if it is already running.
    ///
    /// Fails while a loop detached by a timed-out [`stop`](Self::stop) is
    /// still finishing its last tick.
    pub fn start(&self, interval: Duration) -> VigilResult<()> {
        let mut worker = self.worker.lock();

        if let Some(previous) = worker.take() {
            if previous.running.load(Ordering::SeqCst) {
                warn!("Real-time monitor is already running");
                *worker = Some(previous);
                return Ok(());
            }
            if !previous.handle.is_finished() {
                *worker = Some(previous);
                return Err(VigilError::runtime(
                    "previous monitor loop is still shutting down",
                ));
            }
            if previous.handle.join().is_err() {
                error!("Monitor thread terminated abnormally");
            }
        }

        info!(
            interval_secs = interval.as_secs_f64(),
            "Starting real-time monitor"
        );

        let running = Arc::new(AtomicBool::new(true));
        let shared = Arc::clone(&self.shared);
        let flag = Arc::clone(&running);
        let handle = std::thread::Builder::new()
            .name("vigil-monitor".to_string())
            .spawn(move || {
                while flag.load(Ordering::SeqCst) {
                    if panic::catch_unwind(AssertUnwindSafe(|| shared.tick())).is_err() {
                        error!("Monitor tick panicked, continuing");
                    }
                    shared.wait(interval, &flag);
                }
                info!("Real-time monitor loop stopped");
            })
            .map_err(|e| {
                VigilError::runtime(format!("failed to spawn monitor thread: {}", e))
            })?;

        *worker = Some(Worker { handle, running });
        Ok(())
    }

    /// Ask the loop to stop and wait a bounded time for it to finish.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        let Some(current) = worker.take() else {
            debug!("Real-time monitor is not running");
            return;
        };

        if !current.running.load(Ordering::SeqCst) {
            *worker = Some(current);
            debug!("Real-time monitor is not running");
            return;
        }

        info!("Stopping real-time monitor...");
        self.shared.signal_stop(&current.running);

        let deadline = Instant::now().checked_add(self.stop_timeout);
        while !current.handle.is_finished() && deadline.map_or(true, |d| Instant::now() < d) {
            std::thread::sleep(STOP_POLL_INTERVAL);
        }

        if current.handle.is_finished() {
            if current.handle.join().is_err() {
                error!("Monitor thread terminated abnormally");
            }
            info!("Real-time monitor stopped");
        } else {
            warn!(
                timeout_secs = self.stop_timeout.as_secs_f64(),
                "Monitor thread did not stop in time, detaching"
            );
            *worker = Some(current);
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| w.running.load(Ordering::SeqCst))
    }

    /// Run one sampling step on the calling thread and return the alerts it raised.
    pub fn tick(&self) -> Vec<Alert> {
        self.shared.tick()
    }

    pub fn register_alert_callback<F>(&self, callback: F)
    where
        F: Fn(&Alert) -> VigilResult<()> + Send + Sync + 'static,
    {
        self.shared.callbacks.write().push(Arc::new(callback));
    }

    pub fn record_error(&self) {
        self.record_error_at(Utc::now());
    }

    pub fn record_error_at(&self, at: DateTime<Utc>) {
        let mut errors = self.shared.errors.lock();
        if errors.len() == ERROR_RING_CAPACITY {
            errors.pop_front();
        }
        errors.push_back(at);
    }

    pub fn errors_last_hour(&self) -> u64 {
        self.shared
            .errors_since(Utc::now() - chrono::Duration::seconds(ERROR_WINDOW_SECS))
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.shared.thresholds
    }

    pub fn tick_count(&self) -> u64 {
        self.shared.histories.lock().ticks
    }

    pub fn system_history(&self) -> Vec<SystemMetricsSample> {
        self.shared.histories.lock().system.iter().cloned().collect()
    }

    pub fn application_history(&self) -> Vec<ApplicationMetricsSample> {
        self.shared
            .histories
            .lock()
            .application
            .iter()
            .cloned()
            .collect()
    }

    /// Latest samples with trends, health and hints; `None` before the first tick.
    pub fn current_status(&self) -> Option<CurrentStatus> {
        let histories = self.shared.histories.lock();
        let system = histories.system.latest()?.clone();
        let application = histories.application.latest()?.clone();

        let recent = histories.system.last_n(TREND_SAMPLES);
        let cpu: Vec<f64> = recent.iter().map(|s| s.cpu_percent).collect();
        let memory: Vec<f64> = recent.iter().map(|s| s.memory_percent).collect();
        drop(histories);

        Some(CurrentStatus {
            timestamp: Utc::now(),
            trends: Trends {
                cpu: trend(&cpu),
                memory: trend(&memory),
            },
            health_status: health_status(&system, &application),
            recommendations: recommendations(&system, &application),
            system,
            application,
        })
    }

    pub fn performance_report(&self) -> MonitorReport {
        let (cpu, memory, monitoring_duration) = {
            let histories = self.shared.histories.lock();
            let cpu: Vec<f64> = histories.system.iter().map(|s| s.cpu_percent).collect();
            let memory: Vec<f64> = histories.system.iter().map(|s| s.memory_percent).collect();
            (cpu, memory, histories.system.len())
        };

        let historical_stats = RangeStats::from_values(&cpu)
            .zip(RangeStats::from_values(&memory))
            .map(|(cpu, memory)| HistoricalStats { cpu, memory });

        MonitorReport {
            current_status: self.current_status(),
            historical_stats,
            monitoring_duration,
            last_updated: Utc::now(),
        }
    }

    /// Force a snapshot of the current window regardless of the tick count.
    pub fn save_snapshot(&self) {
        self.shared.write_snapshot();
    }
}

impl Drop for RealTimeMonitor {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().as_ref() {
            self.shared.signal_stop(&worker.running);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheManager;
    use std::sync::atomic::AtomicUsize;

    struct FixedHost {
        sample: HostSample,
        calls: AtomicUsize,
    }

    impl FixedHost {
        fn new(cpu: f64, memory: f64) -> Self {
            Self {
                sample: HostSample {
                    cpu_percent: cpu,
                    memory_percent: memory,
                    memory_used_mb: 1024.0,
                    disk_usage_percent: 30.0,
                    active_threads: 3,
                },
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl HostMetricsSource for FixedHost {
        fn sample(&self) -> VigilResult<HostSample> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.sample)
        }

        fn process_memory_bytes(&self) -> Option<u64> {
            None
        }
    }

    struct BrokenHost;

    impl HostMetricsSource for BrokenHost {
        fn sample(&self) -> VigilResult<HostSample> {
            Err(VigilError::MetricsCollectionFailed("no telemetry".to_string()))
        }

        fn process_memory_bytes(&self) -> Option<u64> {
            None
        }
    }

    struct FailingCounter;

    impl RecordCounter for FailingCounter {
        fn count_records(&self) -> VigilResult<u64> {
            Err(VigilError::Database("locked".to_string()))
        }
    }

    /// Blocks on its first sample and tracks overlapping calls.
    struct SlowFirstHost {
        delay: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl SlowFirstHost {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    impl HostMetricsSource for SlowFirstHost {
        fn sample(&self) -> VigilResult<HostSample> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                std::thread::sleep(self.delay);
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(HostSample::default())
        }

        fn process_memory_bytes(&self) -> Option<u64> {
            None
        }
    }

    fn monitor_with(host: Arc<dyn HostMetricsSource>) -> RealTimeMonitor {
        RealTimeMonitor::builder(Arc::new(PerformanceMonitor::new()))
            .host(host)
            .build()
    }

    #[test]
    fn test_tick_fills_histories() {
        let monitor = monitor_with(Arc::new(FixedHost::new(10.0, 20.0)));
        assert!(monitor.current_status().is_none());

        monitor.tick();
        monitor.tick();

        assert_eq!(monitor.tick_count(), 2);
        assert_eq!(monitor.system_history().len(), 2);
        assert_eq!(monitor.application_history().len(), 2);

        let status = monitor.current_status().unwrap();
        assert_eq!(status.health_status, HealthStatus::Excellent);
        assert_eq!(status.trends.cpu, Trend::Stable);
    }

    #[test]
    fn test_history_is_bounded() {
        let monitor = RealTimeMonitor::builder(Arc::new(PerformanceMonitor::new()))
            .history_capacity(3)
            .build();

        for _ in 0..5 {
            monitor.tick();
        }

        assert_eq!(monitor.system_history().len(), 3);
        assert_eq!(monitor.tick_count(), 5);
    }

    #[test]
    fn test_failed_sampling_uses_zeroed_sample() {
        let monitor = RealTimeMonitor::builder(Arc::new(PerformanceMonitor::new()))
            .host(Arc::new(BrokenHost))
            .records(Arc::new(FailingCounter))
            .build();

        assert!(monitor.tick().is_empty());
        let latest = monitor.system_history().pop().unwrap();
        assert_eq!(latest.cpu_percent, 0.0);
        assert_eq!(monitor.application_history()[0].memory_records, 0);
    }

    #[test]
    fn test_cpu_alert_reaches_callbacks() {
        let monitor = monitor_with(Arc::new(FixedHost::new(95.0, 20.0)));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        monitor.register_alert_callback(move |alert| {
            sink.lock().push(alert.clone());
            Ok(())
        });

        let alerts = monitor.tick();
        assert_eq!(alerts.len(), 1);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, AlertKind::CpuHigh);
        assert_eq!(seen[0].severity, AlertSeverity::Critical);
    }

    #[test]
    fn test_failing_callbacks_do_not_block_others() {
        let monitor = monitor_with(Arc::new(FixedHost::new(85.0, 20.0)));
        let delivered = Arc::new(AtomicUsize::new(0));

        monitor.register_alert_callback(|_| Err(VigilError::runtime("sink offline")));
        monitor.register_alert_callback(|_| panic!("callback bug"));
        let counter = Arc::clone(&delivered);
        monitor.register_alert_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        monitor.tick();
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_recorded_errors_raise_critical_alert() {
        let monitor = monitor_with(Arc::new(FixedHost::new(10.0, 20.0)));
        for _ in 0..12 {
            monitor.record_error();
        }
        monitor.record_error_at(Utc::now() - chrono::Duration::hours(2));

        assert_eq!(monitor.errors_last_hour(), 12);
        let alerts = monitor.tick();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::ErrorsHigh);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
    }

    #[test]
    fn test_few_errors_raise_nothing() {
        let monitor = monitor_with(Arc::new(FixedHost::new(10.0, 20.0)));
        for _ in 0..3 {
            monitor.record_error();
        }
        assert!(monitor.tick().is_empty());
    }

    #[test]
    fn test_error_ring_is_bounded() {
        let monitor = monitor_with(Arc::new(NullHostSource));
        for _ in 0..(ERROR_RING_CAPACITY + 50) {
            monitor.record_error();
        }
        assert_eq!(monitor.errors_last_hour(), ERROR_RING_CAPACITY as u64);
    }

    #[test]
    fn test_application_metrics_from_collaborators() {
        let perf = Arc::new(PerformanceMonitor::new());
        perf.record_timing("respond", Duration::from_millis(500));

        let sessions = Arc::new(SessionRegistry::new());
        sessions.register_active("conv-a");
        sessions.register_active("conv-b");

        let cache: Arc<CacheManager<String>> =
            Arc::new(CacheManager::new(10, Duration::from_secs(60)));
        let monitor = RealTimeMonitor::builder(Arc::clone(&perf))
            .sessions(sessions)
            .cache(cache.clone())
            .build();

        monitor.tick();
        let app = monitor.application_history().pop().unwrap();
        assert_eq!(app.active_sessions, 2);
        assert_eq!(app.cache_hit_rate, None);
        assert!((app.average_response_time - 0.5).abs() < 1e-9);

        cache.set("k", "v".to_string());
        cache.get("k");
        cache.get("missing");
        monitor.tick();
        let app = monitor.application_history().pop().unwrap();
        assert_eq!(app.cache_hit_rate, Some(0.5));
    }

    #[test]
    fn test_snapshot_every_nth_tick() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = RealTimeMonitor::builder(Arc::new(PerformanceMonitor::new()))
            .snapshots(dir.path(), 3)
            .snapshot_window(2)
            .build();

        for _ in 0..2 {
            monitor.tick();
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        monitor.tick();
        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.path())
            .collect();
        assert_eq!(files.len(), 1);

        let snapshot: MetricsSnapshot =
            serde_json::from_slice(&std::fs::read(&files[0]).unwrap()).unwrap();
        assert_eq!(snapshot.system_metrics.len(), 2);
        assert_eq!(snapshot.application_metrics.len(), 2);
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let monitor = monitor_with(Arc::new(NullHostSource));
        monitor.stop();
        assert!(!monitor.is_running());
    }

    #[test]
    fn test_start_twice_runs_one_loop() {
        let host = Arc::new(FixedHost::new(10.0, 20.0));
        let monitor = monitor_with(host.clone());

        monitor.start(Duration::from_secs(60)).unwrap();
        monitor.start(Duration::from_secs(60)).unwrap();
        assert!(monitor.is_running());

        std::thread::sleep(Duration::from_millis(100));
        let started = Instant::now();
        monitor.stop();

        assert!(!monitor.is_running());
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(host.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_loop_ticks_repeatedly_and_can_restart() {
        let host = Arc::new(FixedHost::new(10.0, 20.0));
        let monitor = monitor_with(host.clone());

        monitor.start(Duration::from_millis(10)).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        monitor.stop();

        let first_run = host.calls.load(Ordering::SeqCst);
        assert!(first_run >= 2);

        monitor.start(Duration::from_millis(10)).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        monitor.stop();
        assert!(host.calls.load(Ordering::SeqCst) > first_run);
    }

    #[test]
    fn test_restart_after_detached_stop_never_overlaps_loops() {
        let host = Arc::new(SlowFirstHost::new(Duration::from_millis(300)));
        let monitor = RealTimeMonitor::builder(Arc::new(PerformanceMonitor::new()))
            .host(host.clone())
            .stop_timeout(Duration::from_millis(50))
            .build();

        monitor.start(Duration::from_millis(10)).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        monitor.stop();
        assert!(!monitor.is_running());

        assert!(monitor.start(Duration::from_millis(10)).is_err());
        assert!(!monitor.is_running());

        std::thread::sleep(Duration::from_millis(400));
        monitor.start(Duration::from_millis(10)).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        monitor.stop();

        assert!(host.calls.load(Ordering::SeqCst) >= 2);
        assert_eq!(host.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unbounded_interval_still_stops_and_restarts() {
        let host = Arc::new(FixedHost::new(10.0, 20.0));
        let monitor = monitor_with(host.clone());

        monitor.start(Duration::MAX).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        monitor.stop();
        assert!(!monitor.is_running());
        assert_eq!(host.calls.load(Ordering::SeqCst), 1);

        monitor.start(Duration::MAX).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert!(monitor.is_running());
        monitor.stop();
        assert_eq!(host.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_performance_report() {
        let monitor = monitor_with(Arc::new(FixedHost::new(40.0, 60.0)));
        let empty = monitor.performance_report();
        assert!(empty.current_status.is_none());
        assert!(empty.historical_stats.is_none());

        monitor.tick();
        monitor.tick();

        let report = monitor.performance_report();
        assert_eq!(report.monitoring_duration, 2);
        let stats = report.historical_stats.unwrap();
        assert_eq!(stats.cpu.average, 40.0);
        assert_eq!(stats.memory.max, 60.0);
    }
}
