//! Explicit wiring of the monitoring, caching and error-handling components.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{CacheManager, CacheStats, FileCache};
use crate::config::VigilConfig;
use crate::error::{ErrorContext, VigilError, VigilResult};
use crate::errors::{ErrorHandler, ErrorInfo};
use crate::monitor::{
    HostMetricsSource, MonitorBuilder, RealTimeMonitor, RecordCounter, SessionRegistry,
    SqliteRecordCounter, SysinfoHostSource,
};
use crate::perf::{FunctionStats, PerformanceMonitor, PerformanceReport};

const LOW_HIT_RATE: f64 = 0.5;
const SLOW_OPERATION_SECS: f64 = 1.0;
const REPORTED_SLOW_OPERATION_SECS: f64 = 0.5;
const HOT_OPERATION_CALLS: u64 = 1000;

/// Snapshot of the caching and timing layer with tuning hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub performance: PerformanceReport,
    pub cache_stats: CacheStats,
    pub slow_operations: Vec<(String, FunctionStats)>,
    pub recommendations: Vec<String>,
}

/// Owns one instance of every component, built from configuration.
pub struct AppContext {
    config: VigilConfig,
    cache: Arc<CacheManager<serde_json::Value>>,
    file_cache: Option<FileCache>,
    perf: Arc<PerformanceMonitor>,
    sessions: Arc<SessionRegistry>,
    errors: Arc<ErrorHandler>,
    host: Arc<dyn HostMetricsSource>,
    monitor: RealTimeMonitor,
}

impl AppContext {
    /// Context sampling the real host, without a memory store.
    pub fn new(config: VigilConfig) -> Self {
        Self::with_collaborators(config, Arc::new(SysinfoHostSource::new()), None)
    }

    /// Context sampling the real host, counting records in the configured
    /// SQLite memory store when one is set.
    pub async fn connect(config: VigilConfig) -> VigilResult<Self> {
        let records: Option<Arc<dyn RecordCounter>> = match &config.storage.memory_db_url {
            Some(url) => {
                let counter =
                    SqliteRecordCounter::connect(url, &config.storage.memory_table).await?;
                Some(Arc::new(counter))
            }
            None => None,
        };

        Ok(Self::with_collaborators(
            config,
            Arc::new(SysinfoHostSource::new()),
            records,
        ))
    }

    pub fn with_collaborators(
        config: VigilConfig,
        host: Arc<dyn HostMetricsSource>,
        records: Option<Arc<dyn RecordCounter>>,
    ) -> Self {
        let cache = Arc::new(CacheManager::from_config(&config.cache));
        let perf = Arc::new(PerformanceMonitor::new());
        let sessions = Arc::new(SessionRegistry::new());
        let errors = Arc::new(ErrorHandler::with_default_strategies());

        let file_cache = config.cache.file_cache_dir.as_ref().and_then(|dir| {
            FileCache::new(dir)
                .map_err(|e| warn!(dir = %dir.display(), error = %e, "File cache disabled"))
                .ok()
        });

        let mut builder =
            MonitorBuilder::from_config(Arc::clone(&perf), &config.monitor, &config.thresholds)
                .host(Arc::clone(&host))
                .sessions(sessions.clone())
                .cache(cache.clone());
        if let Some(records) = records {
            builder = builder.records(records);
        }

        info!(
            cache_max_size = config.cache.max_size,
            interval_secs = config.monitor.interval_secs,
            "Application context initialized"
        );

        Self {
            monitor: builder.build(),
            config,
            cache,
            file_cache,
            perf,
            sessions,
            errors,
            host,
        }
    }

    pub fn config(&self) -> &VigilConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheManager<serde_json::Value>> {
        &self.cache
    }

    pub fn file_cache(&self) -> Option<&FileCache> {
        self.file_cache.as_ref()
    }

    pub fn perf(&self) -> &Arc<PerformanceMonitor> {
        &self.perf
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn error_handler(&self) -> &Arc<ErrorHandler> {
        &self.errors
    }

    pub fn host(&self) -> &Arc<dyn HostMetricsSource> {
        &self.host
    }

    pub fn monitor(&self) -> &RealTimeMonitor {
        &self.monitor
    }

    pub fn start_monitoring(&self) -> VigilResult<()> {
        self.monitor.start(self.config.monitor.interval())
    }

    pub fn stop_monitoring(&self) {
        self.monitor.stop();
    }

    /// Handle an error and count it towards the monitor's error rate.
    pub fn handle_error(&self, err: &VigilError, context: Option<&ErrorContext>) -> ErrorInfo {
        self.monitor.record_error();
        self.errors.handle(err, context, true, true)
    }

    pub fn optimization_report(&self) -> OptimizationReport {
        OptimizationReport {
            performance: self.perf.report(),
            cache_stats: self.cache.stats(),
            slow_operations: self.perf.slow_operations(REPORTED_SLOW_OPERATION_SECS),
            recommendations: self.optimization_recommendations(),
        }
    }

    pub fn optimization_recommendations(&self) -> Vec<String> {
        let mut hints = Vec::new();

        let stats = self.cache.stats();
        if stats.lookups() > 0 && stats.hit_rate < LOW_HIT_RATE {
            hints.push("Low cache hit rate: review which results are cached".to_string());
        }

        let slow = self.perf.slow_operations(SLOW_OPERATION_SECS);
        if !slow.is_empty() {
            hints.push(format!(
                "Optimize {} slow operation(s) taking more than {}s",
                slow.len(),
                SLOW_OPERATION_SECS
            ));
        }

        let report = self.perf.report();
        if report
            .most_called_operations
            .first()
            .is_some_and(|op| op.calls > HOT_OPERATION_CALLS)
        {
            hints.push("Consider caching the most frequently called operations".to_string());
        }

        if hints.is_empty() {
            hints.push("Performance looks good".to_string());
        }

        hints
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        self.monitor.stop();
    }
}
