#![allow(
    clippy::needless_borrows_for_generic_args,
    clippy::manual_range_contains,
    clippy::derivable_impls,
    clippy::type_complexity,
    clippy::new_without_default
)]

pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod errors;
pub mod instrument;
pub mod logging;
pub mod monitor;
pub mod perf;

pub use app::{AppContext, OptimizationReport};
pub use cache::{derive_key, CacheManager, CacheStats, CacheStatsSource, FileCache};
pub use config::{
    ensure_cache_dir, get_cache_dir, get_config_dir, CacheConfig, ConfigLoadError, LoggingConfig,
    MonitorConfig, StorageConfig, ThresholdConfig, VigilConfig,
};
pub use error::{CliErrorDisplay, ErrorContext, ErrorType, Severity, VigilError, VigilResult};
pub use errors::{
    fallback_on_api_error, retry_on_network_error, validate_api_response, validate_file_path,
    validate_input, with_error_handling, with_error_handling_async, ErrorHandler, ErrorHumanizer,
    ErrorInfo, ErrorStatistics, HumanizedError, RecoveryStrategy, Validator,
};
pub use instrument::{
    batch_process, cached, cached_async, timed, timed_async, timed_with_memory, try_cached,
    Debouncer, DEFAULT_BATCH_WORKERS,
};
pub use logging::init_logging;
pub use monitor::{
    evaluate_alerts, health_status, recommendations, trend, Alert, AlertCallback, AlertKind,
    AlertSeverity, AlertThresholds, ApplicationMetricsSample, BoundedHistory, CurrentStatus,
    HealthStatus, HistoricalStats, HostMetricsSource, HostSample, MetricsSnapshot, MonitorBuilder,
    MonitorReport, NullHostSource, RangeStats, RealTimeMonitor, RecordCounter, SessionRegistry,
    SessionSource, SnapshotWriter, SqliteRecordCounter, SysinfoHostSource, SystemMetricsSample,
    Trend, Trends,
};
pub use perf::{
    FunctionStats, OperationSummary, PerformanceMetric, PerformanceMonitor, PerformanceReport,
    ReportSummary,
};
