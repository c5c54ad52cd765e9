use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VigilConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json_format: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    #[serde(default = "default_snapshot_every")]
    pub snapshot_every_ticks: u64,

    #[serde(default = "default_snapshot_window")]
    pub snapshot_window: usize,

    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,

    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default = "default_cpu_percent")]
    pub cpu_percent: f64,

    #[serde(default = "default_cpu_critical")]
    pub cpu_critical_percent: f64,

    #[serde(default = "default_memory_percent")]
    pub memory_percent: f64,

    #[serde(default = "default_memory_critical")]
    pub memory_critical_percent: f64,

    #[serde(default = "default_response_time")]
    pub average_response_time_secs: f64,

    #[serde(default = "default_errors_per_hour")]
    pub errors_per_hour: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_size")]
    pub max_size: usize,

    #[serde(default = "default_ttl")]
    pub default_ttl_secs: u64,

    #[serde(default)]
    pub file_cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite URL of the assistant's conversation memory store
    #[serde(default)]
    pub memory_db_url: Option<String>,

    #[serde(default = "default_memory_table")]
    pub memory_table: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_interval() -> u64 {
    60
}

fn default_history_capacity() -> usize {
    24 * 60
}

fn default_snapshot_every() -> u64 {
    10
}

fn default_snapshot_window() -> usize {
    60
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from(".vigil").join("metrics")
}

fn default_stop_timeout() -> u64 {
    5
}

fn default_cpu_percent() -> f64 {
    80.0
}

fn default_cpu_critical() -> f64 {
    90.0
}

fn default_memory_percent() -> f64 {
    85.0
}

fn default_memory_critical() -> f64 {
    95.0
}

fn default_response_time() -> f64 {
    5.0
}

fn default_errors_per_hour() -> u64 {
    10
}

fn default_cache_size() -> usize {
    1000
}

fn default_ttl() -> u64 {
    3600
}

fn default_memory_table() -> String {
    "conversations".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            history_capacity: default_history_capacity(),
            snapshot_every_ticks: default_snapshot_every(),
            snapshot_window: default_snapshot_window(),
            snapshot_dir: default_snapshot_dir(),
            stop_timeout_secs: default_stop_timeout(),
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            cpu_percent: default_cpu_percent(),
            cpu_critical_percent: default_cpu_critical(),
            memory_percent: default_memory_percent(),
            memory_critical_percent: default_memory_critical(),
            average_response_time_secs: default_response_time(),
            errors_per_hour: default_errors_per_hour(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_cache_size(),
            default_ttl_secs: default_ttl(),
            file_cache_dir: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            memory_db_url: None,
            memory_table: default_memory_table(),
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

impl VigilConfig {
    pub fn load() -> Result<Self, ConfigLoadError> {
        Self::load_from_paths(get_config_paths())
    }

    pub fn load_from_paths(paths: Vec<PathBuf>) -> Result<Self, ConfigLoadError> {
        load_dotenv_files();

        let mut builder = ConfigBuilder::builder();

        for path in paths {
            if path.exists() {
                builder = builder.add_source(File::from(path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("VIGIL")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut vigil_config: VigilConfig = builder.build()?.try_deserialize()?;

        if let Ok(level) = std::env::var("VIGIL_LOG_LEVEL") {
            vigil_config.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            vigil_config.logging.level = level;
        }

        if let Ok(interval) = std::env::var("VIGIL_MONITOR_INTERVAL") {
            if let Ok(secs) = interval.parse() {
                vigil_config.monitor.interval_secs = secs;
            }
        }

        if let Ok(url) = std::env::var("VIGIL_MEMORY_DB_URL") {
            vigil_config.storage.memory_db_url = Some(url);
        }

        vigil_config.validate()?;

        Ok(vigil_config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.monitor.interval_secs == 0 {
            return Err(invalid("monitor.interval_secs", "Must be greater than 0"));
        }

        if self.monitor.history_capacity == 0 {
            return Err(invalid("monitor.history_capacity", "Must be greater than 0"));
        }

        if self.monitor.snapshot_every_ticks == 0 {
            return Err(invalid(
                "monitor.snapshot_every_ticks",
                "Must be greater than 0",
            ));
        }

        if self.cache.max_size == 0 {
            return Err(invalid("cache.max_size", "Must be greater than 0"));
        }

        let t = &self.thresholds;
        for (key, value) in [
            ("thresholds.cpu_percent", t.cpu_percent),
            ("thresholds.memory_percent", t.memory_percent),
            ("thresholds.average_response_time_secs", t.average_response_time_secs),
        ] {
            if value < 0.0 || value.is_nan() {
                return Err(invalid(key, "Must be a non-negative number"));
            }
        }

        if t.cpu_critical_percent < t.cpu_percent {
            return Err(invalid(
                "thresholds.cpu_critical_percent",
                "Cannot be lower than cpu_percent",
            ));
        }

        if t.memory_critical_percent < t.memory_percent {
            return Err(invalid(
                "thresholds.memory_critical_percent",
                "Cannot be lower than memory_percent",
            ));
        }

        if let Some(ref url) = self.storage.memory_db_url {
            if !url.starts_with("sqlite:") {
                return Err(invalid(
                    "storage.memory_db_url",
                    "Must be a SQLite URL starting with sqlite:",
                ));
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        let level_lower = self.logging.level.to_lowercase();
        if !valid_levels.contains(&level_lower.as_str()) && !level_lower.contains('=') {
            return Err(ConfigLoadError::InvalidValue {
                key: "logging.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Must be one of: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        Ok(())
    }

    pub fn log_level(&self) -> &str {
        &self.logging.level
    }

    pub fn monitor_interval(&self) -> Duration {
        self.monitor.interval()
    }
}

fn invalid(key: &str, message: &str) -> ConfigLoadError {
    ConfigLoadError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join("config").join("default.toml"));
        paths.push(cwd.join("config").join("local.toml"));
        paths.push(cwd.join("vigil.toml"));
    }

    if let Some(config_dir) = get_config_dir() {
        paths.push(config_dir.join("config.toml"));
    }

    paths
}

fn load_dotenv_files() {
    let mut paths = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".env"));
        paths.push(cwd.join(".env.local"));
    }

    if let Some(config_dir) = get_config_dir() {
        paths.push(config_dir.join(".env"));
    }

    for path in paths {
        if path.exists() {
            let _ = dotenvy::from_path(&path);
        }
    }
}

pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vigil"))
}

pub fn get_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("vigil"))
}

pub fn ensure_cache_dir() -> Result<PathBuf, std::io::Error> {
    let cache_dir = get_cache_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine cache directory",
        )
    })?;

    if !cache_dir.exists() {
        std::fs::create_dir_all(&cache_dir)?;
    }

    Ok(cache_dir)
}
