use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::host::HostSample;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetricsSample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_used_mb: f64,
    pub disk_usage_percent: f64,
    pub active_threads: usize,
}

impl SystemMetricsSample {
    pub fn from_host(timestamp: DateTime<Utc>, host: HostSample) -> Self {
        Self {
            timestamp,
            cpu_percent: host.cpu_percent,
            memory_percent: host.memory_percent,
            memory_used_mb: host.memory_used_mb,
            disk_usage_percent: host.disk_usage_percent,
            active_threads: host.active_threads,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationMetricsSample {
    pub timestamp: DateTime<Utc>,
    pub active_sessions: usize,
    pub memory_records: u64,
    /// `None` when no cache is attached or it has not served a lookup yet
    pub cache_hit_rate: Option<f64>,
    /// Seconds
    pub average_response_time: f64,
    pub errors_last_hour: u64,
}
