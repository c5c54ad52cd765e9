use serde::{Deserialize, Serialize};
use std::fmt;

use super::sample::{ApplicationMetricsSample, SystemMetricsSample};
use crate::config::ThresholdConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    CpuHigh,
    MemoryHigh,
    ResponseTimeHigh,
    ErrorsHigh,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::CpuHigh => "cpu_high",
            AlertKind::MemoryHigh => "memory_high",
            AlertKind::ResponseTimeHigh => "response_time_high",
            AlertKind::ErrorsHigh => "errors_high",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSeverity::Warning => write!(f, "warning"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub message: String,
    pub severity: AlertSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    pub cpu_percent: f64,
    pub cpu_critical_percent: f64,
    pub memory_percent: f64,
    pub memory_critical_percent: f64,
    pub average_response_time: f64,
    pub errors_per_hour: u64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self::from(&ThresholdConfig::default())
    }
}

impl From<&ThresholdConfig> for AlertThresholds {
    fn from(config: &ThresholdConfig) -> Self {
        Self {
            cpu_percent: config.cpu_percent,
            cpu_critical_percent: config.cpu_critical_percent,
            memory_percent: config.memory_percent,
            memory_critical_percent: config.memory_critical_percent,
            average_response_time: config.average_response_time_secs,
            errors_per_hour: config.errors_per_hour,
        }
    }
}

/// Alerts raised by the latest sample pair. Pure: no state besides the inputs.
pub fn evaluate_alerts(
    system: &SystemMetricsSample,
    app: &ApplicationMetricsSample,
    thresholds: &AlertThresholds,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if system.cpu_percent > thresholds.cpu_percent {
        alerts.push(Alert {
            kind: AlertKind::CpuHigh,
            message: format!("High CPU usage: {:.1}%", system.cpu_percent),
            severity: graded(system.cpu_percent, thresholds.cpu_critical_percent),
        });
    }

    if system.memory_percent > thresholds.memory_percent {
        alerts.push(Alert {
            kind: AlertKind::MemoryHigh,
            message: format!("High memory usage: {:.1}%", system.memory_percent),
            severity: graded(system.memory_percent, thresholds.memory_critical_percent),
        });
    }

    if app.average_response_time > thresholds.average_response_time {
        alerts.push(Alert {
            kind: AlertKind::ResponseTimeHigh,
            message: format!("Slow responses: {:.2}s average", app.average_response_time),
            severity: AlertSeverity::Warning,
        });
    }

    if app.errors_last_hour > thresholds.errors_per_hour {
        alerts.push(Alert {
            kind: AlertKind::ErrorsHigh,
            message: format!("Too many errors: {} in the last hour", app.errors_last_hour),
            severity: AlertSeverity::Critical,
        });
    }

    alerts
}

fn graded(value: f64, critical_at: f64) -> AlertSeverity {
    if value >= critical_at {
        AlertSeverity::Critical
    } else {
        AlertSeverity::Warning
    }
}
