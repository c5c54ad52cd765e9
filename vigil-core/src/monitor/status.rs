use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::sample::{ApplicationMetricsSample, SystemMetricsSample};

const HEALTH_CPU_PERCENT: f64 = 80.0;
const HEALTH_MEMORY_PERCENT: f64 = 85.0;
const HEALTH_RESPONSE_TIME_SECS: f64 = 3.0;
const HEALTH_ERRORS_PER_HOUR: u64 = 5;
const LOW_CACHE_HIT_RATE: f64 = 0.7;

const TREND_WINDOW: usize = 10;
const TREND_SPAN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Excellent,
    Good,
    Warning,
    Critical,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Excellent => "excellent",
            HealthStatus::Good => "good",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trend::Increasing => "increasing",
            Trend::Decreasing => "decreasing",
            Trend::Stable => "stable",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trends {
    pub cpu: Trend,
    pub memory: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentStatus {
    pub timestamp: DateTime<Utc>,
    pub system: SystemMetricsSample,
    pub application: ApplicationMetricsSample,
    pub trends: Trends,
    pub health_status: HealthStatus,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

impl RangeStats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let sum: f64 = values.iter().sum();
        Some(Self {
            average: sum / values.len() as f64,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalStats {
    pub cpu: RangeStats,
    pub memory: RangeStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorReport {
    pub current_status: Option<CurrentStatus>,
    pub historical_stats: Option<HistoricalStats>,
    /// Number of system samples held
    pub monitoring_duration: usize,
    pub last_updated: DateTime<Utc>,
}

pub fn health_status(system: &SystemMetricsSample, app: &ApplicationMetricsSample) -> HealthStatus {
    let issues = [
        system.cpu_percent > HEALTH_CPU_PERCENT,
        system.memory_percent > HEALTH_MEMORY_PERCENT,
        app.average_response_time > HEALTH_RESPONSE_TIME_SECS,
        app.errors_last_hour > HEALTH_ERRORS_PER_HOUR,
    ]
    .into_iter()
    .filter(|issue| *issue)
    .count();

    match issues {
        0 => HealthStatus::Excellent,
        1 => HealthStatus::Good,
        2 => HealthStatus::Warning,
        _ => HealthStatus::Critical,
    }
}

/// Compare the mean of the newest three values against the three before them.
///
/// Only the last ten values are considered. With fewer than six values the
/// recent mean is its own baseline, which always yields `Stable`.
pub fn trend(values: &[f64]) -> Trend {
    let window = &values[values.len().saturating_sub(TREND_WINDOW)..];
    if window.len() < 2 {
        return Trend::Stable;
    }

    let recent = &window[window.len().saturating_sub(TREND_SPAN)..];
    let recent_avg = mean(recent);

    let previous_avg = if window.len() >= TREND_SPAN * 2 {
        let end = window.len() - TREND_SPAN;
        mean(&window[end - TREND_SPAN..end])
    } else {
        recent_avg
    };

    if recent_avg > previous_avg * 1.1 {
        Trend::Increasing
    } else if recent_avg < previous_avg * 0.9 {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn recommendations(system: &SystemMetricsSample, app: &ApplicationMetricsSample) -> Vec<String> {
    let mut hints = Vec::new();

    if system.cpu_percent > HEALTH_CPU_PERCENT {
        hints.push("High CPU detected: optimize hot paths or reduce load".to_string());
    }
    if system.memory_percent > HEALTH_MEMORY_PERCENT {
        hints.push("High memory usage: look for leaks or raise the memory limit".to_string());
    }
    if app.average_response_time > HEALTH_RESPONSE_TIME_SECS {
        hints.push("Slow responses: tune caching or shorten prompts".to_string());
    }
    if app.errors_last_hour > HEALTH_ERRORS_PER_HOUR {
        hints.push("Many errors detected: review the logs and fix the failing paths".to_string());
    }
    if app.cache_hit_rate.is_some_and(|rate| rate < LOW_CACHE_HIT_RATE) {
        hints.push("Low cache hit rate: revisit the caching strategy".to_string());
    }

    if hints.is_empty() {
        hints.push("All systems nominal".to_string());
    }

    hints
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system(cpu: f64, memory: f64) -> SystemMetricsSample {
        SystemMetricsSample {
            timestamp: Utc::now(),
            cpu_percent: cpu,
            memory_percent: memory,
            memory_used_mb: 1024.0,
            disk_usage_percent: 50.0,
            active_threads: 8,
        }
    }

    fn app(response: f64, errors: u64, hit_rate: Option<f64>) -> ApplicationMetricsSample {
        ApplicationMetricsSample {
            timestamp: Utc::now(),
            active_sessions: 2,
            memory_records: 10,
            cache_hit_rate: hit_rate,
            average_response_time: response,
            errors_last_hour: errors,
        }
    }

    #[test]
    fn test_health_excellent() {
        assert_eq!(
            health_status(&system(20.0, 40.0), &app(1.0, 0, Some(0.9))),
            HealthStatus::Excellent
        );
    }

    #[test]
    fn test_health_grades_by_issue_count() {
        assert_eq!(
            health_status(&system(85.0, 40.0), &app(1.0, 0, None)),
            HealthStatus::Good
        );
        assert_eq!(
            health_status(&system(85.0, 90.0), &app(1.0, 0, None)),
            HealthStatus::Warning
        );
        assert_eq!(
            health_status(&system(85.0, 90.0), &app(4.0, 0, None)),
            HealthStatus::Critical
        );
    }

    #[test]
    fn test_health_critical() {
        assert_eq!(
            health_status(&system(95.0, 95.0), &app(6.0, 20, Some(0.1))),
            HealthStatus::Critical
        );
    }

    #[test]
    fn test_trend_needs_two_values() {
        assert_eq!(trend(&[]), Trend::Stable);
        assert_eq!(trend(&[50.0]), Trend::Stable);
    }

    #[test]
    fn test_trend_short_series_is_stable() {
        assert_eq!(trend(&[10.0, 90.0, 95.0]), Trend::Stable);
    }

    #[test]
    fn test_trend_increasing_and_decreasing() {
        assert_eq!(
            trend(&[10.0, 10.0, 10.0, 20.0, 20.0, 20.0]),
            Trend::Increasing
        );
        assert_eq!(
            trend(&[20.0, 20.0, 20.0, 10.0, 10.0, 10.0]),
            Trend::Decreasing
        );
        assert_eq!(
            trend(&[10.0, 10.0, 10.0, 10.5, 10.5, 10.5]),
            Trend::Stable
        );
    }

    #[test]
    fn test_trend_only_looks_at_last_ten() {
        let mut values = vec![1000.0; 20];
        values.extend([10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 30.0, 30.0, 30.0]);
        assert_eq!(trend(&values), Trend::Increasing);
    }

    #[test]
    fn test_recommendations_all_good() {
        let hints = recommendations(&system(10.0, 10.0), &app(0.1, 0, None));
        assert_eq!(hints, vec!["All systems nominal".to_string()]);
    }

    #[test]
    fn test_recommendations_cache_only_when_known() {
        let known = recommendations(&system(10.0, 10.0), &app(0.1, 0, Some(0.4)));
        assert_eq!(known.len(), 1);
        assert!(known[0].contains("cache"));

        let unknown = recommendations(&system(10.0, 10.0), &app(0.1, 0, None));
        assert!(!unknown[0].contains("cache"));
    }

    #[test]
    fn test_recommendations_are_independent() {
        let hints = recommendations(&system(90.0, 90.0), &app(5.0, 9, Some(0.2)));
        assert_eq!(hints.len(), 5);
    }

    #[test]
    fn test_range_stats() {
        let stats = RangeStats::from_values(&[10.0, 30.0, 20.0]).unwrap();
        assert_eq!(stats.average, 20.0);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 30.0);
        assert!(RangeStats::from_values(&[]).is_none());
    }
}
