//! Per-operation timing statistics fed by the instrumentation wrappers.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::trace;

const RECENT_METRICS_CAPACITY: usize = 1000;
const REPORT_TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    pub function_name: String,
    /// Seconds
    pub execution_time: f64,
    /// Process RSS change in bytes, when measured
    pub memory_delta: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

impl PerformanceMetric {
    pub fn new(function_name: impl Into<String>, execution_time: Duration) -> Self {
        Self {
            function_name: function_name.into(),
            execution_time: execution_time.as_secs_f64(),
            memory_delta: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_memory_delta(mut self, delta: Option<i64>) -> Self {
        self.memory_delta = delta;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FunctionStats {
    pub total_time: f64,
    pub call_count: u64,
    pub avg_time: f64,
    pub min_time: f64,
    pub max_time: f64,
}

impl Default for FunctionStats {
    fn default() -> Self {
        Self {
            total_time: 0.0,
            call_count: 0,
            avg_time: 0.0,
            min_time: f64::INFINITY,
            max_time: 0.0,
        }
    }
}

impl FunctionStats {
    fn record(&mut self, execution_time: f64) {
        self.total_time += execution_time;
        self.call_count += 1;
        self.avg_time = self.total_time / self.call_count as f64;
        self.min_time = self.min_time.min(execution_time);
        self.max_time = self.max_time.max(execution_time);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_operations_monitored: usize,
    pub total_calls: u64,
    /// Mean of the per-operation averages, in seconds
    pub average_execution_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSummary {
    pub name: String,
    pub avg_time: f64,
    pub calls: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub summary: Option<ReportSummary>,
    pub slowest_operations: Vec<OperationSummary>,
    pub most_called_operations: Vec<OperationSummary>,
}

impl PerformanceReport {
    pub fn average_execution_time(&self) -> f64 {
        self.summary
            .as_ref()
            .map(|s| s.average_execution_time)
            .unwrap_or(0.0)
    }
}

#[derive(Default)]
struct MonitorState {
    stats: HashMap<String, FunctionStats>,
    recent: VecDeque<PerformanceMetric>,
}

#[derive(Default)]
pub struct PerformanceMonitor {
    state: Mutex<MonitorState>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, metric: PerformanceMetric) {
        let mut state = self.state.lock();

        state
            .stats
            .entry(metric.function_name.clone())
            .or_default()
            .record(metric.execution_time);

        trace!(
            function = %metric.function_name,
            execution_time = metric.execution_time,
            "Recorded performance metric"
        );

        if state.recent.len() == RECENT_METRICS_CAPACITY {
            state.recent.pop_front();
        }
        state.recent.push_back(metric);
    }

    pub fn record_timing(&self, function_name: impl Into<String>, execution_time: Duration) {
        self.record(PerformanceMetric::new(function_name, execution_time));
    }

    pub fn function_stats(&self, function_name: &str) -> Option<FunctionStats> {
        self.state.lock().stats.get(function_name).copied()
    }

    /// Operations whose average time exceeds `threshold_secs`, slowest first.
    pub fn slow_operations(&self, threshold_secs: f64) -> Vec<(String, FunctionStats)> {
        let state = self.state.lock();
        let mut slow: Vec<(String, FunctionStats)> = state
            .stats
            .iter()
            .filter(|(_, s)| s.avg_time > threshold_secs)
            .map(|(name, s)| (name.clone(), *s))
            .collect();
        slow.sort_by(|a, b| b.1.avg_time.total_cmp(&a.1.avg_time));
        slow
    }

    pub fn report(&self) -> PerformanceReport {
        let state = self.state.lock();

        if state.stats.is_empty() {
            return PerformanceReport::default();
        }

        let total_operations = state.stats.len();
        let total_calls = state.stats.values().map(|s| s.call_count).sum();
        let average_execution_time =
            state.stats.values().map(|s| s.avg_time).sum::<f64>() / total_operations as f64;

        let mut entries: Vec<(&String, &FunctionStats)> = state.stats.iter().collect();

        entries.sort_by(|a, b| b.1.avg_time.total_cmp(&a.1.avg_time));
        let slowest_operations = entries
            .iter()
            .take(REPORT_TOP_N)
            .map(|(name, s)| summarize(name, s))
            .collect();

        entries.sort_by(|a, b| b.1.call_count.cmp(&a.1.call_count));
        let most_called_operations = entries
            .iter()
            .take(REPORT_TOP_N)
            .map(|(name, s)| summarize(name, s))
            .collect();

        PerformanceReport {
            summary: Some(ReportSummary {
                total_operations_monitored: total_operations,
                total_calls,
                average_execution_time,
            }),
            slowest_operations,
            most_called_operations,
        }
    }

    pub fn recent_metrics(&self) -> Vec<PerformanceMetric> {
        self.state.lock().recent.iter().cloned().collect()
    }

    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.stats.clear();
        state.recent.clear();
    }
}

fn summarize(name: &str, stats: &FunctionStats) -> OperationSummary {
    OperationSummary {
        name: name.to_string(),
        avg_time: stats.avg_time,
        calls: stats.call_count,
    }
}
