use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::sample::{ApplicationMetricsSample, SystemMetricsSample};
use crate::error::{VigilError, VigilResult};

/// On-disk shape of a metrics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub system_metrics: Vec<SystemMetricsSample>,
    pub application_metrics: Vec<ApplicationMetricsSample>,
}

#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write one pretty-printed snapshot file and return its path.
    pub fn write(
        &self,
        system_metrics: Vec<SystemMetricsSample>,
        application_metrics: Vec<ApplicationMetricsSample>,
    ) -> VigilResult<PathBuf> {
        let now = Utc::now();
        let path = self.dir.join(format!(
            "performance_metrics_{}.json",
            now.format("%Y%m%d_%H%M%S_%3f")
        ));

        let snapshot = MetricsSnapshot {
            timestamp: now,
            system_metrics,
            application_metrics,
        };

        let failed = |message: String| VigilError::SnapshotFailed {
            path: path.display().to_string(),
            message,
        };

        std::fs::create_dir_all(&self.dir).map_err(|e| failed(e.to_string()))?;
        let body = serde_json::to_vec_pretty(&snapshot).map_err(|e| failed(e.to_string()))?;
        std::fs::write(&path, body).map_err(|e| failed(e.to_string()))?;

        debug!(
            path = %path.display(),
            system_samples = snapshot.system_metrics.len(),
            application_samples = snapshot.application_metrics.len(),
            "Metrics snapshot written"
        );

        Ok(path)
    }
}
