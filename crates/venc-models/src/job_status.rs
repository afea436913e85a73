//! Queue-side job status and statistics payloads.
//!
//! These types mirror the monitoring endpoints of the queue backend:
//! `GET /encoding-queue/{code}/status`, `GET /encoding-queue/stats` and
//! `POST /encoding-queue/reset-stuck`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{EncodingOptions, VideoCode};

/// Failure ratio above which the queue is reported as degraded.
pub const HIGH_FAILURE_RATIO: f64 = 0.1;
/// Pending jobs above which the queue is reported as backed up.
pub const BACKLOG_THRESHOLD: u64 = 100;
/// Average processing time above which encoders are reported as slow.
pub const SLOW_PROCESSING_SECS: f64 = 3600.0;

/// Job status as tracked by the queue owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a worker
    #[default]
    Pending,
    /// Claimed by a worker
    Processing,
    /// Rendition and thumbnails delivered
    Completed,
    /// Failed; may be picked up again while retry budget remains
    Failed,
    /// Any status this worker does not know about
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Unknown => "unknown",
        }
    }

    /// Check if this is a terminal state from the worker's point of view.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Response of `GET /encoding-queue/{code}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub video_code: VideoCode,
    pub status: JobStatus,
    #[serde(default)]
    pub input_file_path: Option<String>,
    #[serde(default)]
    pub output_file_path: Option<String>,
    #[serde(default)]
    pub thumbnail_paths: Option<Vec<String>>,
    #[serde(default)]
    pub encoding_options: Option<EncodingOptions>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub last_retry_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Response of `GET /encoding-queue/stats`.
///
/// Fields the worker does not interpret are kept verbatim in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    #[serde(default)]
    pub pending: u64,
    #[serde(default)]
    pub processing: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub retryable: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub stuck_jobs: u64,
    #[serde(default)]
    pub avg_processing_time_seconds: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Overall queue condition derived from [`QueueStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueCondition {
    Healthy,
    Warning,
}

/// Operator-facing assessment of the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueAssessment {
    pub condition: QueueCondition,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

impl QueueStats {
    /// Fraction of all jobs that failed, if any jobs exist.
    pub fn failure_ratio(&self) -> Option<f64> {
        (self.total > 0).then(|| self.failed as f64 / self.total as f64)
    }

    /// Fraction of all jobs that completed, if any jobs exist.
    pub fn success_ratio(&self) -> Option<f64> {
        (self.total > 0).then(|| self.completed as f64 / self.total as f64)
    }

    /// Flag failure rate, stuck jobs, backlog and slow processing.
    pub fn assess(&self) -> QueueAssessment {
        let mut issues = Vec::new();
        let mut recommendations = Vec::new();

        if let Some(ratio) = self.failure_ratio().filter(|r| *r > HIGH_FAILURE_RATIO) {
            issues.push(format!("High failure rate: {:.1}%", ratio * 100.0));
            recommendations.push("Check encoder logs for common failure patterns".to_string());
        }
        if self.stuck_jobs > 0 {
            issues.push(format!("{} jobs appear to be stuck", self.stuck_jobs));
            recommendations.push("Run reset-stuck to reset stuck jobs".to_string());
        }
        if self.pending > BACKLOG_THRESHOLD {
            issues.push(format!("Large queue backlog: {} pending jobs", self.pending));
            recommendations.push("Consider scaling up encoder instances".to_string());
        }
        if self
            .avg_processing_time_seconds
            .is_some_and(|secs| secs > SLOW_PROCESSING_SECS)
        {
            issues.push("Slow average processing time".to_string());
            recommendations
                .push("Check encoder performance and resource allocation".to_string());
        }

        let condition = if issues.is_empty() {
            QueueCondition::Healthy
        } else {
            QueueCondition::Warning
        };

        QueueAssessment {
            condition,
            issues,
            recommendations,
        }
    }
}

/// Response of `POST /encoding-queue/reset-stuck`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetStuckResponse {
    pub message: String,
}
