//! Metrics parsed from stored backup result content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome reported by the backup tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    Success,
    Warning,
    Failure,
    Unknown,
}

impl BackupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Failure => "failure",
            Self::Unknown => "unknown",
        }
    }

    /// Maps the wording used by common backup tools onto a status.
    pub fn from_report(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "success" | "succeeded" | "ok" | "completed" | "complete" => Self::Success,
            "warning" | "warn" | "partial" | "completed with warnings" => Self::Warning,
            "failure" | "failed" | "fail" | "error" | "aborted" => Self::Failure,
            _ => Self::Unknown,
        }
    }
}

/// Structured result of parsing one backup report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupMetrics {
    pub status: BackupStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub size_bytes: Option<u64>,
    pub file_count: Option<u64>,
    pub error_count: Option<u64>,
    pub message: Option<String>,
}

impl BackupMetrics {
    /// Metrics with only a status set.
    pub fn with_status(status: BackupStatus) -> Self {
        Self {
            status,
            started_at: None,
            finished_at: None,
            duration_seconds: None,
            size_bytes: None,
            file_count: None,
            error_count: None,
            message: None,
        }
    }

    /// Reported duration, or the span between start and finish.
    pub fn effective_duration_seconds(&self) -> Option<f64> {
        self.duration_seconds.or_else(|| match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) if end >= start => {
                Some((end - start).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        })
    }
}
