use crate::{execution::write::WriteOperation, records::batch::percent};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClassificationStatus {
    Success,
    Failure,
}

impl ClassificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationStatus::Success => "SUCCESS",
            ClassificationStatus::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for ClassificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data-quality verdict for one transformed record.
///
/// Independent of whether the remote write of that record succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationRecord {
    pub row_index: usize,
    pub status: ClassificationStatus,
    pub reasons: Vec<String>,
}

impl ClassificationRecord {
    pub fn is_failure(&self) -> bool {
        self.status == ClassificationStatus::Failure
    }

    pub fn reason_text(&self) -> String {
        if self.reasons.is_empty() {
            "All validations passed".to_string()
        } else {
            self.reasons.join("; ")
        }
    }
}

/// Aggregate counts for one synchronization run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub org: String,
    pub entity: String,
    pub operation: WriteOperation,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub success: usize,
    pub error: usize,
    pub unprocessed: usize,
    pub batch_count: usize,
    pub parallelism: usize,
}

impl RunSummary {
    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    pub fn success_rate(&self) -> f64 {
        percent(self.success, self.total)
    }

    pub fn error_rate(&self) -> f64 {
        percent(self.error, self.total)
    }

    pub fn is_parallel(&self) -> bool {
        self.parallelism > 1 && self.batch_count > 1
    }

    /// `total == success + error + unprocessed`.
    pub fn is_balanced(&self) -> bool {
        self.total == self.success + self.error + self.unprocessed
    }
}

/// Formats whole seconds as `H:MM:SS`.
pub fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
