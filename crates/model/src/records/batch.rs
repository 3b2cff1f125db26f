use crate::records::record::Record;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// One contiguous slice of a dataset, dispatched as a single write unit.
///
/// The records are an owned copy, so a worker never aliases rows held by the
/// orchestrator.
#[derive(Debug, Clone)]
pub struct BatchJob {
    /// 1-based position of the batch within its run.
    pub index: usize,
    /// Row index of the first record in the source dataset.
    pub offset: usize,
    pub columns: Vec<String>,
    pub records: Vec<Record>,
    pub created_at: DateTime<Utc>,
}

impl BatchJob {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchStatus {
    Success,
    Partial,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Success => "SUCCESS",
            BatchStatus::Partial => "PARTIAL",
            BatchStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of writing one [`BatchJob`].
///
/// Every record of the job lands in exactly one of `success_rows` or
/// `error_rows`. Error rows carry an appended `errors` column.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub batch_index: usize,
    pub total_records: usize,
    pub success_rows: Vec<Record>,
    pub error_rows: Vec<Record>,
    pub duration_secs: f64,
    /// Set when the whole batch failed before a per-record response existed.
    pub error_detail: Option<String>,
}

impl BatchResult {
    /// A batch that failed as a unit: every record becomes an error row.
    pub fn failed(job: &BatchJob, detail: impl Into<String>, duration_secs: f64) -> Self {
        let detail = detail.into();
        let message = format!("Batch processing failed: {detail}");
        let error_rows = job
            .records
            .iter()
            .cloned()
            .map(|mut r| {
                r.set(ERRORS_COLUMN, message.clone());
                r
            })
            .collect();

        BatchResult {
            batch_index: job.index,
            total_records: job.len(),
            success_rows: Vec::new(),
            error_rows,
            duration_secs,
            error_detail: Some(detail),
        }
    }

    pub fn success_count(&self) -> usize {
        self.success_rows.len()
    }

    pub fn error_count(&self) -> usize {
        self.error_rows.len()
    }

    /// `success + error == total`, the accounting every completed batch must hold.
    pub fn is_balanced(&self) -> bool {
        self.success_count() + self.error_count() == self.total_records
    }

    pub fn status(&self) -> BatchStatus {
        if self.error_count() == 0 {
            BatchStatus::Success
        } else if self.success_count() > 0 {
            BatchStatus::Partial
        } else {
            BatchStatus::Failed
        }
    }

    pub fn success_rate(&self) -> f64 {
        percent(self.success_count(), self.total_records)
    }

    pub fn error_rate(&self) -> f64 {
        percent(self.error_count(), self.total_records)
    }
}

/// Column appended to rows the remote store rejected.
pub const ERRORS_COLUMN: &str = "errors";

pub fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::Value;

    fn job(n: i64) -> BatchJob {
        BatchJob {
            index: 3,
            offset: 0,
            columns: vec!["Name".into()],
            records: (0..n)
                .map(|i| Record::from_pairs([("Name", Value::Int(i))]))
                .collect(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_failed_batch_covers_every_record() {
        let result = BatchResult::failed(&job(4), "connection reset", 0.5);
        assert_eq!(result.batch_index, 3);
        assert_eq!(result.error_count(), 4);
        assert_eq!(result.success_count(), 0);
        assert!(result.is_balanced());
        assert_eq!(result.status(), BatchStatus::Failed);
        assert_eq!(
            result.error_rows[0].get_value(ERRORS_COLUMN),
            Value::from("Batch processing failed: connection reset")
        );
    }

    #[test]
    fn test_status_partial() {
        let mut result = BatchResult::failed(&job(2), "x", 0.0);
        let row = result.error_rows.pop().unwrap();
        result.success_rows.push(row);
        assert_eq!(result.status(), BatchStatus::Partial);
        assert_eq!(result.success_rate(), 50.0);
    }

    #[test]
    fn test_percent_of_empty_is_zero() {
        assert_eq!(percent(0, 0), 0.0);
    }
}
