use crate::{report::finding::Finding, settings::fields::FieldValidation};
use model::execution::write::WriteOperation;
use std::time::Duration;

/// Immutable configuration a run executes with, produced by
/// [`super::validator::SettingsValidator`].
#[derive(Debug, Clone)]
pub struct ValidatedSettings {
    /// Rows per batch, always at least 1.
    pub batch_size: usize,
    /// Concurrent batches; 1 means sequential.
    pub parallelism: usize,
    pub operation: WriteOperation,
    /// Present exactly when `operation` is upsert.
    pub external_id_field: Option<String>,
    pub request_timeout: Duration,
    pub coerce_booleans: bool,
    pub fields: FieldValidation,
    /// Non-fatal observations gathered while validating.
    pub findings: Vec<Finding>,
}

impl ValidatedSettings {
    pub fn is_parallel(&self) -> bool {
        self.parallelism > 1
    }

    /// Number of batches `rows` records will be split into.
    pub fn batch_count(&self, rows: usize) -> usize {
        rows.div_ceil(self.batch_size)
    }
}
