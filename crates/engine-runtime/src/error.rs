use connectors::error::RemoteError;
use engine_config::{error::ReportError, settings::error::SettingsError};
use engine_processing::error::{LookupError, MappingError, PartitionError};
use thiserror::Error;

/// Top-level errors of a synchronization run.
///
/// Everything below batch level is absorbed into results; these are the
/// failures that stop a run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid settings or field configuration. Nothing was dispatched.
    #[error("Configuration error: {0}")]
    Config(#[from] SettingsError),

    /// The remote schema could not be read.
    #[error("Schema error: {0}")]
    Schema(#[from] RemoteError),

    /// The column mapping matched nothing usable in the input.
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// Cancellation was requested before any batch was dispatched.
    #[error("Run cancelled before dispatch")]
    Cancelled,

    #[error("Partition error: {0}")]
    Partition(#[from] PartitionError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// A worker task was aborted or panicked outside of batch processing.
    /// Reports for the batches that did finish are written before this is
    /// returned.
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl SyncError {
    /// True when the run stopped because someone asked it to.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            SyncError::Cancelled | SyncError::Lookup(LookupError::Cancelled { .. })
        )
    }
}
