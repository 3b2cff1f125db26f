use connectors::error::RemoteError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Lookup resolution cancelled at review of field '{field}'")]
    Cancelled { field: String },

    #[error("Lookup column '{0}' is not in the dataset")]
    MissingColumn(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MappingError {
    #[error("None of the columns in the mapping match the columns in the data")]
    NoMatchingColumns,

    #[error("More than one column is mapped to field '{0}'")]
    DuplicateTarget(String),
}

/// Failures that take down a whole batch. Per-record rejections are not
/// errors; they come back inside the positional response.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Bulk write did not complete within {0:?}")]
    Timeout(Duration),

    #[error("Bulk write returned {actual} results for {expected} records")]
    ResponseMismatch { expected: usize, actual: usize },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PartitionError {
    #[error("Batch size must be at least 1")]
    ZeroBatchSize,
}
