use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote store could not be reached or the connection dropped.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Credentials were missing, expired or rejected.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A call did not complete within the configured timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The remote store refused the payload as a whole.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Any other non-success HTTP status.
    #[error("Request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// A query could not be executed.
    #[error("Query failed: {0}")]
    Query(String),

    /// The response did not have the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The entity type is not known to the remote store.
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl RemoteError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Connectivity(_) | RemoteError::Timeout(_))
            || matches!(self, RemoteError::Rejected { status, .. } if *status >= 500)
    }
}

#[derive(Debug, Error)]
pub enum FileError {
    #[error("Failed to open file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Error reading CSV record: {0}")]
    ReadError(#[from] csv::Error),

    #[error("File has no header row: {0}")]
    MissingHeaders(String),
}
