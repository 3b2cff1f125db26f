use connectors::error::{FileError, RemoteError};
use engine_config::settings::error::SettingsError;
use engine_runtime::error::SyncError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credentials: {0}")]
    Credentials(String),

    #[error("Failed to read the input file: {0}")]
    Input(#[from] FileError),

    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Invalid lookup override '{0}', expected COLUMN=FIELD")]
    InvalidLookup(String),

    #[error("Invalid column mapping: {0}")]
    InvalidMapping(#[source] serde_json::Error),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Run failed: {0}")]
    Sync(#[from] SyncError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),
}

impl CliError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, CliError::Sync(e) if e.is_cancellation())
    }
}
