use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}
