use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Failed to create artifact directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
