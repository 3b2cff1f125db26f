use crate::error::ContextError;
use std::{
    fmt,
    path::{Path, PathBuf},
};

pub const DEFAULT_OUTPUT_ROOT: &str = "DataLoader_Logs";

/// Which slice of a batch an artifact file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchArtifact {
    Source,
    Success,
    Error,
}

impl BatchArtifact {
    pub fn suffix(&self) -> &'static str {
        match self {
            BatchArtifact::Source => "source",
            BatchArtifact::Success => "success",
            BatchArtifact::Error => "error",
        }
    }
}

impl fmt::Display for BatchArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Deterministic artifact tree for one org and entity:
///
/// ```text
/// <output_root>/DataLoad/DataLoad_<org>/<entity>/
///     Batches/  Logs/  Summary/  TransformedData/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    root: PathBuf,
    entity: String,
}

impl ArtifactLayout {
    pub fn new(output_root: impl AsRef<Path>, org: &str, entity: &str) -> Self {
        let root = output_root
            .as_ref()
            .join("DataLoad")
            .join(format!("DataLoad_{}", path_safe(org)))
            .join(path_safe(entity));
        Self {
            root,
            entity: entity.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn batches_dir(&self) -> PathBuf {
        self.root.join("Batches")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("Logs")
    }

    pub fn summary_dir(&self) -> PathBuf {
        self.root.join("Summary")
    }

    pub fn transformed_dir(&self) -> PathBuf {
        self.root.join("TransformedData")
    }

    /// `Batches/<Entity>_Batch<N>_<kind>.csv`
    pub fn batch_file(&self, index: usize, kind: BatchArtifact) -> PathBuf {
        self.batches_dir().join(format!(
            "{}_Batch{index}_{kind}.csv",
            path_safe(&self.entity)
        ))
    }

    pub fn create_all(&self) -> Result<(), ContextError> {
        for dir in [
            self.batches_dir(),
            self.logs_dir(),
            self.summary_dir(),
            self.transformed_dir(),
        ] {
            std::fs::create_dir_all(&dir)
                .map_err(|source| ContextError::CreateDir { path: dir, source })?;
        }
        Ok(())
    }
}

fn path_safe(segment: &str) -> String {
    segment
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect()
}
