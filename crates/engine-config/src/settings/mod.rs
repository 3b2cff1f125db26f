use engine_core::layout::DEFAULT_OUTPUT_ROOT;
use model::execution::write::WriteOperation;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

pub mod batch_size;
pub mod error;
pub mod fields;
pub mod validated;
pub mod validator;

pub const DEFAULT_PARALLELISM: usize = 1;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
/// Above this many concurrent batches the remote API starts throttling.
pub const RATE_LIMIT_PARALLELISM: usize = 10;

/// Caller-supplied knobs for one synchronization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// `None` lets [`batch_size::BatchSizePolicy`] decide from the row count.
    pub batch_size: Option<usize>,
    pub parallelism: usize,
    pub operation: WriteOperation,
    /// Column matched against existing remote records on upsert.
    pub external_id_field: Option<String>,
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// Apply the tri-state boolean coercion to boolean-typed columns.
    pub coerce_booleans: bool,
    pub output_root: PathBuf,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            batch_size: None,
            parallelism: DEFAULT_PARALLELISM,
            operation: WriteOperation::Insert,
            external_id_field: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            coerce_booleans: true,
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
        }
    }
}

impl SyncSettings {
    pub fn from_json(raw: &str) -> Result<Self, error::SettingsError> {
        Ok(serde_json::from_str(raw)?)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
