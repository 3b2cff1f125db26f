use serde::Serialize;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum FindingKind {
    FieldMapping,
    FieldPermission,
    Throughput,
}

/// A pre-flight observation about a run's configuration or target schema.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Finding {
    pub code: String,
    pub message: String,
    pub severity: Severity,
    pub kind: FindingKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

const CODE_FIELD_NOT_FOUND: &str = "FIELD_NOT_FOUND";
const CODE_FIELD_READ_ONLY: &str = "FIELD_READ_ONLY";
const CODE_FIELD_NO_ACCESS: &str = "FIELD_NO_ACCESS";
const CODE_FIELD_COMPLEX: &str = "FIELD_COMPLEX_TYPE";
const CODE_RATE_LIMIT: &str = "RATE_LIMIT_RISK";

impl Finding {
    pub fn new(
        code: &str,
        message: String,
        severity: Severity,
        kind: FindingKind,
        suggestion: Option<String>,
    ) -> Self {
        Finding {
            code: code.to_string(),
            message,
            severity,
            kind,
            suggestion,
        }
    }

    pub fn field_not_found(column: &str, entity: &str) -> Self {
        Self::new(
            CODE_FIELD_NOT_FOUND,
            format!("Column `{column}` does not exist on `{entity}`"),
            Severity::Warning,
            FindingKind::FieldMapping,
            Some("Rename the column to a field API name or drop it.".into()),
        )
    }

    pub fn field_read_only(column: &str) -> Self {
        Self::new(
            CODE_FIELD_READ_ONLY,
            format!("Field `{column}` is calculated or auto-numbered and cannot be written"),
            Severity::Warning,
            FindingKind::FieldPermission,
            Some("Drop the column; the remote store computes its value.".into()),
        )
    }

    pub fn field_no_access(column: &str) -> Self {
        Self::new(
            CODE_FIELD_NO_ACCESS,
            format!("Field `{column}` is neither createable nor updateable for this user"),
            Severity::Warning,
            FindingKind::FieldPermission,
            Some("Grant field-level write access or drop the column.".into()),
        )
    }

    pub fn field_complex(column: &str, field_type: &str) -> Self {
        Self::new(
            CODE_FIELD_COMPLEX,
            format!("Field `{column}` has compound type `{field_type}`"),
            Severity::Error,
            FindingKind::FieldMapping,
            Some("Map the individual component fields instead.".into()),
        )
    }

    pub fn rate_limit(parallelism: usize) -> Self {
        Self::new(
            CODE_RATE_LIMIT,
            format!("{parallelism} parallel batches may hit API rate limits"),
            Severity::Warning,
            FindingKind::Throughput,
            Some("Lower parallelism to 10 or fewer.".into()),
        )
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}
