use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Bulk write flavour requested for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WriteOperation {
    #[default]
    Insert,
    Upsert,
}

impl WriteOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteOperation::Insert => "insert",
            WriteOperation::Upsert => "upsert",
        }
    }
}

impl fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WriteOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insert" => Ok(WriteOperation::Insert),
            "upsert" => Ok(WriteOperation::Upsert),
            other => Err(format!("unknown write operation '{other}'")),
        }
    }
}

/// A structured rejection attached to one record of a bulk response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordError {
    #[serde(default)]
    pub status_code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status_code, self.message)?;
        if !self.fields.is_empty() {
            write!(f, " [{}]", self.fields.join(", "))?;
        }
        Ok(())
    }
}

/// Per-record entry of a positional bulk write response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOutcome {
    #[serde(default)]
    pub id: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub created: Option<bool>,
    #[serde(default)]
    pub errors: Vec<RecordError>,
}

impl WriteOutcome {
    pub fn ok(id: impl Into<String>) -> Self {
        WriteOutcome {
            id: Some(id.into()),
            success: true,
            created: Some(true),
            errors: Vec::new(),
        }
    }

    pub fn rejected(errors: Vec<RecordError>) -> Self {
        WriteOutcome {
            id: None,
            success: false,
            created: None,
            errors,
        }
    }

    /// All errors folded into the single `errors` column of an error row.
    pub fn error_text(&self) -> String {
        self.errors
            .iter()
            .map(RecordError::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Rows returned by a point query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub total_size: usize,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub records: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl QueryResult {
    /// `Id` of the first returned row, if any.
    pub fn first_id(&self) -> Option<String> {
        self.records
            .first()
            .and_then(|r| r.get("Id"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_text_concatenates_structured_errors() {
        let outcome = WriteOutcome::rejected(vec![
            RecordError {
                status_code: "REQUIRED_FIELD_MISSING".into(),
                message: "Required fields are missing".into(),
                fields: vec!["LastName".into()],
            },
            RecordError {
                status_code: "INVALID_EMAIL_ADDRESS".into(),
                message: "Email: invalid".into(),
                fields: vec![],
            },
        ]);
        assert_eq!(
            outcome.error_text(),
            "REQUIRED_FIELD_MISSING: Required fields are missing [LastName]; INVALID_EMAIL_ADDRESS: Email: invalid"
        );
    }

    #[test]
    fn test_parse_operation() {
        assert_eq!("Upsert".parse::<WriteOperation>(), Ok(WriteOperation::Upsert));
        assert!("delete".parse::<WriteOperation>().is_err());
    }

    #[test]
    fn test_query_first_id() {
        let result: QueryResult = serde_json::from_value(serde_json::json!({
            "totalSize": 1, "done": true,
            "records": [{"attributes": {"type": "Account"}, "Id": "001000000000001AAA"}]
        }))
        .unwrap();
        assert_eq!(result.first_id().as_deref(), Some("001000000000001AAA"));
    }
}
