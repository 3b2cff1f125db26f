use crate::report::finding::Finding;
use model::schema::describe::EntityDescribe;
use serde::Serialize;

/// Dataset columns sorted by whether the target schema accepts writes to them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldValidation {
    pub valid: Vec<String>,
    pub not_found: Vec<String>,
    pub read_only: Vec<String>,
    pub permission_issues: Vec<String>,
    /// `(column, type)` pairs for compound types that cannot be written directly.
    pub complex: Vec<(String, String)>,
}

impl FieldValidation {
    /// Classifies each column against `describe`, matching names case-insensitively.
    pub fn check<'a>(describe: &EntityDescribe, columns: impl IntoIterator<Item = &'a str>) -> Self {
        let mut out = FieldValidation::default();

        for column in columns {
            let Some(field) = describe.field_ignore_case(column) else {
                out.not_found.push(column.to_string());
                continue;
            };

            let computed = field.calculated || field.auto_number;
            if !field.createable && !field.updateable {
                if computed {
                    out.read_only.push(column.to_string());
                } else {
                    out.permission_issues.push(column.to_string());
                }
            } else if computed {
                out.read_only.push(column.to_string());
            } else if field.field_type.is_complex() {
                out.complex
                    .push((column.to_string(), field.field_type.as_str().to_string()));
            } else {
                out.valid.push(column.to_string());
            }
        }

        out
    }

    pub fn has_fatal(&self) -> bool {
        !self.complex.is_empty()
    }

    pub fn findings(&self, entity: &str) -> Vec<Finding> {
        let mut findings = Vec::new();
        findings.extend(self.not_found.iter().map(|c| Finding::field_not_found(c, entity)));
        findings.extend(self.read_only.iter().map(|c| Finding::field_read_only(c)));
        findings.extend(self.permission_issues.iter().map(|c| Finding::field_no_access(c)));
        findings.extend(self.complex.iter().map(|(c, t)| Finding::field_complex(c, t)));
        findings
    }
}
