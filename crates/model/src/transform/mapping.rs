use serde::Deserialize;
use std::collections::BTreeMap;

/// Source column to target field renames read from a JSON object such as
/// `{"Account Name": "Name", "Phone Number": "Phone"}`.
///
/// Only columns named here survive a mapped run; everything else in the
/// input is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping {
    source_to_target: BTreeMap<String, String>,
}

impl ColumnMapping {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        ColumnMapping {
            source_to_target: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn target(&self, source: &str) -> Option<&str> {
        self.source_to_target.get(source).map(String::as_str)
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.source_to_target.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.source_to_target.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_reads_a_flat_object() {
        let mapping = ColumnMapping::from_json(r#"{"Account Name": "Name"}"#).unwrap();
        assert_eq!(mapping.target("Account Name"), Some("Name"));
        assert_eq!(mapping.target("Name"), None);
    }

    #[test]
    fn test_from_json_rejects_nested_values() {
        assert!(ColumnMapping::from_json(r#"{"A": {"to": "B"}}"#).is_err());
    }
}
