use crate::{records::record::Dataset, schema::describe::EntityDescribe};
use serde::Serialize;
use std::collections::HashMap;

pub const DEFAULT_MATCH_FIELD: &str = "Name";

/// A dataset column holding a reference into another remote entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupField {
    pub column_name: String,
    pub related_entity: String,
    pub match_field: String,
}

impl LookupField {
    pub fn new(
        column_name: impl Into<String>,
        related_entity: impl Into<String>,
        match_field: impl Into<String>,
    ) -> Self {
        LookupField {
            column_name: column_name.into(),
            related_entity: related_entity.into(),
            match_field: match_field.into(),
        }
    }

    /// One lookup per reference-typed field that is present in the dataset.
    ///
    /// Polymorphic references resolve against their first target. A field
    /// with no target is skipped. `overrides` maps a column to the match
    /// field to start with instead of [`DEFAULT_MATCH_FIELD`].
    pub fn discover(
        describe: &EntityDescribe,
        dataset: &Dataset,
        overrides: &HashMap<String, String>,
    ) -> Vec<LookupField> {
        describe
            .fields
            .iter()
            .filter(|f| f.field_type == crate::schema::describe::FieldType::Reference)
            .filter(|f| dataset.has_column(&f.name))
            .filter_map(|f| {
                let related = f.reference_to.first()?;
                let match_field = overrides
                    .get(&f.name)
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_MATCH_FIELD.to_string());
                Some(LookupField::new(f.name.clone(), related.clone(), match_field))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::value::Value,
        records::record::Record,
        schema::describe::{FieldDescribe, FieldType},
    };

    #[test]
    fn test_discover_only_present_reference_columns() {
        let describe = EntityDescribe::new(
            "Contact",
            vec![
                FieldDescribe::new("AccountId", FieldType::Reference).references("Account"),
                FieldDescribe::new("OwnerId", FieldType::Reference).references("User"),
                FieldDescribe::new("Orphan__c", FieldType::Reference),
                FieldDescribe::new("LastName", FieldType::String),
            ],
        );
        let dataset = Dataset::from_records(
            "Contact",
            vec![Record::from_pairs([
                ("AccountId", Value::from("Acme")),
                ("Orphan__c", Value::from("x")),
                ("LastName", Value::from("Doe")),
            ])],
        );

        let mut overrides = HashMap::new();
        overrides.insert("AccountId".to_string(), "AccountNumber".to_string());

        let lookups = LookupField::discover(&describe, &dataset, &overrides);
        assert_eq!(
            lookups,
            vec![LookupField::new("AccountId", "Account", "AccountNumber")]
        );
    }
}
