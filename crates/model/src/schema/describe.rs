use serde::{Deserialize, Serialize};
use std::fmt;

/// Field data types reported by the remote schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Id,
    String,
    TextArea,
    Boolean,
    Int,
    Double,
    Currency,
    Percent,
    Date,
    DateTime,
    Email,
    Phone,
    Url,
    Picklist,
    MultiPicklist,
    Reference,
    Address,
    Location,
    Other(String),
}

impl FieldType {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "id" => FieldType::Id,
            "string" => FieldType::String,
            "textarea" => FieldType::TextArea,
            "boolean" => FieldType::Boolean,
            "int" => FieldType::Int,
            "double" => FieldType::Double,
            "currency" => FieldType::Currency,
            "percent" => FieldType::Percent,
            "date" => FieldType::Date,
            "datetime" => FieldType::DateTime,
            "email" => FieldType::Email,
            "phone" => FieldType::Phone,
            "url" => FieldType::Url,
            "picklist" => FieldType::Picklist,
            "multipicklist" => FieldType::MultiPicklist,
            "reference" => FieldType::Reference,
            "address" => FieldType::Address,
            "location" => FieldType::Location,
            _ => FieldType::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Id => "id",
            FieldType::String => "string",
            FieldType::TextArea => "textarea",
            FieldType::Boolean => "boolean",
            FieldType::Int => "int",
            FieldType::Double => "double",
            FieldType::Currency => "currency",
            FieldType::Percent => "percent",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Url => "url",
            FieldType::Picklist => "picklist",
            FieldType::MultiPicklist => "multipicklist",
            FieldType::Reference => "reference",
            FieldType::Address => "address",
            FieldType::Location => "location",
            FieldType::Other(raw) => raw,
        }
    }

    /// Compound types that cannot be written as a single column.
    pub fn is_complex(&self) -> bool {
        matches!(self, FieldType::Address | FieldType::Location)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FieldType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(FieldType::parse(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PicklistValue {
    pub value: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Description of one field of a remote entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescribe {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub createable: bool,
    #[serde(default)]
    pub updateable: bool,
    #[serde(default)]
    pub calculated: bool,
    #[serde(default)]
    pub auto_number: bool,
    #[serde(default)]
    pub external_id: bool,
    #[serde(default)]
    pub reference_to: Vec<String>,
    #[serde(default)]
    pub picklist_values: Vec<PicklistValue>,
}

impl FieldDescribe {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        FieldDescribe {
            name: name.into(),
            field_type,
            label: None,
            unique: false,
            createable: true,
            updateable: true,
            calculated: false,
            auto_number: false,
            external_id: false,
            reference_to: Vec::new(),
            picklist_values: Vec::new(),
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn external_id(mut self) -> Self {
        self.external_id = true;
        self
    }

    pub fn references(mut self, entity: impl Into<String>) -> Self {
        self.reference_to.push(entity.into());
        self
    }

    pub fn with_picklist<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.picklist_values = values
            .into_iter()
            .map(|v| PicklistValue {
                value: v.into(),
                label: None,
                active: true,
            })
            .collect();
        self
    }

    pub fn read_only(mut self) -> Self {
        self.createable = false;
        self.updateable = false;
        self
    }

    pub fn is_picklist(&self) -> bool {
        self.field_type == FieldType::Picklist
    }

    pub fn active_picklist_values(&self) -> Vec<&str> {
        self.picklist_values
            .iter()
            .filter(|p| p.active)
            .map(|p| p.value.as_str())
            .collect()
    }
}

/// Description of a remote entity type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityDescribe {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDescribe>,
}

impl EntityDescribe {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescribe>) -> Self {
        EntityDescribe {
            name: name.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescribe> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Case-insensitive lookup, matching how the remote API treats field names.
    pub fn field_ignore_case(&self, name: &str) -> Option<&FieldDescribe> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn boolean_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.field_type == FieldType::Boolean)
            .map(|f| f.name.as_str())
            .collect()
    }

    pub fn unique_fields(&self) -> Vec<&FieldDescribe> {
        self.fields.iter().filter(|f| f.unique).collect()
    }

    pub fn picklist_fields(&self) -> Vec<&FieldDescribe> {
        self.fields.iter().filter(|f| f.is_picklist()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_remote_describe() {
        let json = serde_json::json!({
            "name": "Contact",
            "fields": [
                {"name": "AccountId", "type": "reference", "referenceTo": ["Account"],
                 "createable": true, "updateable": true},
                {"name": "LeadSource", "type": "picklist",
                 "picklistValues": [{"value": "Web", "active": true}, {"value": "Old", "active": false}]},
                {"name": "MailingAddress", "type": "address"},
                {"name": "Geo__c", "type": "geolocation"}
            ]
        });

        let describe: EntityDescribe = serde_json::from_value(json).unwrap();
        let account = describe.field("AccountId").unwrap();
        assert_eq!(account.field_type, FieldType::Reference);
        assert_eq!(account.reference_to, vec!["Account"]);

        let source = describe.field_ignore_case("leadsource").unwrap();
        assert_eq!(source.active_picklist_values(), vec!["Web"]);

        assert!(describe.field("MailingAddress").unwrap().field_type.is_complex());
        assert_eq!(
            describe.field("Geo__c").unwrap().field_type,
            FieldType::Other("geolocation".into())
        );
    }
}
