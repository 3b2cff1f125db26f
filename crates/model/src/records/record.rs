use crate::core::value::Value;

/// A named cell inside a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    pub name: String,
    pub value: Value,
}

impl FieldValue {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An ordered mapping of column name to value.
///
/// A record has no identity of its own; it is addressed by its position in
/// the [`Dataset`] it belongs to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub fields: Vec<FieldValue>,
}

impl Record {
    pub fn new(fields: Vec<FieldValue>) -> Self {
        Record { fields }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Record {
            fields: pairs
                .into_iter()
                .map(|(k, v)| FieldValue::new(k, v))
                .collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|f| f.name == field)
            .map(|f| &f.value)
    }

    pub fn get_value(&self, field: &str) -> Value {
        self.get(field).cloned().unwrap_or(Value::Null)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|f| f.name == field)
            .map(|f| &mut f.value)
    }

    /// Replaces the value of an existing column or appends a new one.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.get_mut(field) {
            Some(slot) => *slot = value,
            None => self.fields.push(FieldValue::new(field, value)),
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        let pos = self.fields.iter().position(|f| f.name == field)?;
        Some(self.fields.remove(pos).value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// JSON object sent to the remote store for this record.
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.value.to_json()))
            .collect()
    }
}

/// An ordered sequence of records sharing one column set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub entity: String,
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn new(entity: impl Into<String>, columns: Vec<String>) -> Self {
        Dataset {
            entity: entity.into(),
            columns,
            records: Vec::new(),
        }
    }

    /// Builds a dataset from records, taking the column order of the first
    /// record and appending columns first seen in later records.
    pub fn from_records(entity: impl Into<String>, records: Vec<Record>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for name in record.names() {
                if !columns.iter().any(|c| c == name) {
                    columns.push(name.to_string());
                }
            }
        }

        let mut dataset = Dataset {
            entity: entity.into(),
            columns,
            records,
        };
        dataset.align();
        dataset
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn push(&mut self, mut record: Record) {
        for name in &self.columns {
            if record.get(name).is_none() {
                record.set(name, Value::Null);
            }
        }
        for name in record.names() {
            if !self.columns.iter().any(|c| c == name) {
                self.columns.push(name.to_string());
            }
        }
        self.records.push(record);
        self.align();
    }

    /// Renames every column through `rename` in one pass, keeping positions.
    pub fn rename_columns(&mut self, rename: impl Fn(&str) -> String) {
        for column in &mut self.columns {
            *column = rename(column);
        }
        for record in &mut self.records {
            for field in &mut record.fields {
                field.name = rename(&field.name);
            }
        }
    }

    pub fn remove_column(&mut self, name: &str) {
        self.columns.retain(|c| c != name);
        for record in &mut self.records {
            record.remove(name);
        }
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, name: &str) -> Vec<Value> {
        self.records.iter().map(|r| r.get_value(name)).collect()
    }

    /// Reorders every record's fields to match `columns`, filling gaps with null.
    fn align(&mut self) {
        let columns = &self.columns;
        for record in &mut self.records {
            let aligned = columns
                .iter()
                .map(|c| FieldValue::new(c.clone(), record.get_value(c)))
                .collect();
            record.fields = aligned;
        }
    }
}
