use model::{
    execution::outcome::{ClassificationRecord, ClassificationStatus},
    records::record::{Dataset, Record},
    schema::describe::EntityDescribe,
    transform::lookup::LookupField,
};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Post-hoc data-quality verdict over the original and transformed snapshots.
///
/// Rows are paired by position. Every check runs for every row and all
/// failing reasons are kept, so one pass over the output is enough to
/// audit a transform.
pub struct TransformClassifier<'a> {
    describe: &'a EntityDescribe,
    lookups: &'a [LookupField],
}

impl<'a> TransformClassifier<'a> {
    pub fn new(describe: &'a EntityDescribe, lookups: &'a [LookupField]) -> Self {
        Self { describe, lookups }
    }

    pub fn classify(&self, original: &Dataset, transformed: &Dataset) -> Vec<ClassificationRecord> {
        let lookup_columns: Vec<&str> = self
            .lookups
            .iter()
            .map(|l| l.column_name.as_str())
            .filter(|c| original.has_column(c) && transformed.has_column(c))
            .collect();

        let picklists = self.picklist_columns(transformed);
        let duplicates = self.duplicate_index(transformed);

        let records: Vec<ClassificationRecord> = transformed
            .records
            .iter()
            .enumerate()
            .map(|(row, record)| {
                let mut reasons = Vec::new();

                if let Some(source) = original.records.get(row) {
                    check_lookups(&lookup_columns, source, record, &mut reasons);
                }
                check_picklists(&picklists, record, &mut reasons);
                check_unique(&duplicates, row, record, &mut reasons);

                let status = if reasons.is_empty() {
                    ClassificationStatus::Success
                } else {
                    ClassificationStatus::Failure
                };
                ClassificationRecord {
                    row_index: row,
                    status,
                    reasons,
                }
            })
            .collect();

        let failed = records.iter().filter(|r| r.is_failure()).count();
        info!(
            entity = %transformed.entity,
            rows = records.len(),
            failed,
            "Classified transformed records"
        );
        records
    }

    /// Picklist columns of the dataset with their active values.
    ///
    /// A picklist without any active value carries no constraint and is skipped.
    fn picklist_columns(&self, dataset: &Dataset) -> Vec<(String, HashSet<String>)> {
        dataset
            .columns
            .iter()
            .filter_map(|column| {
                let field = self.describe.field(column)?;
                if !field.is_picklist() {
                    return None;
                }
                let active: HashSet<String> = field
                    .active_picklist_values()
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                if active.is_empty() {
                    debug!(field = %column, "Picklist has no active values, skipping");
                    return None;
                }
                Some((column.clone(), active))
            })
            .collect()
    }

    /// For each unique column present in the dataset, the rows sharing each
    /// non-empty value. Only values held by two or more rows are kept.
    fn duplicate_index(&self, dataset: &Dataset) -> Vec<UniqueColumn> {
        self.describe
            .unique_fields()
            .into_iter()
            .filter(|f| dataset.has_column(&f.name))
            .map(|field| {
                let mut rows: BTreeMap<String, Vec<usize>> = BTreeMap::new();
                for (idx, record) in dataset.records.iter().enumerate() {
                    let text = record.get_value(&field.name).comparable_text();
                    if !text.is_empty() {
                        rows.entry(text).or_default().push(idx);
                    }
                }
                rows.retain(|_, indices| indices.len() > 1);
                UniqueColumn {
                    name: field.name.clone(),
                    rows,
                }
            })
            .collect()
    }
}

struct UniqueColumn {
    name: String,
    rows: BTreeMap<String, Vec<usize>>,
}

/// Convenience wrapper over [`TransformClassifier`].
pub fn classify(
    original: &Dataset,
    transformed: &Dataset,
    lookups: &[LookupField],
    describe: &EntityDescribe,
) -> Vec<ClassificationRecord> {
    TransformClassifier::new(describe, lookups).classify(original, transformed)
}

fn check_lookups(columns: &[&str], source: &Record, record: &Record, reasons: &mut Vec<String>) {
    for column in columns {
        let before = source.get_value(column).comparable_text();
        let after = record.get_value(column).comparable_text();
        if !after.is_empty() && before == after {
            reasons.push(format!("unchanged lookup field {column}"));
        }
    }
}

fn check_picklists(
    picklists: &[(String, HashSet<String>)],
    record: &Record,
    reasons: &mut Vec<String>,
) {
    for (column, active) in picklists {
        let value = record.get_value(column).comparable_text();
        if !value.is_empty() && !active.contains(&value) {
            reasons.push(format!("invalid picklist value {column}={value}"));
        }
    }
}

fn check_unique(columns: &[UniqueColumn], row: usize, record: &Record, reasons: &mut Vec<String>) {
    for column in columns {
        let value = record.get_value(&column.name).comparable_text();
        let Some(indices) = column.rows.get(&value) else {
            continue;
        };
        let others: Vec<String> = indices
            .iter()
            .filter(|&&i| i != row)
            .map(|i| i.to_string())
            .collect();
        reasons.push(format!(
            "duplicate unique field {}={} (rows {})",
            column.name,
            value,
            others.join(",")
        ));
    }
}
