//! Applies a [`ColumnMapping`] to an input dataset before anything else sees it.

use crate::error::MappingError;
use model::{records::record::Dataset, transform::mapping::ColumnMapping};
use std::collections::HashSet;
use tracing::{info, warn};

/// Keeps the mapped columns present in `dataset`, renamed to their targets,
/// in the dataset's column order. Mapping entries naming columns the data
/// does not have are logged and skipped.
pub fn apply_mapping(dataset: &Dataset, mapping: &ColumnMapping) -> Result<Dataset, MappingError> {
    let ignored = ignored_entries(dataset, mapping);
    if !ignored.is_empty() {
        warn!(entity = %dataset.entity, columns = ?ignored, "Mapping entries not found in the data were ignored");
    }

    let kept: Vec<(&str, &str)> = dataset
        .columns
        .iter()
        .filter_map(|c| mapping.target(c).map(|t| (c.as_str(), t)))
        .collect();
    if kept.is_empty() {
        return Err(MappingError::NoMatchingColumns);
    }

    let mut seen = HashSet::new();
    for (_, target) in &kept {
        if !seen.insert(*target) {
            return Err(MappingError::DuplicateTarget(target.to_string()));
        }
    }

    let mut mapped = dataset.clone();
    let dropped: Vec<String> = dataset
        .columns
        .iter()
        .filter(|c| mapping.target(c).is_none())
        .cloned()
        .collect();
    for column in &dropped {
        mapped.remove_column(column);
    }
    mapped.rename_columns(|c| mapping.target(c).unwrap_or(c).to_string());

    info!(entity = %dataset.entity, kept = kept.len(), dropped = dropped.len(), "Column mapping applied");
    Ok(mapped)
}

/// Mapping sources that are not columns of `dataset`, in mapping order.
pub fn ignored_entries(dataset: &Dataset, mapping: &ColumnMapping) -> Vec<String> {
    mapping
        .sources()
        .filter(|s| !dataset.has_column(s))
        .map(str::to_string)
        .collect()
}
