#![allow(dead_code)]

use connectors::file::csv::read_dataset;
use model::records::record::Dataset;
use std::path::Path;

pub fn load_csv(path: &Path) -> Dataset {
    read_dataset(path, "Artifact").unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

/// Number of data rows in a CSV artifact, header excluded.
pub fn file_row_count(path: &Path) -> usize {
    load_csv(path).len()
}

pub fn file_header(path: &Path) -> Vec<String> {
    load_csv(path).columns
}

/// Text of one cell of a CSV artifact.
pub fn cell(path: &Path, row: usize, column: &str) -> String {
    let data = load_csv(path);
    data.records
        .get(row)
        .unwrap_or_else(|| panic!("{} has no row {row}", path.display()))
        .get_value(column)
        .comparable_text()
}

pub fn assert_file_exists(path: &Path, exists: bool) {
    assert_eq!(
        path.exists(),
        exists,
        "expected {} to {}exist",
        path.display(),
        if exists { "" } else { "not " }
    );
}
