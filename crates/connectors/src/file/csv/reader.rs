use crate::error::FileError;
use csv::{ReaderBuilder, Trim};
use model::{
    core::value::Value,
    records::record::{Dataset, FieldValue, Record},
};
use std::{path::Path, time::Instant};
use tracing::{info, warn};

/// Reads a header-first CSV file into a [`Dataset`] for `entity`.
///
/// Short rows are padded with empty strings; extra cells are dropped.
pub fn read_dataset(path: impl AsRef<Path>, entity: &str) -> Result<Dataset, FileError> {
    let path = path.as_ref();
    let start = Instant::now();

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::Headers)
        .from_path(path)
        .map_err(|source| FileError::Open {
            path: path.display().to_string(),
            source,
        })?;

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(FileError::MissingHeaders(path.display().to_string()));
    }

    let mut dataset = Dataset::new(entity, headers.clone());
    let mut ragged = 0usize;
    for row in reader.records() {
        let row = row?;
        if row.len() != headers.len() {
            ragged += 1;
        }

        let fields = headers
            .iter()
            .enumerate()
            .map(|(i, name)| FieldValue::new(name.as_str(), parse_cell(row.get(i).unwrap_or(""))))
            .collect();
        dataset.push(Record::new(fields));
    }

    if ragged > 0 {
        warn!(file = %path.display(), rows = ragged, "Rows with mismatched column count were aligned to the header");
    }

    info!(
        file = %path.display(),
        entity,
        rows = dataset.len(),
        columns = dataset.columns.len(),
        duration_ms = start.elapsed().as_millis(),
        "Loaded CSV dataset"
    );
    Ok(dataset)
}

/// Infers a typed value from a raw CSV cell.
pub fn parse_cell(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    // Only plain decimal notation counts as a number; "nan" or "inf" stay text.
    if raw.chars().any(|c| c.is_ascii_digit())
        && let Ok(f) = raw.parse::<f64>()
        && f.is_finite()
    {
        return Value::Float(f);
    }
    match raw {
        "true" | "TRUE" | "True" => Value::Boolean(true),
        "false" | "FALSE" | "False" => Value::Boolean(false),
        _ => Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_cell_types() {
        assert_eq!(parse_cell("42"), Value::Int(42));
        assert_eq!(parse_cell("4.5"), Value::Float(4.5));
        assert_eq!(parse_cell("true"), Value::Boolean(true));
        assert_eq!(parse_cell("nan"), Value::String("nan".into()));
        assert_eq!(parse_cell(""), Value::String(String::new()));
        assert_eq!(parse_cell("Acme"), Value::String("Acme".into()));
    }

    #[test]
    fn test_read_dataset_aligns_short_rows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, " Name ,Amount,Active").unwrap();
        writeln!(file, "Acme,10,true").unwrap();
        writeln!(file, "Globex").unwrap();

        let dataset = read_dataset(file.path(), "Account").unwrap();
        assert_eq!(dataset.columns, vec!["Name", "Amount", "Active"]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.records[0].get_value("Amount"), Value::Int(10));
        assert_eq!(
            dataset.records[1].get_value("Active"),
            Value::String(String::new())
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(matches!(
            read_dataset("/definitely/not/here.csv", "Account"),
            Err(FileError::Open { .. })
        ));
    }
}
