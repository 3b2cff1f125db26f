use crate::{
    error::ReportError,
    report::summary::{BatchDetailRow, ProcessingSummaryRow},
};
use engine_core::layout::{ArtifactLayout, BatchArtifact};
use model::{
    execution::outcome::{ClassificationRecord, RunSummary},
    records::{
        batch::{BatchJob, BatchResult, ERRORS_COLUMN},
        record::{Dataset, Record},
    },
};
use serde::Serialize;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

pub const TRANSFORM_STATUS_COLUMN: &str = "Transform_Status";
pub const TRANSFORM_REASON_COLUMN: &str = "Transform_Reason";

/// Files written by [`AuditWriter::write_transform_outputs`].
#[derive(Debug, Clone)]
pub struct TransformOutputs {
    pub success_file: PathBuf,
    pub failure_file: PathBuf,
    pub transformed_file: PathBuf,
    pub success_rows: usize,
    pub failure_rows: usize,
}

/// Persists every artifact of a run under its [`ArtifactLayout`].
///
/// Each method writes whole files, so a run that stops halfway still leaves
/// complete files for the steps that finished.
#[derive(Debug, Clone)]
pub struct AuditWriter {
    layout: ArtifactLayout,
}

impl AuditWriter {
    pub fn new(layout: ArtifactLayout) -> Result<Self, ReportError> {
        layout.create_all()?;
        Ok(Self { layout })
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// `Batches/<Entity>_Batch<N>_{source,success,error}.csv`. Empty success
    /// or error slices produce no file.
    pub fn write_batch(&self, job: &BatchJob, result: &BatchResult) -> Result<(), ReportError> {
        write_records(
            &self.layout.batch_file(job.index, BatchArtifact::Source),
            &job.columns,
            &job.records,
        )?;

        if !result.success_rows.is_empty() {
            write_records(
                &self.layout.batch_file(job.index, BatchArtifact::Success),
                &job.columns,
                &result.success_rows,
            )?;
        }

        if !result.error_rows.is_empty() {
            write_records(
                &self.layout.batch_file(job.index, BatchArtifact::Error),
                &with_errors_column(&job.columns),
                &result.error_rows,
            )?;
        }

        debug!(
            batch = job.index,
            success = result.success_count(),
            errors = result.error_count(),
            "Batch artifacts written"
        );
        Ok(())
    }

    /// `Logs/processing_summary.csv` and `Logs/batch_processing_details.csv`.
    pub fn write_processing_log(
        &self,
        summary: &RunSummary,
        results: &[BatchResult],
    ) -> Result<(PathBuf, PathBuf), ReportError> {
        let summary_path = self.layout.logs_dir().join("processing_summary.csv");
        write_rows(&summary_path, [ProcessingSummaryRow::from_summary(summary)])?;

        let details_path = self.layout.logs_dir().join("batch_processing_details.csv");
        if results.is_empty() {
            write_header(&details_path, BATCH_DETAIL_HEADER)?;
        } else {
            write_rows(&details_path, results.iter().map(BatchDetailRow::from))?;
        }

        info!(
            summary = %summary_path.display(),
            details = %details_path.display(),
            "Processing logs written"
        );
        Ok((summary_path, details_path))
    }

    /// Cross-batch views under `Summary/`.
    ///
    /// `success.csv` and `error.csv` are always written, header-only when
    /// there are no rows.
    pub fn write_consolidated(
        &self,
        raw: &Dataset,
        transformed: &Dataset,
        results: &[BatchResult],
    ) -> Result<(), ReportError> {
        let dir = self.layout.summary_dir();
        write_dataset(&dir.join("raw.csv"), raw)?;
        write_dataset(&dir.join("transformed_file.csv"), transformed)?;
        write_dataset(&dir.join("source.csv"), transformed)?;

        let success: Vec<Record> = results
            .iter()
            .flat_map(|r| r.success_rows.iter().cloned())
            .collect();
        let errors: Vec<Record> = results
            .iter()
            .flat_map(|r| r.error_rows.iter().cloned())
            .collect();

        write_records(&dir.join("success.csv"), &transformed.columns, &success)?;
        write_records(
            &dir.join("error.csv"),
            &with_errors_column(&transformed.columns),
            &errors,
        )?;

        info!(
            dir = %dir.display(),
            success = success.len(),
            errors = errors.len(),
            "Summary files written"
        );
        Ok(())
    }

    /// `TransformedData/transform_success.csv`, `transform_failure.csv` and
    /// `Transformed_Data.csv`.
    pub fn write_transform_outputs(
        &self,
        transformed: &Dataset,
        classification: &[ClassificationRecord],
    ) -> Result<TransformOutputs, ReportError> {
        let dir = self.layout.transformed_dir();
        let verdicts: HashMap<usize, &ClassificationRecord> =
            classification.iter().map(|c| (c.row_index, c)).collect();

        let mut columns = transformed.columns.clone();
        columns.push(TRANSFORM_STATUS_COLUMN.to_string());
        columns.push(TRANSFORM_REASON_COLUMN.to_string());

        let mut success = Vec::new();
        let mut failure = Vec::new();
        for (index, record) in transformed.records.iter().enumerate() {
            let Some(verdict) = verdicts.get(&index) else {
                continue;
            };
            let mut row = record.clone();
            row.set(TRANSFORM_STATUS_COLUMN, verdict.status.as_str());
            row.set(TRANSFORM_REASON_COLUMN, verdict.reason_text());
            if verdict.is_failure() {
                failure.push(row);
            } else {
                success.push(row);
            }
        }

        let outputs = TransformOutputs {
            success_file: dir.join("transform_success.csv"),
            failure_file: dir.join("transform_failure.csv"),
            transformed_file: dir.join("Transformed_Data.csv"),
            success_rows: success.len(),
            failure_rows: failure.len(),
        };
        write_records(&outputs.success_file, &columns, &success)?;
        write_records(&outputs.failure_file, &columns, &failure)?;
        write_dataset(&outputs.transformed_file, transformed)?;

        info!(
            dir = %dir.display(),
            success = outputs.success_rows,
            failure = outputs.failure_rows,
            "Transform outputs written"
        );
        Ok(outputs)
    }

    /// `Logs/run_summary.json`, the serialized report beside the CSV logs.
    pub fn write_run_summary<T: Serialize>(&self, report: &T) -> Result<PathBuf, ReportError> {
        let path = self.layout.logs_dir().join("run_summary.json");
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, json).map_err(|source| ReportError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

const BATCH_DETAIL_HEADER: &[&str] = &[
    "Batch_Number",
    "Batch_Records",
    "Batch_Success",
    "Batch_Errors",
    "Batch_Processing_Time_Seconds",
    "Batch_Success_Rate_Percent",
    "Batch_Error_Rate_Percent",
    "Batch_Status",
    "Error_Details",
];

fn with_errors_column(columns: &[String]) -> Vec<String> {
    let mut out = columns.to_vec();
    if !out.iter().any(|c| c == ERRORS_COLUMN) {
        out.push(ERRORS_COLUMN.to_string());
    }
    out
}

fn csv_error(path: &Path) -> impl FnOnce(csv::Error) -> ReportError + '_ {
    move |source| ReportError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ReportError + '_ {
    move |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub fn write_dataset(path: &Path, dataset: &Dataset) -> Result<(), ReportError> {
    write_records(path, &dataset.columns, &dataset.records)
}

/// Writes `records` projected onto `columns`; missing cells are empty.
pub fn write_records(path: &Path, columns: &[String], records: &[Record]) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_error(path))?;
    writer.write_record(columns).map_err(csv_error(path))?;

    for record in records {
        let row = columns
            .iter()
            .map(|c| record.get(c).and_then(|v| v.as_text()).unwrap_or_default());
        writer.write_record(row).map_err(csv_error(path))?;
    }

    writer.flush().map_err(io_error(path))
}

fn write_header(path: &Path, header: &[&str]) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_error(path))?;
    writer.write_record(header).map_err(csv_error(path))?;
    writer.flush().map_err(io_error(path))
}

fn write_rows<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_error(path))?;
    for row in rows {
        writer.serialize(row).map_err(csv_error(path))?;
    }
    writer.flush().map_err(io_error(path))
}
