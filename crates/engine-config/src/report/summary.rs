use model::{
    execution::outcome::{RunSummary, format_duration},
    records::batch::BatchResult,
};
use serde::Serialize;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row of `Logs/processing_summary.csv`.
#[derive(Debug, Serialize)]
pub struct ProcessingSummaryRow {
    #[serde(rename = "Start_Time")]
    pub start_time: String,
    #[serde(rename = "End_Time")]
    pub end_time: String,
    #[serde(rename = "Processing_Duration_Seconds")]
    pub processing_duration_seconds: String,
    #[serde(rename = "Processing_Duration_Formatted")]
    pub processing_duration_formatted: String,
    #[serde(rename = "Total_Records")]
    pub total_records: usize,
    #[serde(rename = "Total_Success")]
    pub total_success: usize,
    #[serde(rename = "Total_Errors")]
    pub total_errors: usize,
    #[serde(rename = "Total_Unprocessed")]
    pub total_unprocessed: usize,
    #[serde(rename = "Success_Rate_Percent")]
    pub success_rate_percent: String,
    #[serde(rename = "Error_Rate_Percent")]
    pub error_rate_percent: String,
    #[serde(rename = "Operation")]
    pub operation: String,
    #[serde(rename = "Object")]
    pub object: String,
    #[serde(rename = "Org")]
    pub org: String,
    #[serde(rename = "Total_Batches")]
    pub total_batches: usize,
    #[serde(rename = "Parallel_Processing")]
    pub parallel_processing: bool,
    #[serde(rename = "Log_Generated_At")]
    pub log_generated_at: String,
}

impl ProcessingSummaryRow {
    pub fn from_summary(summary: &RunSummary) -> Self {
        let duration = summary.duration_secs();
        ProcessingSummaryRow {
            start_time: summary.started_at.format(TIME_FORMAT).to_string(),
            end_time: summary.finished_at.format(TIME_FORMAT).to_string(),
            processing_duration_seconds: format!("{duration:.2}"),
            processing_duration_formatted: format_duration(duration),
            total_records: summary.total,
            total_success: summary.success,
            total_errors: summary.error,
            total_unprocessed: summary.unprocessed,
            success_rate_percent: format!("{:.2}", summary.success_rate()),
            error_rate_percent: format!("{:.2}", summary.error_rate()),
            operation: summary.operation.to_string(),
            object: summary.entity.clone(),
            org: summary.org.clone(),
            total_batches: summary.batch_count,
            parallel_processing: summary.is_parallel(),
            log_generated_at: chrono::Utc::now().format(TIME_FORMAT).to_string(),
        }
    }
}

/// One row of `Logs/batch_processing_details.csv`.
#[derive(Debug, Serialize)]
pub struct BatchDetailRow {
    #[serde(rename = "Batch_Number")]
    pub batch_number: usize,
    #[serde(rename = "Batch_Records")]
    pub batch_records: usize,
    #[serde(rename = "Batch_Success")]
    pub batch_success: usize,
    #[serde(rename = "Batch_Errors")]
    pub batch_errors: usize,
    #[serde(rename = "Batch_Processing_Time_Seconds")]
    pub batch_processing_time_seconds: String,
    #[serde(rename = "Batch_Success_Rate_Percent")]
    pub batch_success_rate_percent: String,
    #[serde(rename = "Batch_Error_Rate_Percent")]
    pub batch_error_rate_percent: String,
    #[serde(rename = "Batch_Status")]
    pub batch_status: String,
    #[serde(rename = "Error_Details")]
    pub error_details: String,
}

impl From<&BatchResult> for BatchDetailRow {
    fn from(result: &BatchResult) -> Self {
        BatchDetailRow {
            batch_number: result.batch_index,
            batch_records: result.total_records,
            batch_success: result.success_count(),
            batch_errors: result.error_count(),
            batch_processing_time_seconds: format!("{:.2}", result.duration_secs),
            batch_success_rate_percent: format!("{:.2}", result.success_rate()),
            batch_error_rate_percent: format!("{:.2}", result.error_rate()),
            batch_status: result.status().to_string(),
            error_details: result.error_detail.clone().unwrap_or_default(),
        }
    }
}
