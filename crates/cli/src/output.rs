use crate::error::CliError;
use engine_processing::lookup::LookupSummary;
use engine_runtime::execution::{SyncReport, TransformReport};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct SyncReportJson<'a> {
    #[serde(flatten)]
    summary: &'a model::execution::outcome::RunSummary,
    success_rate: f64,
    error_rate: f64,
    duration_secs: f64,
    classification_failures: usize,
    lookups: &'a [LookupSummary],
}

pub fn print_sync_report(report: &SyncReport, as_json: bool) -> Result<(), CliError> {
    if as_json {
        let json = serde_json::to_string_pretty(&SyncReportJson {
            summary: &report.summary,
            success_rate: report.summary.success_rate(),
            error_rate: report.summary.error_rate(),
            duration_secs: report.summary.duration_secs(),
            classification_failures: report.classification_failures(),
            lookups: &report.lookups,
        })?;
        println!("{json}");
        return Ok(());
    }

    let s = &report.summary;
    println!("Run '{}' ({} into {}/{}):", s.run_id, s.operation, s.org, s.entity);
    println!("-----------------------------");
    println!("{:<16} {}", "Total", s.total);
    println!("{:<16} {} ({:.2}%)", "Succeeded", s.success, s.success_rate());
    println!("{:<16} {} ({:.2}%)", "Failed", s.error, s.error_rate());
    println!("{:<16} {}", "Unprocessed", s.unprocessed);
    println!("{:<16} {} x{}", "Batches", s.batch_count, s.parallelism);
    println!("{:<16} {:.2}s", "Duration", s.duration_secs());
    println!("{:<16} {}", "Flagged rows", report.classification_failures());
    print_lookups(&report.lookups);
    Ok(())
}

pub fn print_transform_report(report: &TransformReport) {
    let out = &report.outputs;
    println!("Transformed {} row(s):", report.transformed.len());
    println!("-----------------------------");
    println!("{:<16} {}", "Passed", out.success_rows);
    println!("{:<16} {}", "Flagged", out.failure_rows);
    println!("{:<16} {}", "Dataset", out.transformed_file.display());
    println!("{:<16} {}", "Passed rows", out.success_file.display());
    println!("{:<16} {}", "Flagged rows", out.failure_file.display());
    print_lookups(&report.lookups);
}

fn print_lookups(lookups: &[LookupSummary]) {
    for l in lookups {
        println!(
            "{:<16} {}.{}: {} resolved, {} unresolved, {} errors, {} already ids",
            l.field, l.related_entity, l.match_field, l.resolved, l.unresolved, l.errors, l.already_ids
        );
    }
}

/// Pretty JSON to `path`, or stdout when no path is given.
pub async fn emit_json<T: Serialize>(value: &T, path: Option<&Path>) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => tokio::fs::write(path, json).await?,
        None => println!("{json}"),
    }
    Ok(())
}
