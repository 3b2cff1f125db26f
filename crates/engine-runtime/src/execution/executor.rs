use crate::{
    error::SyncError,
    execution::{
        metadata,
        workers::{DispatchOutcome, Dispatcher},
    },
};
use connectors::remote::{ConnectionFactory, RemoteConnection};
use engine_config::{
    report::audit::AuditWriter,
    settings::{SyncSettings, validated::ValidatedSettings, validator::SettingsValidator},
};
use engine_core::{
    context::RunContext, metrics::MetricsSnapshot, progress::RunStage, retry::RetryPolicy,
};
use engine_processing::{
    batch::BulkWriteExecutor,
    classify::TransformClassifier,
    lookup::{AcceptAll, LookupResolver, LookupSummary, ReviewPolicy},
    mapping::apply_mapping,
    partition::partition,
    sanitize::sanitize_record,
};
use model::{
    execution::outcome::{ClassificationRecord, RunSummary},
    records::{batch::BatchResult, record::Dataset},
    schema::describe::EntityDescribe,
    transform::{lookup::LookupField, mapping::ColumnMapping},
};
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tracing::{error, info, warn};

/// Everything a finished synchronization run produced.
#[derive(Debug)]
pub struct SyncReport {
    pub summary: RunSummary,
    /// Sorted by batch index.
    pub batches: Vec<BatchResult>,
    pub classification: Vec<ClassificationRecord>,
    pub lookups: Vec<LookupSummary>,
    pub metrics: MetricsSnapshot,
}

impl SyncReport {
    pub fn classification_failures(&self) -> usize {
        self.classification.iter().filter(|c| c.is_failure()).count()
    }
}

/// Contents of `Logs/run_summary.json`.
#[derive(Debug, Serialize)]
struct RunSummaryFile<'a> {
    summary: &'a RunSummary,
    lookups: &'a [LookupSummary],
    metrics: &'a MetricsSnapshot,
    classification_failures: usize,
}

/// Orchestrates one dataset into one remote entity.
pub struct SyncRun {
    ctx: RunContext,
    settings: SyncSettings,
    factory: Arc<dyn ConnectionFactory>,
    review: Arc<dyn ReviewPolicy>,
    lookup_overrides: HashMap<String, String>,
    mapping: Option<ColumnMapping>,
    retry: RetryPolicy,
}

impl SyncRun {
    pub fn new(ctx: RunContext, settings: SyncSettings, factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            ctx,
            settings,
            factory,
            review: Arc::new(AcceptAll),
            lookup_overrides: HashMap::new(),
            mapping: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_review(mut self, review: Arc<dyn ReviewPolicy>) -> Self {
        self.review = review;
        self
    }

    /// Renames source columns to entity fields and drops the unmapped ones
    /// before anything else reads the dataset.
    pub fn with_mapping(mut self, mapping: ColumnMapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    /// Initial match field per lookup column, instead of `Name`.
    pub fn with_lookup_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.lookup_overrides = overrides;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub async fn execute(self, dataset: Dataset) -> Result<SyncReport, SyncError> {
        info!(
            run_id = %self.ctx.run_id,
            org = %self.ctx.org,
            entity = %self.ctx.entity,
            rows = dataset.len(),
            "Starting synchronization run"
        );

        let result = self.run(dataset).await;
        match &result {
            Ok(report) => {
                stage(&self.ctx, RunStage::Done);
                info!(
                    run_id = %self.ctx.run_id,
                    total = report.summary.total,
                    success = report.summary.success,
                    errors = report.summary.error,
                    unprocessed = report.summary.unprocessed,
                    duration_secs = report.summary.duration_secs(),
                    "Synchronization run finished"
                );
            }
            Err(e) if e.is_cancellation() => {
                stage(&self.ctx, RunStage::Cancelled);
                warn!(run_id = %self.ctx.run_id, error = %e, "Synchronization run cancelled");
            }
            Err(e) => {
                stage(&self.ctx, RunStage::Failed);
                error!(run_id = %self.ctx.run_id, error = %e, "Synchronization run failed");
            }
        }
        result
    }

    async fn run(&self, raw: Dataset) -> Result<SyncReport, SyncError> {
        stage(&self.ctx, RunStage::Preparing);
        let raw = map_columns(self.mapping.as_ref(), raw)?;
        let control = metadata::open_control(self.factory.as_ref(), &self.retry, &self.ctx.metrics).await?;
        let describe = metadata::load(control.as_ref(), &self.ctx.entity, &self.retry, &self.ctx.metrics).await?;

        let validated = SettingsValidator::new(&raw, &describe).validate(&self.settings)?;
        let audit = Arc::new(AuditWriter::new(self.ctx.layout.clone())?);

        let prepared = prepare(
            &self.ctx,
            control.as_ref(),
            self.review.as_ref(),
            &self.retry,
            &describe,
            &self.lookup_overrides,
            &raw,
        )
        .await;
        let (transformed, lookups, lookup_summaries) = match prepared {
            Ok(p) => p,
            Err(e) => {
                flush_partial(&audit, &raw, &raw, &[]);
                return Err(e);
            }
        };
        drop(control);

        if self.ctx.is_cancelled() {
            let classification = TransformClassifier::new(&describe, &lookups).classify(&raw, &transformed);
            flush_partial(&audit, &raw, &transformed, &classification);
            return Err(SyncError::Cancelled);
        }

        let jobs = partition(&transformed, validated.batch_size)?;
        info!(
            batches = jobs.len(),
            batch_size = validated.batch_size,
            parallelism = validated.parallelism,
            operation = %validated.operation,
            "Dataset partitioned"
        );

        stage(&self.ctx, RunStage::Dispatching);
        let outcome = self
            .dispatcher(&describe, &validated, audit.clone())
            .dispatch(jobs)
            .await;
        let unprocessed_rows = outcome.unprocessed_rows();
        let DispatchOutcome {
            results: batches,
            mut worker_failures,
            ..
        } = outcome;

        stage(&self.ctx, RunStage::Classifying);
        let classification = TransformClassifier::new(&describe, &lookups).classify(&raw, &transformed);

        stage(&self.ctx, RunStage::Reporting);
        let summary = self.summarize(&validated, raw.len(), &batches);
        if summary.unprocessed > 0 {
            warn!(
                unprocessed = summary.unprocessed,
                skipped_rows = unprocessed_rows,
                "Some records were never processed"
            );
        }

        let report = SyncReport {
            summary,
            batches,
            classification,
            lookups: lookup_summaries,
            metrics: self.ctx.metrics.snapshot(),
        };
        write_reports(&audit, &raw, &transformed, &report)?;

        // Reports above already hold every batch that finished.
        if let Some(e) = worker_failures.pop() {
            error!(
                failed_workers = worker_failures.len() + 1,
                batches = report.batches.len(),
                "Worker task failed, run reports were written before stopping"
            );
            return Err(SyncError::TaskJoin(e));
        }
        Ok(report)
    }

    fn dispatcher(
        &self,
        describe: &EntityDescribe,
        validated: &ValidatedSettings,
        audit: Arc<AuditWriter>,
    ) -> Dispatcher {
        let executor = BulkWriteExecutor::new(describe, validated, self.ctx.metrics.clone());
        Dispatcher::new(self.factory.clone(), Arc::new(executor), validated.parallelism)
            .with_audit(audit)
            .with_metrics(self.ctx.metrics.clone())
            .with_cancellation(self.ctx.cancel_token())
    }

    fn summarize(&self, validated: &ValidatedSettings, total: usize, batches: &[BatchResult]) -> RunSummary {
        let success: usize = batches.iter().map(BatchResult::success_count).sum();
        let error: usize = batches.iter().map(BatchResult::error_count).sum();

        RunSummary {
            run_id: self.ctx.run_id.clone(),
            org: self.ctx.org.clone(),
            entity: self.ctx.entity.clone(),
            operation: validated.operation,
            started_at: self.ctx.started_at,
            finished_at: chrono::Utc::now(),
            total,
            success,
            error,
            unprocessed: total.saturating_sub(success + error),
            batch_count: validated.batch_count(total),
            parallelism: validated.parallelism,
        }
    }
}

/// Lookup resolution and sanitizing on a copy of the raw dataset.
///
/// Returns the transformed dataset, the lookups with their accepted match
/// fields, and one summary per lookup.
pub(crate) async fn prepare(
    ctx: &RunContext,
    control: &dyn RemoteConnection,
    review: &dyn ReviewPolicy,
    retry: &RetryPolicy,
    describe: &EntityDescribe,
    overrides: &HashMap<String, String>,
    raw: &Dataset,
) -> Result<(Dataset, Vec<LookupField>, Vec<LookupSummary>), SyncError> {
    stage(ctx, RunStage::Resolving);

    let mut transformed = raw.clone();
    transformed.records = transformed.records.iter().map(sanitize_record).collect();

    let mut lookups = LookupField::discover(describe, &transformed, overrides);
    if lookups.is_empty() {
        info!(entity = %describe.name, "No lookup fields to resolve");
        return Ok((transformed, lookups, Vec::new()));
    }

    let summaries = LookupResolver::new(control, review)
        .with_retry(retry.clone())
        .with_metrics(ctx.metrics.clone())
        .resolve_all(&mut transformed, &mut lookups)
        .await?;
    Ok((transformed, lookups, summaries))
}

/// Applies the column mapping, if any, to the dataset as read from the file.
pub(crate) fn map_columns(mapping: Option<&ColumnMapping>, raw: Dataset) -> Result<Dataset, SyncError> {
    match mapping {
        Some(mapping) => Ok(apply_mapping(&raw, mapping)?),
        None => Ok(raw),
    }
}

pub(crate) fn stage(ctx: &RunContext, stage: RunStage) {
    info!(run_id = %ctx.run_id, stage = %stage, "Run stage");
}

fn write_reports(
    audit: &AuditWriter,
    raw: &Dataset,
    transformed: &Dataset,
    report: &SyncReport,
) -> Result<(), SyncError> {
    // each file is independent; keep going so a single failure loses as little as possible
    let consolidated = audit.write_consolidated(raw, transformed, &report.batches);
    let classified = audit.write_transform_outputs(transformed, &report.classification);
    let logs = audit.write_processing_log(&report.summary, &report.batches);
    let json = audit.write_run_summary(&RunSummaryFile {
        summary: &report.summary,
        lookups: &report.lookups,
        metrics: &report.metrics,
        classification_failures: report.classification_failures(),
    });

    consolidated?;
    classified?;
    logs?;
    json?;
    Ok(())
}

/// Best-effort dump of the datasets when a run stops before dispatch.
fn flush_partial(
    audit: &AuditWriter,
    raw: &Dataset,
    transformed: &Dataset,
    classification: &[ClassificationRecord],
) {
    if let Err(e) = audit.write_consolidated(raw, transformed, &[]) {
        error!(error = %e, "Failed to flush partial artifacts");
    }
    if !classification.is_empty()
        && let Err(e) = audit.write_transform_outputs(transformed, classification)
    {
        error!(error = %e, "Failed to flush transform classification");
    }
}
