use crate::{
    error::SyncError,
    execution::{
        executor::{map_columns, prepare, stage},
        metadata,
    },
};
use connectors::remote::ConnectionFactory;
use engine_config::report::audit::{AuditWriter, TransformOutputs};
use engine_core::{context::RunContext, progress::RunStage, retry::RetryPolicy};
use engine_processing::{
    classify::TransformClassifier,
    lookup::{AcceptAll, LookupSummary, ReviewPolicy},
};
use model::{
    execution::outcome::ClassificationRecord, records::record::Dataset,
    transform::mapping::ColumnMapping,
};
use std::{collections::HashMap, sync::Arc};
use tracing::{error, info};

#[derive(Debug)]
pub struct TransformReport {
    pub transformed: Dataset,
    pub classification: Vec<ClassificationRecord>,
    pub lookups: Vec<LookupSummary>,
    pub outputs: TransformOutputs,
}

/// Resolves lookups and classifies the result without writing anything to
/// the remote store.
pub struct TransformRun {
    ctx: RunContext,
    factory: Arc<dyn ConnectionFactory>,
    review: Arc<dyn ReviewPolicy>,
    lookup_overrides: HashMap<String, String>,
    mapping: Option<ColumnMapping>,
    retry: RetryPolicy,
}

impl TransformRun {
    pub fn new(ctx: RunContext, factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            ctx,
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

    pub fn with_lookup_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.lookup_overrides = overrides;
        self
    }

    pub fn with_mapping(mut self, mapping: ColumnMapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn execute(self, raw: Dataset) -> Result<TransformReport, SyncError> {
        info!(
            run_id = %self.ctx.run_id,
            entity = %self.ctx.entity,
            rows = raw.len(),
            "Starting transform run"
        );

        let result = self.run(raw).await;
        match &result {
            Ok(report) => {
                stage(&self.ctx, RunStage::Done);
                info!(
                    success = report.outputs.success_rows,
                    failure = report.outputs.failure_rows,
                    "Transform run finished"
                );
            }
            Err(e) => {
                let terminal = if e.is_cancellation() {
                    RunStage::Cancelled
                } else {
                    RunStage::Failed
                };
                stage(&self.ctx, terminal);
                error!(error = %e, "Transform run stopped");
            }
        }
        result
    }

    async fn run(&self, raw: Dataset) -> Result<TransformReport, SyncError> {
        stage(&self.ctx, RunStage::Preparing);
        let raw = map_columns(self.mapping.as_ref(), raw)?;
        let control =
            metadata::open_control(self.factory.as_ref(), &self.retry, &self.ctx.metrics).await?;
        let describe =
            metadata::load(control.as_ref(), &self.ctx.entity, &self.retry, &self.ctx.metrics)
                .await?;
        let audit = AuditWriter::new(self.ctx.layout.clone())?;

        let (transformed, lookups, summaries) = prepare(
            &self.ctx,
            control.as_ref(),
            self.review.as_ref(),
            &self.retry,
            &describe,
            &self.lookup_overrides,
            &raw,
        )
        .await?;

        stage(&self.ctx, RunStage::Classifying);
        let classification =
            TransformClassifier::new(&describe, &lookups).classify(&raw, &transformed);

        stage(&self.ctx, RunStage::Reporting);
        let outputs = audit.write_transform_outputs(&transformed, &classification)?;

        Ok(TransformReport {
            transformed,
            classification,
            lookups: summaries,
            outputs,
        })
    }
}
