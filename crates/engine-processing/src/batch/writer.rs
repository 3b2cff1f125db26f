use crate::{
    batch::processor::BatchProcessor,
    error::WriteError,
    sanitize::{apply_boolean_coercion, sanitize_record},
};
use async_trait::async_trait;
use connectors::{
    remote::{RemoteClient, RemoteConnection},
    salesforce::client::MAX_COLLECTION_SIZE,
};
use engine_config::settings::validated::ValidatedSettings;
use engine_core::metrics::Metrics;
use model::{
    execution::write::WriteOperation,
    records::{
        batch::{BatchJob, BatchResult, ERRORS_COLUMN},
        record::Record,
    },
    schema::describe::EntityDescribe,
};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Writes one batch with a single bulk call and maps the positional
/// response back onto the source rows.
#[derive(Debug, Clone)]
pub struct BulkWriteExecutor {
    entity: String,
    operation: WriteOperation,
    external_id_field: Option<String>,
    boolean_fields: Vec<String>,
    request_timeout: Duration,
    metrics: Metrics,
}

impl BulkWriteExecutor {
    pub fn new(describe: &EntityDescribe, settings: &ValidatedSettings, metrics: Metrics) -> Self {
        let boolean_fields = if settings.coerce_booleans {
            describe
                .boolean_fields()
                .into_iter()
                .map(str::to_string)
                .collect()
        } else {
            Vec::new()
        };

        Self {
            entity: describe.name.clone(),
            operation: settings.operation,
            external_id_field: settings.external_id_field.clone(),
            boolean_fields,
            request_timeout: settings.request_timeout,
            metrics,
        }
    }

    pub fn boolean_fields(&self) -> &[String] {
        &self.boolean_fields
    }

    /// Wire payload for a job: sanitized, with boolean columns coerced.
    pub fn prepare(&self, job: &BatchJob) -> Vec<Record> {
        job.records
            .iter()
            .map(|r| {
                let mut clean = sanitize_record(r);
                apply_boolean_coercion(&mut clean, &self.boolean_fields);
                clean
            })
            .collect()
    }

    fn call_timeout(&self, rows: usize) -> Duration {
        let requests = rows.div_ceil(MAX_COLLECTION_SIZE).max(1) as u32;
        self.request_timeout * (requests + 1)
    }

    /// Runs the bulk call. `Err` means the batch failed as a unit.
    pub async fn write<C: RemoteClient + ?Sized>(
        &self,
        client: &C,
        job: &BatchJob,
    ) -> Result<BatchResult, WriteError> {
        let start = Instant::now();
        let payload = self.prepare(job);

        self.metrics.increment_remote_calls(1);
        let call = client.bulk_write(
            &self.entity,
            self.operation,
            self.external_id_field.as_deref(),
            &payload,
        );
        // The client splits the batch into requests that are each bounded by
        // `request_timeout`; this guard only catches a client that hangs.
        let limit = self.call_timeout(payload.len());
        let outcomes = tokio::time::timeout(limit, call)
            .await
            .map_err(|_| WriteError::Timeout(limit))??;

        if outcomes.len() != job.len() {
            return Err(WriteError::ResponseMismatch {
                expected: job.len(),
                actual: outcomes.len(),
            });
        }

        let mut success_rows = Vec::new();
        let mut error_rows = Vec::new();
        for (row, outcome) in job.records.iter().zip(&outcomes) {
            if outcome.success {
                success_rows.push(row.clone());
            } else {
                let mut rejected = row.clone();
                rejected.set(ERRORS_COLUMN, outcome.error_text());
                error_rows.push(rejected);
            }
        }

        Ok(BatchResult {
            batch_index: job.index,
            total_records: job.len(),
            success_rows,
            error_rows,
            duration_secs: start.elapsed().as_secs_f64(),
            error_detail: None,
        })
    }

    /// Like [`Self::write`], but folds a batch-level failure into an
    /// all-error result.
    pub async fn process_batch<C: RemoteClient + ?Sized>(
        &self,
        client: &C,
        job: &BatchJob,
    ) -> BatchResult {
        let start = Instant::now();
        info!(
            batch = job.index,
            rows = job.len(),
            entity = %self.entity,
            operation = %self.operation,
            "Writing batch"
        );

        let result = match self.write(client, job).await {
            Ok(result) => result,
            Err(e) => {
                error!(batch = job.index, rows = job.len(), error = %e, "Batch write failed");
                BatchResult::failed(job, e.to_string(), start.elapsed().as_secs_f64())
            }
        };

        if result.error_count() > 0 && result.success_count() > 0 {
            warn!(
                batch = job.index,
                errors = result.error_count(),
                "Some records were rejected"
            );
        }
        info!(
            batch = job.index,
            success = result.success_count(),
            errors = result.error_count(),
            status = %result.status(),
            duration_ms = (result.duration_secs * 1000.0) as u64,
            "Batch completed"
        );
        result
    }
}

#[async_trait]
impl BatchProcessor for BulkWriteExecutor {
    async fn process(&self, conn: &dyn RemoteConnection, job: &BatchJob) -> BatchResult {
        self.process_batch(conn, job).await
    }
}
