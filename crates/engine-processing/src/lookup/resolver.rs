use crate::{
    error::LookupError,
    lookup::review::{ReviewDecision, ReviewPolicy},
};
use connectors::remote::{RemoteClient, point_lookup_query};
use engine_core::{
    metrics::Metrics,
    retry::{RetryPolicy, classify_remote_error},
};
use model::{
    core::value::Value,
    records::record::{Dataset, Record},
    transform::lookup::LookupField,
};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Rows handed to the review policy alongside the resolved count.
pub const REVIEW_SAMPLE_ROWS: usize = 10;

/// Outcome of the accepted resolution pass for one lookup field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupSummary {
    pub field: String,
    pub related_entity: String,
    pub match_field: String,
    /// Distinct values replaced by a canonical id.
    pub resolved: usize,
    /// Distinct values with no remote match.
    pub unresolved: usize,
    /// Distinct values whose query failed.
    pub errors: usize,
    /// Distinct values already in canonical id form.
    pub already_ids: usize,
}

/// A 15 or 18 character alphanumeric remote record id.
pub fn is_canonical_id(text: &str) -> bool {
    matches!(text.len(), 15 | 18) && text.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Rewrites reference columns from business keys to canonical remote ids.
pub struct LookupResolver<'a, C: RemoteClient + ?Sized> {
    client: &'a C,
    policy: &'a dyn ReviewPolicy,
    retry: RetryPolicy,
    metrics: Metrics,
}

impl<'a, C: RemoteClient + ?Sized> LookupResolver<'a, C> {
    pub fn new(client: &'a C, policy: &'a dyn ReviewPolicy) -> Self {
        Self {
            client,
            policy,
            retry: RetryPolicy::default(),
            metrics: Metrics::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Resolves every lookup in order, stopping at the first cancellation.
    ///
    /// `lookups` carries the accepted match field of each entry on return.
    pub async fn resolve_all(
        &self,
        dataset: &mut Dataset,
        lookups: &mut [LookupField],
    ) -> Result<Vec<LookupSummary>, LookupError> {
        let total = lookups.len();
        let mut summaries = Vec::with_capacity(total);

        for (i, lookup) in lookups.iter_mut().enumerate() {
            info!(
                field = %lookup.column_name,
                related = %lookup.related_entity,
                position = i + 1,
                total,
                "Resolving lookup field"
            );
            summaries.push(self.resolve_field(dataset, lookup).await?);
        }

        for summary in &summaries {
            info!(
                field = %summary.field,
                match_field = %summary.match_field,
                resolved = summary.resolved,
                unresolved = summary.unresolved,
                errors = summary.errors,
                "Lookup summary"
            );
        }
        Ok(summaries)
    }

    /// Resolves one field, then loops on the review checkpoint.
    ///
    /// Every reselection restores the column to its pre-resolution values
    /// before querying again, so passes never build on each other.
    pub async fn resolve_field(
        &self,
        dataset: &mut Dataset,
        lookup: &mut LookupField,
    ) -> Result<LookupSummary, LookupError> {
        if !dataset.has_column(&lookup.column_name) {
            return Err(LookupError::MissingColumn(lookup.column_name.clone()));
        }
        let original = dataset.column_values(&lookup.column_name);
        let mut summary = self.run_pass(dataset, lookup).await;

        loop {
            let sample: Vec<Record> = dataset
                .records
                .iter()
                .take(REVIEW_SAMPLE_ROWS)
                .cloned()
                .collect();

            match self
                .policy
                .review_lookup(lookup, summary.resolved, &sample)
                .await
            {
                ReviewDecision::Accept => return Ok(summary),
                ReviewDecision::Cancel => {
                    warn!(field = %lookup.column_name, "Lookup review cancelled");
                    return Err(LookupError::Cancelled {
                        field: lookup.column_name.clone(),
                    });
                }
                ReviewDecision::Reselect(field) if field == lookup.match_field => {
                    debug!(
                        field = %lookup.column_name,
                        match_field = %field,
                        "Match field unchanged, reviewing again"
                    );
                }
                ReviewDecision::Reselect(field) => {
                    info!(
                        field = %lookup.column_name,
                        from = %lookup.match_field,
                        to = %field,
                        "Match field changed, resolving again"
                    );
                    lookup.match_field = field;
                    restore_column(dataset, &lookup.column_name, &original);
                    summary = self.run_pass(dataset, lookup).await;
                }
            }
        }
    }

    async fn run_pass(&self, dataset: &mut Dataset, lookup: &LookupField) -> LookupSummary {
        let mut summary = LookupSummary {
            field: lookup.column_name.clone(),
            related_entity: lookup.related_entity.clone(),
            match_field: lookup.match_field.clone(),
            resolved: 0,
            unresolved: 0,
            errors: 0,
            already_ids: 0,
        };

        for value in distinct_values(dataset, &lookup.column_name) {
            let Some(text) = value.as_text().filter(|t| !t.trim().is_empty()) else {
                continue;
            };
            if is_canonical_id(&text) {
                summary.already_ids += 1;
                continue;
            }

            let soql = point_lookup_query(&lookup.related_entity, &lookup.match_field, &text);
            let outcome = self
                .retry
                .run(
                    || {
                        self.metrics.increment_remote_calls(1);
                        self.client.query(&soql)
                    },
                    classify_remote_error,
                    |_| self.metrics.increment_retries(1),
                )
                .await;

            match outcome {
                Ok(result) => match result.first_id() {
                    Some(id) => {
                        replace_value(dataset, &lookup.column_name, &value, &id);
                        summary.resolved += 1;
                    }
                    None => {
                        warn!(
                            field = %lookup.column_name,
                            related = %lookup.related_entity,
                            match_field = %lookup.match_field,
                            value = %text,
                            "No matching record found"
                        );
                        summary.unresolved += 1;
                    }
                },
                Err(e) => {
                    warn!(
                        field = %lookup.column_name,
                        related = %lookup.related_entity,
                        match_field = %lookup.match_field,
                        value = %text,
                        error = %e.into_inner(),
                        "Lookup query failed"
                    );
                    summary.errors += 1;
                }
            }
        }

        self.metrics.increment_lookups(summary.resolved as u64);
        info!(
            field = %lookup.column_name,
            match_field = %lookup.match_field,
            resolved = summary.resolved,
            "Resolved lookup values"
        );
        summary
    }
}

/// Distinct non-null values of a column in first-seen order.
fn distinct_values(dataset: &Dataset, column: &str) -> Vec<Value> {
    let mut seen = HashSet::new();
    dataset
        .records
        .iter()
        .filter_map(|r| r.get(column))
        .filter(|v| !v.is_null())
        .filter(|v| seen.insert((*v).clone()))
        .cloned()
        .collect()
}

fn replace_value(dataset: &mut Dataset, column: &str, from: &Value, id: &str) {
    for record in &mut dataset.records {
        if let Some(slot) = record.get_mut(column)
            && *slot == *from
        {
            *slot = Value::String(id.to_string());
        }
    }
}

fn restore_column(dataset: &mut Dataset, column: &str, original: &[Value]) {
    for (record, value) in dataset.records.iter_mut().zip(original) {
        record.set(column, value.clone());
    }
}
