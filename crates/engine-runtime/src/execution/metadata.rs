use connectors::{
    error::RemoteError,
    remote::{ConnectionFactory, RemoteConnection},
};
use engine_core::{
    metrics::Metrics,
    retry::{RetryPolicy, classify_remote_error},
};
use model::schema::describe::EntityDescribe;
use tracing::info;

/// Opens the orchestrator's own connection, used for describe and lookups.
pub async fn open_control(
    factory: &dyn ConnectionFactory,
    retry: &RetryPolicy,
    metrics: &Metrics,
) -> Result<Box<dyn RemoteConnection>, RemoteError> {
    retry
        .run(
            || {
                metrics.increment_remote_calls(1);
                factory.connect()
            },
            classify_remote_error,
            |_| metrics.increment_retries(1),
        )
        .await
        .map_err(|e| e.into_inner())
}

/// Describes the target entity, retrying transient failures.
pub async fn load(
    conn: &dyn RemoteConnection,
    entity: &str,
    retry: &RetryPolicy,
    metrics: &Metrics,
) -> Result<EntityDescribe, RemoteError> {
    let describe = retry
        .run(
            || {
                metrics.increment_remote_calls(1);
                conn.describe(entity)
            },
            classify_remote_error,
            |_| metrics.increment_retries(1),
        )
        .await
        .map_err(|e| e.into_inner())?;

    info!(
        entity = %describe.name,
        fields = describe.fields.len(),
        unique = describe.unique_fields().len(),
        picklists = describe.picklist_fields().len(),
        "Loaded target metadata"
    );
    Ok(describe)
}
