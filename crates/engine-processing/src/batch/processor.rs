use async_trait::async_trait;
use connectors::remote::RemoteConnection;
use model::records::batch::{BatchJob, BatchResult};

/// Turns one job into its result over a connection the caller owns.
///
/// Implementations never fail: anything that goes wrong for the batch as a
/// whole is folded into an all-error [`BatchResult`].
#[async_trait]
pub trait BatchProcessor: Send + Sync {
    async fn process(&self, conn: &dyn RemoteConnection, job: &BatchJob) -> BatchResult;
}
