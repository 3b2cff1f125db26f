use crate::{layout::ArtifactLayout, metrics::Metrics};
use chrono::{DateTime, Utc};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Everything scoped to one synchronization run.
///
/// Passed explicitly through every stage instead of living in globals; it is
/// dropped when the run ends.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub org: String,
    pub entity: String,
    pub started_at: DateTime<Utc>,
    pub layout: ArtifactLayout,
    pub metrics: Metrics,
    cancel: CancellationToken,
}

impl RunContext {
    pub fn new(org: &str, entity: &str, output_root: impl AsRef<Path>) -> Self {
        RunContext {
            run_id: format!("run-{}", uuid::Uuid::new_v4().simple()),
            org: org.to_string(),
            entity: entity.to_string(),
            started_at: Utc::now(),
            layout: ArtifactLayout::new(output_root, org, entity),
            metrics: Metrics::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Ties the run to an externally owned token, e.g. one cancelled on SIGINT.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops further batches from being dispatched. In-flight ones finish.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_token_cancels_context() {
        let token = CancellationToken::new();
        let ctx = RunContext::new("dev", "Account", "/tmp").with_cancellation(token.clone());
        assert!(!ctx.is_cancelled());

        token.cancel();
        assert!(ctx.is_cancelled());
        assert!(ctx.run_id.starts_with("run-"));
    }
}
