use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    records_succeeded: AtomicU64,
    records_failed: AtomicU64,
    batches_processed: AtomicU64,
    batches_failed: AtomicU64,
    lookups_resolved: AtomicU64,
    remote_calls: AtomicU64,
    retry_count: AtomicU64,
}

/// Run-wide counters, cheap to clone into every worker.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub records_succeeded: u64,
    pub records_failed: u64,
    pub batches_processed: u64,
    pub batches_failed: u64,
    pub lookups_resolved: u64,
    pub remote_calls: u64,
    pub retry_count: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of one finished batch.
    pub fn record_batch(&self, succeeded: usize, failed: usize, batch_failed: bool) {
        let inner = &self.inner;
        inner
            .records_succeeded
            .fetch_add(succeeded as u64, Ordering::Relaxed);
        inner
            .records_failed
            .fetch_add(failed as u64, Ordering::Relaxed);
        inner.batches_processed.fetch_add(1, Ordering::Relaxed);
        if batch_failed {
            inner.batches_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn increment_lookups(&self, count: u64) {
        self.inner
            .lookups_resolved
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_remote_calls(&self, count: u64) {
        self.inner.remote_calls.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_retries(&self, count: u64) {
        self.inner.retry_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = &self.inner;
        MetricsSnapshot {
            records_succeeded: inner.records_succeeded.load(Ordering::Relaxed),
            records_failed: inner.records_failed.load(Ordering::Relaxed),
            batches_processed: inner.batches_processed.load(Ordering::Relaxed),
            batches_failed: inner.batches_failed.load(Ordering::Relaxed),
            lookups_resolved: inner.lookups_resolved.load(Ordering::Relaxed),
            remote_calls: inner.remote_calls.load(Ordering::Relaxed),
            retry_count: inner.retry_count.load(Ordering::Relaxed),
        }
    }
}
