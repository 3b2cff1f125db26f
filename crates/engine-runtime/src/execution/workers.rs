use connectors::{
    error::RemoteError,
    remote::{ConnectionFactory, RemoteConnection},
};
use engine_config::report::audit::AuditWriter;
use engine_core::metrics::Metrics;
use engine_processing::batch::BatchProcessor;
use futures::FutureExt;
use model::records::batch::{BatchJob, BatchResult};
use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Instant};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinError,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What came back from dispatching a set of jobs.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// One result per dispatched job, sorted by batch index.
    pub results: Vec<BatchResult>,
    /// Jobs never started because the run was cancelled.
    pub skipped: Vec<BatchJob>,
    /// Worker tasks that died outside batch processing. Results they sent
    /// before dying are still in `results`.
    pub worker_failures: Vec<JoinError>,
}

impl DispatchOutcome {
    pub fn unprocessed_rows(&self) -> usize {
        self.skipped.iter().map(BatchJob::len).sum()
    }
}

/// Runs batch jobs on a bounded pool of workers.
///
/// Each worker opens its own connection through the factory once and keeps
/// it for its whole lifetime. Jobs are pulled from a shared queue, results
/// flow back over a channel to a single collector.
#[derive(Clone)]
pub struct Dispatcher {
    factory: Arc<dyn ConnectionFactory>,
    processor: Arc<dyn BatchProcessor>,
    audit: Option<Arc<AuditWriter>>,
    metrics: Metrics,
    cancel: CancellationToken,
    parallelism: usize,
}

impl Dispatcher {
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        processor: Arc<dyn BatchProcessor>,
        parallelism: usize,
    ) -> Self {
        Self {
            factory,
            processor,
            audit: None,
            metrics: Metrics::new(),
            cancel: CancellationToken::new(),
            parallelism: parallelism.max(1),
        }
    }

    /// Per-batch source/success/error files are written by the worker that
    /// ran the batch.
    pub fn with_audit(mut self, audit: Arc<AuditWriter>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn dispatch(&self, jobs: Vec<BatchJob>) -> DispatchOutcome {
        if jobs.is_empty() {
            return DispatchOutcome::default();
        }

        let workers = self.parallelism.min(jobs.len());
        info!(
            batches = jobs.len(),
            workers,
            mode = if workers > 1 { "parallel" } else { "sequential" },
            "Dispatching batches"
        );

        let mut outcome = if workers > 1 {
            self.run_parallel(jobs, workers).await
        } else {
            self.run_sequential(jobs).await
        };

        outcome.results.sort_by_key(|r| r.batch_index);
        outcome.skipped.sort_by_key(|j| j.index);

        if !outcome.skipped.is_empty() {
            warn!(
                skipped = outcome.skipped.len(),
                rows = outcome.unprocessed_rows(),
                "Dispatch cancelled, remaining batches were not started"
            );
        }
        outcome
    }

    /// One connection, jobs in index order.
    async fn run_sequential(&self, jobs: Vec<BatchJob>) -> DispatchOutcome {
        let conn = self.connect(0).await;
        let mut outcome = DispatchOutcome::default();
        let mut queue = jobs.into_iter();

        while let Some(job) = queue.next() {
            if self.cancel.is_cancelled() {
                outcome.skipped.push(job);
                outcome.skipped.extend(queue);
                break;
            }
            outcome.results.push(self.run_job(0, &conn, &job).await);
        }
        outcome
    }

    async fn run_parallel(&self, jobs: Vec<BatchJob>, workers: usize) -> DispatchOutcome {
        let (job_tx, job_rx) = mpsc::channel::<BatchJob>(jobs.len());
        for job in jobs {
            // capacity equals the job count, so this never waits
            if job_tx.send(job).await.is_err() {
                break;
            }
        }
        drop(job_tx);

        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<BatchResult>(workers * 2);

        let mut handles = Vec::with_capacity(workers);
        for worker in 1..=workers {
            let dispatcher = self.clone();
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            handles.push(tokio::spawn(async move {
                dispatcher.worker_loop(worker, jobs, results).await;
            }));
        }
        drop(result_tx);

        let mut outcome = DispatchOutcome::default();
        while let Some(result) = result_rx.recv().await {
            outcome.results.push(result);
        }

        for (n, handle) in handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!(worker = n + 1, error = %e, "Worker task failed");
                outcome.worker_failures.push(e);
            }
        }

        let mut remaining = job_rx.lock().await;
        while let Ok(job) = remaining.try_recv() {
            outcome.skipped.push(job);
        }
        outcome
    }

    async fn worker_loop(
        &self,
        worker: usize,
        jobs: Arc<Mutex<mpsc::Receiver<BatchJob>>>,
        results: mpsc::Sender<BatchResult>,
    ) {
        let conn = self.connect(worker).await;
        let mut done = 0usize;

        loop {
            if self.cancel.is_cancelled() {
                debug!(worker, "Cancellation observed, worker stopping");
                break;
            }

            let next = { jobs.lock().await.recv().await };
            let Some(job) = next else {
                break;
            };

            let result = self.run_job(worker, &conn, &job).await;
            done += 1;
            if results.send(result).await.is_err() {
                error!(worker, "Result collector closed, worker stopping");
                break;
            }
        }

        debug!(worker, batches = done, "Worker finished");
    }

    async fn connect(&self, worker: usize) -> Result<Box<dyn RemoteConnection>, RemoteError> {
        let conn = self.factory.connect().await;
        self.metrics.increment_remote_calls(1);
        if let Err(e) = &conn {
            error!(worker, error = %e, "Worker could not open a connection");
        }
        conn
    }

    /// Processes one job, containing any failure or panic to that batch.
    async fn run_job(
        &self,
        worker: usize,
        conn: &Result<Box<dyn RemoteConnection>, RemoteError>,
        job: &BatchJob,
    ) -> BatchResult {
        let started = Instant::now();
        debug!(worker, batch = job.index, rows = job.len(), "Worker picked up batch");

        let result = match conn {
            Ok(conn) => {
                let run = self.processor.process(conn.as_ref(), job);
                match AssertUnwindSafe(run).catch_unwind().await {
                    Ok(result) => result,
                    Err(panic) => {
                        let detail = panic_message(panic.as_ref());
                        error!(worker, batch = job.index, panic = %detail, "Batch worker panicked");
                        BatchResult::failed(
                            job,
                            format!("worker panicked: {detail}"),
                            started.elapsed().as_secs_f64(),
                        )
                    }
                }
            }
            Err(e) => BatchResult::failed(
                job,
                format!("no connection: {e}"),
                started.elapsed().as_secs_f64(),
            ),
        };

        self.metrics.record_batch(
            result.success_count(),
            result.error_count(),
            result.error_detail.is_some(),
        );

        if let Some(audit) = &self.audit
            && let Err(e) = audit.write_batch(job, &result)
        {
            error!(worker, batch = job.index, error = %e, "Failed to write batch artifacts");
        }

        debug!(worker, batch = job.index, status = %result.status(), "Worker finished batch");
        result
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use model::{
        core::value::Value,
        records::{batch::ERRORS_COLUMN, record::Record},
    };
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    struct CountingFactory {
        opened: AtomicUsize,
        fail: bool,
    }

    impl CountingFactory {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                opened: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl ConnectionFactory for CountingFactory {
        async fn connect(&self) -> Result<Box<dyn RemoteConnection>, RemoteError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RemoteError::Connectivity("refused".into()));
            }
            let org = connectors::memory::MemoryOrg::new();
            org.connect().await
        }
    }

    /// Succeeds every row, panics on batch 2, sleeps inversely to the index
    /// so completion order differs from dispatch order.
    struct FakeProcessor {
        cancel_after_first: Option<CancellationToken>,
    }

    #[async_trait]
    impl BatchProcessor for FakeProcessor {
        async fn process(&self, _conn: &dyn RemoteConnection, job: &BatchJob) -> BatchResult {
            tokio::time::sleep(Duration::from_millis(30 / job.index as u64)).await;
            if let Some(token) = &self.cancel_after_first {
                token.cancel();
            }
            if job.index == 2 {
                panic!("boom in batch 2");
            }
            BatchResult {
                batch_index: job.index,
                total_records: job.len(),
                success_rows: job.records.clone(),
                error_rows: Vec::new(),
                duration_secs: 0.0,
                error_detail: None,
            }
        }
    }

    fn jobs(count: usize, per_job: usize) -> Vec<BatchJob> {
        (1..=count)
            .map(|index| BatchJob {
                index,
                offset: (index - 1) * per_job,
                columns: vec!["Name".into()],
                records: (0..per_job)
                    .map(|i| Record::from_pairs([("Name", Value::from(format!("r{index}-{i}")))]))
                    .collect(),
                created_at: chrono::Utc::now(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_parallel_dispatch_sorts_and_contains_panics() {
        let factory = CountingFactory::new(false);
        let dispatcher = Dispatcher::new(
            factory.clone(),
            Arc::new(FakeProcessor {
                cancel_after_first: None,
            }),
            3,
        );

        let outcome = dispatcher.dispatch(jobs(4, 2)).await;

        let indices: Vec<usize> = outcome.results.iter().map(|r| r.batch_index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
        assert!(outcome.skipped.is_empty());
        assert_eq!(factory.opened.load(Ordering::SeqCst), 3);

        let failed = &outcome.results[1];
        assert_eq!(failed.error_count(), 2);
        assert_eq!(failed.success_count(), 0);
        assert!(
            failed.error_rows[0]
                .get_value(ERRORS_COLUMN)
                .comparable_text()
                .contains("boom in batch 2")
        );
        assert!(outcome.results.iter().all(BatchResult::is_balanced));
        assert_eq!(outcome.results[0].success_count(), 2);
    }

    #[tokio::test]
    async fn test_sequential_dispatch_uses_one_connection() {
        let factory = CountingFactory::new(false);
        let dispatcher = Dispatcher::new(
            factory.clone(),
            Arc::new(FakeProcessor {
                cancel_after_first: None,
            }),
            1,
        );

        let outcome = dispatcher.dispatch(jobs(3, 1)).await;
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(factory.opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connection_failure_fails_each_batch() {
        let factory = CountingFactory::new(true);
        let dispatcher = Dispatcher::new(
            factory,
            Arc::new(FakeProcessor {
                cancel_after_first: None,
            }),
            2,
        );

        let outcome = dispatcher.dispatch(jobs(3, 2)).await;
        assert_eq!(outcome.results.len(), 3);
        for result in &outcome.results {
            assert_eq!(result.error_count(), 2);
            assert!(
                result
                    .error_detail
                    .as_deref()
                    .unwrap()
                    .starts_with("no connection")
            );
        }
    }

    /// Opens a connection on the first call and panics on every later one.
    struct FlakyFactory {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ConnectionFactory for FlakyFactory {
        async fn connect(&self) -> Result<Box<dyn RemoteConnection>, RemoteError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
                panic!("connector blew up");
            }
            connectors::memory::MemoryOrg::new().connect().await
        }
    }

    #[tokio::test]
    async fn test_dead_worker_keeps_results_of_the_others() {
        let dispatcher = Dispatcher::new(
            Arc::new(FlakyFactory {
                calls: AtomicUsize::new(0),
            }),
            Arc::new(FakeProcessor {
                cancel_after_first: None,
            }),
            2,
        );

        let outcome = dispatcher.dispatch(jobs(3, 2)).await;

        assert_eq!(outcome.worker_failures.len(), 1);
        assert!(outcome.worker_failures[0].is_panic());
        let indices: Vec<usize> = outcome.results.iter().map(|r| r.batch_index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.results[0].success_count(), 2);
    }

    #[tokio::test]
    async fn test_cancellation_stops_further_batches() {
        let token = CancellationToken::new();
        let dispatcher = Dispatcher::new(
            CountingFactory::new(false),
            Arc::new(FakeProcessor {
                cancel_after_first: Some(token.clone()),
            }),
            1,
        )
        .with_cancellation(token);

        let outcome = dispatcher.dispatch(jobs(3, 2)).await;
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.skipped.len(), 2);
        assert_eq!(outcome.unprocessed_rows(), 4);
    }

    #[tokio::test]
    async fn test_empty_job_list() {
        let dispatcher = Dispatcher::new(
            CountingFactory::new(false),
            Arc::new(FakeProcessor {
                cancel_after_first: None,
            }),
            4,
        );
        let outcome = dispatcher.dispatch(Vec::new()).await;
        assert!(outcome.results.is_empty());
    }
}
