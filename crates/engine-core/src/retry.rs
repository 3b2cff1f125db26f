use connectors::error::RemoteError;
use std::{fmt::Display, future::Future, time::Duration};
use tokio::time::sleep;
use tracing::warn;

/// Indicates whether an error should be retried or treated as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    Stop,
}

/// Result of running an operation under the retry policy.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was considered fatal and bubbled up on the first attempt.
    Fatal(E),
    /// The error was retryable, but the configured attempts were exhausted.
    AttemptsExceeded(E),
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal(e) | RetryError::AttemptsExceeded(e) => e,
        }
    }
}

/// Exponential backoff for idempotent remote reads.
///
/// Bulk writes never go through this: a failed write is terminal for its
/// batch, since replaying it could duplicate records that were accepted.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: if max_delay.is_zero() {
                base_delay
            } else {
                max_delay
            },
        }
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Runs `op`, retrying while `classify` says so and attempts remain.
    ///
    /// `on_retry` fires once per retry before the backoff sleep.
    pub async fn run<F, Fut, T, E, Classifier>(
        &self,
        mut op: F,
        classify: Classifier,
        on_retry: impl Fn(usize),
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        Classifier: Fn(&E) -> RetryDisposition,
    {
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(result) => return Ok(result),
                Err(err) => match classify(&err) {
                    RetryDisposition::Stop => return Err(RetryError::Fatal(err)),
                    RetryDisposition::Retry => {
                        if attempt + 1 >= self.max_attempts {
                            return Err(RetryError::AttemptsExceeded(err));
                        }

                        let delay = self.backoff_delay(attempt);
                        warn!(
                            attempt = attempt + 1,
                            max_attempts = self.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Retrying remote call"
                        );
                        on_retry(attempt + 1);
                        sleep(delay).await;
                        attempt += 1;
                    }
                },
            }
        }
    }

    fn backoff_delay(&self, attempt: usize) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let factor = 1u128 << attempt.min(6);
        let delay_ms = self.base_delay.as_millis().saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis());
        Duration::from_millis(capped as u64)
    }
}

pub fn classify_remote_error(err: &RemoteError) -> RetryDisposition {
    match err {
        RemoteError::Connectivity(_) | RemoteError::Timeout(_) => RetryDisposition::Retry,
        RemoteError::Rejected { status, .. } if *status >= 500 => RetryDisposition::Retry,
        RemoteError::Rejected { .. }
        | RemoteError::Authentication(_)
        | RemoteError::MalformedPayload(_)
        | RemoteError::Query(_)
        | RemoteError::Decode(_)
        | RemoteError::UnknownEntity(_)
        | RemoteError::Unsupported(_) => RetryDisposition::Stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast(attempts: usize) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1), Duration::from_millis(2))
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = AtomicUsize::new(0);
        let retries = AtomicUsize::new(0);
        let counter = &calls;

        let result = fast(3)
            .run(
                move || async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(RemoteError::Connectivity("reset".into()))
                    } else {
                        Ok(7)
                    }
                },
                classify_remote_error,
                |_| {
                    retries.fetch_add(1, Ordering::SeqCst);
                },
            )
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(retries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fatal_errors_stop_immediately() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let result: Result<(), _> = fast(5)
            .run(
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(RemoteError::Authentication("expired".into()))
                },
                classify_remote_error,
                |_| {},
            )
            .await;

        assert!(matches!(result, Err(RetryError::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let result: Result<(), _> = fast(2)
            .run(
                || async { Err(RemoteError::Timeout(Duration::from_secs(1))) },
                classify_remote_error,
                |_| {},
            )
            .await;

        assert!(matches!(result, Err(RetryError::AttemptsExceeded(_))));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::new(10, Duration::from_millis(100), Duration::from_millis(300));
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(5), Duration::from_millis(300));
    }
}
