//! Bounded retries with linear backoff under an overall deadline.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use converter_types::RateSourceError;

/// How many times to try, how long to wait between tries, and when to give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero behaves like one.
    pub max_attempts: u32,
    /// Backoff unit: the wait after attempt `n` is `delay * n`.
    pub delay: Duration,
    /// Ceiling for the whole sequence, backoff included.
    pub timeout: Duration,
    /// Optional ceiling for a single attempt. Hitting it ends the sequence.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
            timeout: Duration::from_secs(10),
            attempt_timeout: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration, timeout: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            timeout,
            attempt_timeout: None,
        }
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = Some(attempt_timeout);
        self
    }

    /// Wait before the attempt following attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.delay.saturating_mul(attempt)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Errors that can tell whether another attempt could help.
pub trait Retryable {
    fn is_retryable(&self) -> bool {
        true
    }
}

impl Retryable for RateSourceError {
    fn is_retryable(&self) -> bool {
        !matches!(self, RateSourceError::Timeout | RateSourceError::Cancelled)
    }
}

/// Why a retried operation ultimately failed.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("failed after {attempts} attempt(s): {last}")]
    Failed {
        attempts: u32,
        #[source]
        last: E,
    },

    #[error("operation timed out")]
    TimedOut,

    #[error("operation cancelled")]
    Cancelled,
}

impl<E> RetryError<E> {
    /// The error of the final attempt, if the sequence ran to exhaustion.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            RetryError::Failed { last, .. } => Some(last),
            _ => None,
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, runs out of
/// attempts, exceeds the policy deadline, or `cancel` fires.
///
/// Giving up drops the in-flight attempt, which aborts whatever IO it was
/// doing. The caller's token is observed but never cancelled here.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let max_attempts = policy.attempts();

    let attempts = async {
        let mut attempt = 1;
        loop {
            let outcome = match policy.attempt_timeout {
                Some(limit) => match tokio::time::timeout(limit, op()).await {
                    Ok(outcome) => outcome,
                    Err(_) => return Err(RetryError::TimedOut),
                },
                None => op().await,
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() || attempt >= max_attempts => {
                    return Err(RetryError::Failed { attempts: attempt, last: e });
                }
                Err(e) => {
                    let wait = policy.backoff(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        retry_in_ms = wait.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RetryError::Cancelled),
        outcome = tokio::time::timeout(policy.timeout, attempts) => {
            outcome.unwrap_or(Err(RetryError::TimedOut))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq, thiserror::Error)]
    enum TestError {
        #[error("boom #{0}")]
        Boom(u32),
        #[error("fatal")]
        Fatal,
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            !matches!(self, TestError::Fatal)
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(500),
            Duration::from_secs(10),
        )
    }

    /// Operation failing its first `failures` calls, then returning the call number.
    fn flaky(
        calls: &Arc<AtomicU32>,
        failures: u32,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<u32, TestError>> + Send>>
    {
        let calls = calls.clone();
        move || {
            let calls = calls.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= failures {
                    Err(TestError::Boom(n))
                } else {
                    Ok(n)
                }
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let calls = Arc::new(AtomicU32::new(0));

        let result = with_retry(&policy(3), &CancellationToken::new(), flaky(&calls, 2)).await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_propagates_last_error() {
        let calls = Arc::new(AtomicU32::new(0));

        let result = with_retry(&policy(2), &CancellationToken::new(), flaky(&calls, 2)).await;

        let err = result.unwrap_err();
        assert_eq!(err.last_error(), Some(&TestError::Boom(2)));
        match err {
            RetryError::Failed { attempts, last } => {
                assert_eq!(attempts, 2);
                assert_eq!(last, TestError::Boom(2));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_is_linear() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = tokio::time::Instant::now();

        with_retry(&policy(3), &CancellationToken::new(), flaky(&calls, 2))
            .await
            .unwrap();

        // 500ms after the first failure, 1000ms after the second
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1500), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1600), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = with_retry(&policy(5), &CancellationToken::new(), || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Fatal) }
        })
        .await;

        assert!(matches!(
            result,
            Err(RetryError::Failed {
                attempts: 1,
                last: TestError::Fatal
            })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overall_timeout_aborts_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let policy = RetryPolicy::new(5, Duration::from_millis(10), Duration::from_secs(1));

        let result: Result<(), RetryError<TestError>> =
            with_retry(&policy, &CancellationToken::new(), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                }
            })
            .await;

        assert!(matches!(result, Err(RetryError::TimedOut)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let policy = policy(5).with_attempt_timeout(Duration::from_millis(200));

        let result: Result<(), RetryError<TestError>> =
            with_retry(&policy, &CancellationToken::new(), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok(())
                }
            })
            .await;

        assert!(matches!(result, Err(RetryError::TimedOut)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_wins() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = with_retry(&policy(3), &cancel, flaky(&calls, 0)).await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result = with_retry(&policy(3), &cancel, flaky(&calls, 10)).await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_source_timeouts_are_not_retryable() {
        assert!(RateSourceError::Network("reset".into()).is_retryable());
        assert!(RateSourceError::Parse("bad".into()).is_retryable());
        assert!(!RateSourceError::Timeout.is_retryable());
        assert!(!RateSourceError::Cancelled.is_retryable());
    }
}
