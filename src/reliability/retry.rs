//! Bounded retry around a single chunk-cleaning call.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::backoff::{Backoff, ExponentialBackoff, Sleeper, TokioSleeper};
use super::rate_limiter::RateLimiter;
use crate::cleaning::{CleanContext, CleanRequest, CleaningClient, FailureClass};
use crate::output::{ResultSink, TracingSink};
use crate::types::{AttemptEvent, CallResult, Chunk, ChunkFailure, FailureKind};

/// Calls the cleaning service for one chunk, retrying transient failures.
///
/// Every attempt, including retries, first takes a permit from the shared
/// [`RateLimiter`]. The outcome is always a [`CallResult`]; failures are data,
/// never errors.
#[derive(Clone)]
pub struct RetryingCaller {
    client: Arc<dyn CleaningClient>,
    limiter: Arc<RateLimiter>,
    backoff: Arc<dyn Backoff>,
    sleeper: Arc<dyn Sleeper>,
    sink: Arc<dyn ResultSink>,
    max_attempts: u32,
    cancel: CancellationToken,
}

impl RetryingCaller {
    /// Create a caller with jittered exponential backoff, the tokio timer and
    /// a tracing sink. `max_attempts` is clamped to at least 1.
    pub fn new(
        client: Arc<dyn CleaningClient>,
        limiter: Arc<RateLimiter>,
        max_attempts: u32,
    ) -> Self {
        Self {
            client,
            limiter,
            backoff: Arc::new(ExponentialBackoff::default()),
            sleeper: Arc::new(TokioSleeper),
            sink: Arc::new(TracingSink),
            max_attempts: max_attempts.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Set the backoff policy.
    pub fn with_backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the sleeper used between attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Set the sink receiving attempt events.
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Set the run-level cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Clean one chunk.
    pub async fn call(&self, chunk: Chunk) -> CallResult {
        let context = CleanContext {
            file_id: chunk.file_id.clone(),
            chunk_number: chunk.number(),
            total_chunks: chunk.total_chunks,
        };
        let mut attempt: u32 = 0;

        loop {
            let permit = match self.limiter.acquire_cancellable(&self.cancel).await {
                Ok(permit) => permit,
                Err(_) => return CallResult::failed(chunk, ChunkFailure::cancelled(), attempt),
            };
            attempt += 1;

            debug!(
                file = %chunk.file_id,
                chunk = chunk.number(),
                total = chunk.total_chunks,
                attempt,
                in_window = permit.in_window,
                client = self.client.name(),
                "Cleaning chunk"
            );

            let request = CleanRequest {
                raw_text: &chunk.raw_text,
                context: Some(&context),
            };

            let err = match self.client.clean(request).await {
                Ok(cleaned) => return CallResult::success(chunk, cleaned, attempt),
                Err(err) => err,
            };

            let class = err.class();
            let retry_in = match class {
                FailureClass::Retryable if attempt < self.max_attempts => {
                    Some(self.backoff.delay(attempt))
                }
                _ => None,
            };

            self.sink.record_attempt(&AttemptEvent {
                file_id: chunk.file_id.clone(),
                chunk_index: chunk.index,
                attempt,
                class,
                error: err.to_string(),
                retry_in,
            });

            match (class, retry_in) {
                (FailureClass::Filtered, _) => {
                    warn!(
                        file = %chunk.file_id,
                        chunk = chunk.number(),
                        "Content filter triggered, passing chunk through"
                    );
                    let reason = err.message().to_string();
                    return CallResult::filtered(chunk, reason, attempt);
                }
                (FailureClass::Fatal, _) => {
                    error!(
                        file = %chunk.file_id,
                        chunk = chunk.number(),
                        error = %err,
                        "Non-retryable error"
                    );
                    let failure = ChunkFailure::new(FailureKind::Fatal, err.to_string());
                    return CallResult::failed(chunk, failure, attempt);
                }
                (FailureClass::Retryable, Some(delay)) => {
                    if !self.pause(delay).await {
                        return CallResult::failed(chunk, ChunkFailure::cancelled(), attempt);
                    }
                }
                (FailureClass::Retryable, None) => {
                    error!(
                        file = %chunk.file_id,
                        chunk = chunk.number(),
                        attempts = attempt,
                        error = %err,
                        "Retries exhausted"
                    );
                    let failure = ChunkFailure::new(FailureKind::RetryExhausted, err.to_string());
                    return CallResult::failed(chunk, failure, attempt);
                }
            }
        }
    }

    /// Sleep for `delay`; false if cancelled first.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = self.sleeper.sleep(delay) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaning::CleanError;
    use crate::output::MemorySink;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Fails with `error` for the first `failures` calls, then echoes the
    /// input upper-cased.
    struct FlakyClient {
        failures: u32,
        error: CleanError,
        calls: AtomicU32,
    }

    impl FlakyClient {
        fn new(failures: u32, error: CleanError) -> Self {
            Self {
                failures,
                error,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CleaningClient for FlakyClient {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn clean(&self, request: CleanRequest<'_>) -> Result<String, CleanError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(self.error.clone())
            } else {
                Ok(request.raw_text.to_uppercase())
            }
        }
    }

    /// Records requested delays without sleeping.
    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    fn chunk() -> Chunk {
        Chunk::new("doc", 0, 1, (0, 2), "hello\nworld".to_string())
    }

    fn limiter() -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(1000, Duration::from_secs(60)).unwrap())
    }

    fn caller(client: Arc<FlakyClient>, max_attempts: u32) -> (RetryingCaller, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(10))
            .without_jitter();
        let caller = RetryingCaller::new(client, limiter(), max_attempts)
            .with_backoff(Arc::new(backoff))
            .with_sleeper(sleeper.clone());
        (caller, sleeper)
    }

    #[tokio::test]
    async fn test_success_after_transient_failures() {
        for failures in 0..5 {
            let client = Arc::new(FlakyClient::new(failures, CleanError::Transient("503".into())));
            let (caller, _) = caller(client.clone(), 5);

            let result = caller.call(chunk()).await;
            assert_eq!(result.cleaned_text(), Some("HELLO\nWORLD"));
            assert_eq!(result.attempts, failures + 1);
            assert_eq!(client.calls(), failures + 1);
        }
    }

    #[tokio::test]
    async fn test_exhausts_after_exactly_max_attempts() {
        for failures in [5, 6, 50] {
            let client = Arc::new(FlakyClient::new(failures, CleanError::Transient("timeout".into())));
            let (caller, sleeper) = caller(client.clone(), 5);

            let result = caller.call(chunk()).await;
            assert_eq!(result.attempts, 5);
            assert_eq!(client.calls(), 5);
            match result.status {
                crate::types::CallStatus::Failed(failure) => {
                    assert_eq!(failure.kind, FailureKind::RetryExhausted);
                    assert!(failure.last_error.contains("timeout"));
                }
                other => panic!("expected failure, got {:?}", other),
            }

            let delays: Vec<u64> = sleeper.delays.lock().unwrap().iter().map(|d| d.as_secs()).collect();
            assert_eq!(delays, vec![1, 2, 4, 8]);
        }
    }

    #[tokio::test]
    async fn test_filtered_is_not_retried() {
        let client = Arc::new(FlakyClient::new(
            10,
            CleanError::ContentFiltered("output blocked".into()),
        ));
        let (caller, sleeper) = caller(client.clone(), 5);

        let result = caller.call(chunk()).await;
        assert_eq!(
            result.status,
            crate::types::CallStatus::Filtered("output blocked".into())
        );
        assert_eq!(result.attempts, 1);
        assert_eq!(client.calls(), 1);
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fatal_is_not_retried() {
        let client = Arc::new(FlakyClient::new(10, CleanError::Fatal("401".into())));
        let (caller, _) = caller(client.clone(), 5);

        let result = caller.call(chunk()).await;
        assert_eq!(result.attempts, 1);
        assert!(matches!(
            result.status,
            crate::types::CallStatus::Failed(ChunkFailure { kind: FailureKind::Fatal, .. })
        ));
    }

    #[tokio::test]
    async fn test_each_attempt_takes_a_permit_and_is_reported() {
        let client = Arc::new(FlakyClient::new(2, CleanError::Transient("429".into())));
        let sink = Arc::new(MemorySink::new());
        let (caller, _) = caller(client, 5);
        let caller = caller.with_sink(sink.clone());

        caller.call(chunk()).await;

        assert_eq!(caller.limiter().in_window().await, 3);
        let attempts: Vec<u32> = sink.attempts().iter().map(|e| e.attempt).collect();
        assert_eq!(attempts, vec![1, 2]);
        assert_eq!(sink.attempts()[0].retry_in, Some(Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_backoff() {
        let client = Arc::new(FlakyClient::new(10, CleanError::Transient("503".into())));
        let cancel = CancellationToken::new();
        let caller = RetryingCaller::new(client.clone(), limiter(), 5)
            .with_backoff(Arc::new(|_attempt: u32| Duration::from_secs(30)))
            .with_cancellation(cancel.clone());

        let handle = tokio::spawn(async move { caller.call(chunk()).await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        let result = handle.await.unwrap();
        assert_eq!(result.attempts, 1);
        assert_eq!(client.calls(), 1);
        assert!(matches!(
            result.status,
            crate::types::CallStatus::Failed(ChunkFailure { kind: FailureKind::Cancelled, .. })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let client = Arc::new(FlakyClient::new(0, CleanError::Transient("unused".into())));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let caller = RetryingCaller::new(client.clone(), limiter(), 5).with_cancellation(cancel);

        let result = caller.call(chunk()).await;
        assert_eq!(result.attempts, 0);
        assert_eq!(client.calls(), 0);
    }
}
