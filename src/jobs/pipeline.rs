//! Wiring of the shared run components from configuration.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::pool::WorkerPool;
use super::processor::ChunkProcessor;
use super::scheduler::FileScheduler;
use crate::chunkers::LineChunker;
use crate::cleaning::CleaningClient;
use crate::error::Result;
use crate::output::{ResultSink, TracingSink};
use crate::reliability::{Backoff, ExponentialBackoff, RateLimiter, RetryingCaller, Sleeper};
use crate::types::CleanerConfig;

/// Builder for a [`FileScheduler`].
///
/// One rate limiter, one worker pool, one sink and one cancellation token
/// are created here and shared by every file the scheduler runs.
pub struct PipelineBuilder {
    config: CleanerConfig,
    client: Arc<dyn CleaningClient>,
    sink: Arc<dyn ResultSink>,
    cancel: CancellationToken,
    output_dir: Option<PathBuf>,
    backoff: Option<Arc<dyn Backoff>>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl PipelineBuilder {
    /// Create a new builder.
    pub fn new(config: CleanerConfig, client: Arc<dyn CleaningClient>) -> Self {
        Self {
            config,
            client,
            sink: Arc::new(TracingSink),
            cancel: CancellationToken::new(),
            output_dir: None,
            backoff: None,
            sleeper: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Override the backoff policy built from the config.
    pub fn with_backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.backoff = Some(backoff);
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Validate the config and build the scheduler.
    pub fn build(self) -> Result<FileScheduler> {
        self.config.validate()?;

        let limiter = Arc::new(RateLimiter::new(
            self.config.max_calls_per_window,
            self.config.window(),
        )?);
        let backoff = self.backoff.unwrap_or_else(|| {
            Arc::new(ExponentialBackoff::new(
                self.config.base_backoff(),
                self.config.max_backoff(),
            ))
        });

        let mut caller = RetryingCaller::new(self.client, limiter, self.config.max_retry_attempts)
            .with_backoff(backoff)
            .with_sink(self.sink.clone())
            .with_cancellation(self.cancel.clone());
        if let Some(sleeper) = self.sleeper {
            caller = caller.with_sleeper(sleeper);
        }

        let concurrency = self.config.effective_concurrency();
        let mut processor = ChunkProcessor::new(
            LineChunker::new(self.config.max_lines_per_chunk)?,
            caller,
            WorkerPool::new(concurrency)?,
        )
        .with_policy(self.config.unclean_chunk_policy)
        .with_sink(self.sink)
        .with_cancellation(self.cancel);
        if let Some(dir) = self.output_dir {
            processor = processor.with_output_dir(dir);
        }

        info!(
            max_calls = self.config.max_calls_per_window,
            window_secs = self.config.window_seconds,
            max_lines = self.config.max_lines_per_chunk,
            max_attempts = self.config.max_retry_attempts,
            concurrency,
            "Pipeline ready"
        );

        Ok(FileScheduler::new(processor, concurrency))
    }
}
