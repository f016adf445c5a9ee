//! Result sinks receiving attempt, chunk and file events.
//!
//! Sinks are best-effort: they return nothing and must never panic or block
//! processing. A sink that fails to persist something logs it and moves on.

mod json_log;
mod progress;

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::types::{AttemptEvent, CallResult, FileOutcome};

pub use json_log::{ChunkLogEntry, FileLog, JsonLogSink};
pub use progress::ProgressSink;

/// Receives structured events from the pipeline.
pub trait ResultSink: Send + Sync {
    /// A single failed attempt at cleaning a chunk.
    fn record_attempt(&self, event: &AttemptEvent) {
        let _ = event;
    }

    /// The final result for a chunk.
    fn record_chunk(&self, result: &CallResult) {
        let _ = result;
    }

    /// The terminal outcome for a file.
    fn record_file(&self, outcome: &FileOutcome);
}

/// Sink that writes every event to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ResultSink for TracingSink {
    fn record_attempt(&self, event: &AttemptEvent) {
        warn!(
            file = %event.file_id,
            chunk = event.chunk_index + 1,
            attempt = event.attempt,
            class = ?event.class,
            retry_in_ms = event.retry_in.map(|d| d.as_millis() as u64),
            error = %event.error,
            "Chunk attempt failed"
        );
    }

    fn record_chunk(&self, result: &CallResult) {
        match result.problem() {
            None => info!(
                file = %result.chunk.file_id,
                chunk = result.chunk.number(),
                total = result.chunk.total_chunks,
                attempts = result.attempts,
                "Chunk cleaned"
            ),
            Some(problem) => warn!(
                file = %result.chunk.file_id,
                chunk = result.chunk.number(),
                total = result.chunk.total_chunks,
                attempts = result.attempts,
                problem = %problem,
                "Chunk not cleaned"
            ),
        }
    }

    fn record_file(&self, outcome: &FileOutcome) {
        info!(
            file = %outcome.file_id,
            success = outcome.success,
            chunks = outcome.total_chunks(),
            cleaned = outcome.cleaned_chunks(),
            elapsed_ms = outcome.processing_time().as_millis() as u64,
            error = outcome.error.as_deref().unwrap_or(""),
            "File finished"
        );
    }
}

/// Forwards every event to each inner sink in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ResultSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    pub fn with(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl ResultSink for FanoutSink {
    fn record_attempt(&self, event: &AttemptEvent) {
        for sink in &self.sinks {
            sink.record_attempt(event);
        }
    }

    fn record_chunk(&self, result: &CallResult) {
        for sink in &self.sinks {
            sink.record_chunk(result);
        }
    }

    fn record_file(&self, outcome: &FileOutcome) {
        for sink in &self.sinks {
            sink.record_file(outcome);
        }
    }
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    attempts: Mutex<Vec<AttemptEvent>>,
    chunks: Mutex<Vec<CallResult>>,
    files: Mutex<Vec<FileOutcome>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> Vec<AttemptEvent> {
        lock(&self.attempts).clone()
    }

    pub fn chunks(&self) -> Vec<CallResult> {
        lock(&self.chunks).clone()
    }

    pub fn files(&self) -> Vec<FileOutcome> {
        lock(&self.files).clone()
    }
}

impl ResultSink for MemorySink {
    fn record_attempt(&self, event: &AttemptEvent) {
        lock(&self.attempts).push(event.clone());
    }

    fn record_chunk(&self, result: &CallResult) {
        lock(&self.chunks).push(result.clone());
    }

    fn record_file(&self, outcome: &FileOutcome) {
        lock(&self.files).push(outcome.clone());
    }
}

/// Lock a sink mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;
    use chrono::Utc;

    #[test]
    fn test_fanout_reaches_every_sink() {
        let first = Arc::new(MemorySink::new());
        let second = Arc::new(MemorySink::new());
        let fanout = FanoutSink::new()
            .with(first.clone())
            .with(Arc::new(TracingSink))
            .with(second.clone());

        let chunk = Chunk::new("doc", 0, 1, (0, 1), "x".into());
        fanout.record_chunk(&CallResult::success(chunk, "x".into(), 1));
        fanout.record_file(&FileOutcome::file_error("doc", None, "boom", Utc::now()));

        assert_eq!(first.chunks().len(), 1);
        assert_eq!(second.files().len(), 1);
        assert!(second.attempts().is_empty());
    }
}
