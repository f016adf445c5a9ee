//! Per-file processing: chunk, clean, reassemble.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::pool::WorkerPool;
use crate::chunkers::LineChunker;
use crate::output::{ResultSink, TracingSink};
use crate::processing::write_cleaned;
use crate::reliability::RetryingCaller;
use crate::types::{CallResult, Chunk, ChunkFailure, Document, FileOutcome, UncleanChunkPolicy};

/// Processor that cleans one document at a time.
///
/// Chunks of a document are submitted together and complete in any order;
/// the reassembled text always follows chunk index order.
#[derive(Clone)]
pub struct ChunkProcessor {
    chunker: LineChunker,
    caller: RetryingCaller,
    pool: WorkerPool,
    policy: UncleanChunkPolicy,
    sink: Arc<dyn ResultSink>,
    output_dir: Option<PathBuf>,
    cancel: CancellationToken,
}

impl ChunkProcessor {
    /// Create a new processor.
    pub fn new(chunker: LineChunker, caller: RetryingCaller, pool: WorkerPool) -> Self {
        Self {
            chunker,
            caller,
            pool,
            policy: UncleanChunkPolicy::default(),
            sink: Arc::new(TracingSink),
            output_dir: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Set how filtered and failed chunks are reassembled.
    pub fn with_policy(mut self, policy: UncleanChunkPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the sink receiving chunk and file events.
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Write `<id>_cleaned.txt` into `dir` for every processed file.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Set the run-level cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn sink(&self) -> &Arc<dyn ResultSink> {
        &self.sink
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Clean a document and emit its outcome to the sink.
    pub async fn process(&self, document: Document) -> FileOutcome {
        let started_at = Utc::now();
        let chunks = self.chunker.chunk(&document);

        info!(
            file = %document.id,
            lines = document.line_count(),
            chunks = chunks.len(),
            "Processing file"
        );

        let mut pending: FuturesUnordered<_> = chunks
            .into_iter()
            .map(|chunk| self.process_chunk(chunk))
            .collect();

        let mut results = Vec::with_capacity(pending.len());
        while let Some(result) = pending.next().await {
            self.sink.record_chunk(&result);
            results.push(result);
        }

        let mut outcome = self.assemble(&document, results, started_at);

        if let (Some(dir), Some(text)) = (&self.output_dir, &outcome.cleaned_text) {
            match write_cleaned(dir, &outcome.file_id, text).await {
                Ok(path) => outcome.output_path = Some(path),
                Err(e) => {
                    error!(file = %outcome.file_id, error = %e, "Failed to write cleaned text");
                    outcome = outcome.with_error(e);
                }
            }
        }

        outcome.finished_at = Utc::now();
        self.sink.record_file(&outcome);
        outcome
    }

    /// Clean one chunk while holding a worker slot.
    async fn process_chunk(&self, chunk: Chunk) -> CallResult {
        let _worker = match self.pool.acquire(&self.cancel).await {
            Ok(permit) => permit,
            Err(_) => return CallResult::failed(chunk, ChunkFailure::cancelled(), 0),
        };
        self.caller.call(chunk).await
    }

    /// Order results by chunk index and join their text.
    fn assemble(
        &self,
        document: &Document,
        mut results: Vec<CallResult>,
        started_at: DateTime<Utc>,
    ) -> FileOutcome {
        results.sort_by_key(|r| r.chunk.index);

        let success = results.iter().all(CallResult::is_success);
        let mut cleaned_text = results
            .iter()
            .filter_map(|r| self.policy.render(r))
            .collect::<Vec<_>>()
            .join("\n");
        if document.trailing_newline && !cleaned_text.is_empty() {
            cleaned_text.push('\n');
        }

        FileOutcome {
            file_id: document.id.clone(),
            source_path: document.path.clone(),
            output_path: None,
            cleaned_text: Some(cleaned_text),
            chunk_outcomes: results,
            success,
            error: None,
            started_at,
            finished_at: Utc::now(),
        }
    }
}
