//! Multi-file scheduling.

use std::path::PathBuf;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use super::processor::ChunkProcessor;
use crate::processing::{read_document, unique_ids};
use crate::types::{Document, FileOutcome};

/// A file to be cleaned: either a path still to be read or a loaded document.
#[derive(Debug, Clone)]
pub enum WorkItem {
    File { id: String, path: PathBuf },
    Document(Document),
}

impl WorkItem {
    /// Build file items whose ids are unique across `paths`.
    pub fn from_paths(paths: Vec<PathBuf>) -> Vec<WorkItem> {
        let ids = unique_ids(&paths);
        ids.into_iter()
            .zip(paths)
            .map(|(id, path)| WorkItem::File { id, path })
            .collect()
    }

    /// Identifier used in logs, outcomes and output file names.
    pub fn id(&self) -> String {
        match self {
            WorkItem::File { id, .. } => id.clone(),
            WorkItem::Document(doc) => doc.id.clone(),
        }
    }

    fn source_path(&self) -> Option<PathBuf> {
        match self {
            WorkItem::File { path, .. } => Some(path.clone()),
            WorkItem::Document(doc) => doc.path.clone(),
        }
    }
}

/// Runs a [`ChunkProcessor`] across many files concurrently.
///
/// At most `concurrency` files are in progress at once; chunk calls are
/// further bounded by the processor's shared worker pool. A failure in one
/// file never affects another.
#[derive(Clone)]
pub struct FileScheduler {
    processor: ChunkProcessor,
    concurrency: usize,
}

impl FileScheduler {
    /// Create a new scheduler. `concurrency` is clamped to at least 1.
    pub fn new(processor: ChunkProcessor, concurrency: usize) -> Self {
        Self {
            processor,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Clean every item, returning outcomes in completion order.
    pub async fn run(&self, items: Vec<WorkItem>) -> Vec<FileOutcome> {
        let total_items = items.len();
        info!(total_items, concurrency = self.concurrency, "Starting run");

        let outcomes: Vec<FileOutcome> = stream::iter(items)
            .map(|item| {
                let id = item.id();
                let source_path = item.source_path();
                let this = self.clone();
                let handle = tokio::spawn(async move { this.run_item(item).await });
                async move {
                    match handle.await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            error!(file = %id, error = %e, "File task panicked");
                            let outcome = FileOutcome::file_error(
                                id,
                                source_path,
                                format!("processing task failed: {}", e),
                                Utc::now(),
                            );
                            self.processor.sink().record_file(&outcome);
                            outcome
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let succeeded = outcomes.iter().filter(|o| o.success).count();
        info!(
            total_items,
            succeeded,
            failed = total_items - succeeded,
            "Run complete"
        );

        outcomes
    }

    /// Clean in-memory documents.
    pub async fn run_documents(&self, documents: Vec<Document>) -> Vec<FileOutcome> {
        self.run(documents.into_iter().map(WorkItem::Document).collect())
            .await
    }

    /// Read and clean files from disk.
    pub async fn run_paths(&self, paths: Vec<PathBuf>) -> Vec<FileOutcome> {
        self.run(WorkItem::from_paths(paths)).await
    }

    async fn run_item(&self, item: WorkItem) -> FileOutcome {
        let started_at = Utc::now();
        let id = item.id();

        if self.processor.cancellation().is_cancelled() {
            warn!(file = %id, "Run cancelled, skipping file");
            let outcome =
                FileOutcome::file_error(id, item.source_path(), "operation cancelled", started_at);
            self.processor.sink().record_file(&outcome);
            return outcome;
        }

        let document = match item {
            WorkItem::Document(doc) => doc,
            WorkItem::File { path, .. } => match read_document(&path).await {
                Ok(doc) => doc.with_id(id),
                Err(e) => {
                    error!(file = %id, error = %e, "Failed to read file");
                    let outcome = FileOutcome::file_error(id, Some(path), e, started_at);
                    self.processor.sink().record_file(&outcome);
                    return outcome;
                }
            },
        };

        self.processor.process(document).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunkers::LineChunker;
    use crate::cleaning::{CleanError, CleanRequest, CleaningClient};
    use crate::jobs::WorkerPool;
    use crate::output::MemorySink;
    use crate::reliability::{RateLimiter, RetryingCaller};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    struct EchoClient;

    #[async_trait]
    impl CleaningClient for EchoClient {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn clean(&self, request: CleanRequest<'_>) -> Result<String, CleanError> {
            Ok(request.raw_text.to_string())
        }
    }

    fn scheduler(sink: Arc<MemorySink>, cancel: CancellationToken) -> FileScheduler {
        let limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(1)).unwrap());
        let caller = RetryingCaller::new(Arc::new(EchoClient), limiter, 2)
            .with_cancellation(cancel.clone());
        let processor = ChunkProcessor::new(
            LineChunker::new(2).unwrap(),
            caller,
            WorkerPool::new(2).unwrap(),
        )
        .with_sink(sink)
        .with_cancellation(cancel);
        FileScheduler::new(processor, 2)
    }

    #[tokio::test]
    async fn test_unreadable_file_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.txt");
        std::fs::write(&good, "a\nb\nc").unwrap();
        let missing = dir.path().join("missing.txt");

        let sink = Arc::new(MemorySink::new());
        let outcomes = scheduler(sink.clone(), CancellationToken::new())
            .run_paths(vec![missing, good])
            .await;

        assert_eq!(outcomes.len(), 2);
        let good = outcomes.iter().find(|o| o.file_id == "good").unwrap();
        let missing = outcomes.iter().find(|o| o.file_id == "missing").unwrap();
        assert!(good.success);
        assert_eq!(good.cleaned_text.as_deref(), Some("a\nb\nc"));
        assert!(!missing.success);
        assert!(missing.error.as_deref().unwrap().contains("failed to read"));
        assert_eq!(sink.files().len(), 2);
    }

    #[tokio::test]
    async fn test_same_stem_files_get_distinct_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let lower = dir.path().join("book.txt");
        let upper = dir.path().join("book.TXT");
        std::fs::write(&lower, "lower\n").unwrap();
        std::fs::write(&upper, "upper\n").unwrap();
        let output_dir = dir.path().join("cleaned_text");
        std::fs::create_dir(&output_dir).unwrap();

        let limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(1)).unwrap());
        let processor = ChunkProcessor::new(
            LineChunker::new(2).unwrap(),
            RetryingCaller::new(Arc::new(EchoClient), limiter, 2),
            WorkerPool::new(2).unwrap(),
        )
        .with_output_dir(&output_dir);
        let outcomes = FileScheduler::new(processor, 2)
            .run_paths(vec![lower, upper])
            .await;

        let mut ids: Vec<&str> = outcomes.iter().map(|o| o.file_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["book", "book_2"]);
        assert!(outcomes.iter().all(|o| o.success));
        assert_eq!(
            std::fs::read_to_string(output_dir.join("book_cleaned.txt")).unwrap(),
            "lower\n"
        );
        assert_eq!(
            std::fs::read_to_string(output_dir.join("book_2_cleaned.txt")).unwrap(),
            "upper\n"
        );
    }

    #[tokio::test]
    async fn test_cancelled_run_still_reports_every_file() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let docs = vec![
            Document::from_text("one", "x"),
            Document::from_text("two", "y"),
            Document::from_text("three", "z"),
        ];
        let outcomes = scheduler(Arc::new(MemorySink::new()), cancel)
            .run_documents(docs)
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| !o.success && o.chunk_outcomes.is_empty()));
    }
}
