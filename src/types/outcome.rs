//! Per-chunk and per-file outcome records.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Chunk;
use crate::cleaning::FailureClass;

/// Why a chunk ended up `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Every allowed attempt failed with a transient error
    RetryExhausted,
    /// The cleaning service rejected the request in a way retries cannot fix
    Fatal,
    /// The run was cancelled before the chunk completed
    Cancelled,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::RetryExhausted => write!(f, "retry_exhausted"),
            FailureKind::Fatal => write!(f, "fatal"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Terminal failure of a single chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub kind: FailureKind,
    /// The last error observed before giving up
    pub last_error: String,
}

impl ChunkFailure {
    pub fn new(kind: FailureKind, last_error: impl Into<String>) -> Self {
        Self {
            kind,
            last_error: last_error.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "operation cancelled")
    }
}

/// Final status of a chunk-cleaning call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum CallStatus {
    /// The service returned cleaned text
    Success(String),
    /// The service refused the content on policy grounds
    Filtered(String),
    /// The call could not be completed
    Failed(ChunkFailure),
}

/// Outcome of cleaning one chunk, including how many attempts it took.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallResult {
    pub chunk: Chunk,
    pub status: CallStatus,
    pub attempts: u32,
}

impl CallResult {
    pub fn success(chunk: Chunk, cleaned_text: String, attempts: u32) -> Self {
        Self {
            chunk,
            status: CallStatus::Success(cleaned_text),
            attempts,
        }
    }

    pub fn filtered(chunk: Chunk, reason: String, attempts: u32) -> Self {
        Self {
            chunk,
            status: CallStatus::Filtered(reason),
            attempts,
        }
    }

    pub fn failed(chunk: Chunk, failure: ChunkFailure, attempts: u32) -> Self {
        Self {
            chunk,
            status: CallStatus::Failed(failure),
            attempts,
        }
    }

    /// Check if the chunk was cleaned successfully.
    pub fn is_success(&self) -> bool {
        matches!(self.status, CallStatus::Success(_))
    }

    /// The cleaned text, if the call succeeded.
    pub fn cleaned_text(&self) -> Option<&str> {
        match &self.status {
            CallStatus::Success(text) => Some(text),
            _ => None,
        }
    }

    /// Short human-readable description of a non-success status.
    pub fn problem(&self) -> Option<String> {
        match &self.status {
            CallStatus::Success(_) => None,
            CallStatus::Filtered(reason) => Some(format!("content filtered: {}", reason)),
            CallStatus::Failed(failure) => Some(format!("{}: {}", failure.kind, failure.last_error)),
        }
    }
}

/// A single failed attempt, reported before any retry happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptEvent {
    pub file_id: String,
    pub chunk_index: usize,
    /// 1-based attempt number
    pub attempt: u32,
    pub class: FailureClass,
    pub error: String,
    /// Backoff before the next attempt, when one will be made
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_in: Option<Duration>,
}

/// Terminal record for one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOutcome {
    pub file_id: String,

    /// Input path, when the file was read from disk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,

    /// Where the cleaned text was written, if it was
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,

    /// Reassembled text, `None` when the file never got that far
    pub cleaned_text: Option<String>,

    /// Chunk results in index order
    pub chunk_outcomes: Vec<CallResult>,

    /// True only if every chunk succeeded and no file-level error occurred
    pub success: bool,

    /// File-level error (read/write failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl FileOutcome {
    /// Outcome for a file that failed before or after chunk processing.
    pub fn file_error(
        file_id: impl Into<String>,
        source_path: Option<PathBuf>,
        error: impl std::fmt::Display,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            source_path,
            output_path: None,
            cleaned_text: None,
            chunk_outcomes: Vec::new(),
            success: false,
            error: Some(error.to_string()),
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Total number of chunks processed for this file.
    pub fn total_chunks(&self) -> usize {
        self.chunk_outcomes.len()
    }

    /// Number of chunks the service cleaned successfully.
    pub fn cleaned_chunks(&self) -> usize {
        self.chunk_outcomes.iter().filter(|r| r.is_success()).count()
    }

    /// Wall-clock time spent on this file.
    pub fn processing_time(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// Mark the file as failed with a file-level error.
    pub fn with_error(mut self, error: impl std::fmt::Display) -> Self {
        self.success = false;
        self.error = Some(error.to_string());
        self
    }
}
