//! Per-file JSON processing logs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::{lock, ResultSink};
use crate::types::{AttemptEvent, CallStatus, FileOutcome};

/// Writes `<file_id>_log.json` into a log directory for every finished file.
///
/// Failed attempts are buffered per file and written with the file's log.
/// Inside a tokio runtime the write runs on the blocking pool; call
/// [`flush`](Self::flush) to wait for outstanding writes.
pub struct JsonLogSink {
    log_dir: PathBuf,
    attempt_errors: Mutex<HashMap<String, Vec<String>>>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

/// Contents of one file's processing log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileLog {
    pub file_name: String,
    pub status: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub processing_time_secs: f64,
    pub total_chunks: usize,
    pub cleaned_chunks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    pub errors: Vec<String>,
    pub chunks_info: Vec<ChunkLogEntry>,
}

/// Per-chunk line in a [`FileLog`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkLogEntry {
    pub chunk_number: usize,
    pub line_range: (usize, usize),
    pub original_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleaned_length: Option<usize>,
    pub cleaned: bool,
    pub attempts: u32,
    pub status: String,
}

impl JsonLogSink {
    /// Create a sink writing into `log_dir`. The directory must exist.
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            attempt_errors: Mutex::new(HashMap::new()),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Path of the log for `file_id`.
    pub fn log_path(&self, file_id: &str) -> PathBuf {
        self.log_dir.join(format!("{}_log.json", file_id))
    }

    /// Wait for every log write started so far.
    pub async fn flush(&self) {
        let pending = std::mem::take(&mut *lock(&self.pending));
        for task in pending {
            if let Err(e) = task.await {
                error!(error = %e, "Processing log write task failed");
            }
        }
    }

    /// Build the log record for an outcome.
    pub fn build_log(outcome: &FileOutcome, attempt_errors: Vec<String>) -> FileLog {
        let status = if outcome.success {
            "completed"
        } else if outcome.cleaned_text.is_some() {
            "completed_with_errors"
        } else {
            "failed"
        };

        let mut errors = attempt_errors;
        errors.extend(outcome.chunk_outcomes.iter().filter_map(|r| {
            r.problem()
                .map(|p| format!("Chunk {}: {}", r.chunk.number(), p))
        }));
        if let Some(err) = &outcome.error {
            errors.push(err.clone());
        }

        let chunks_info = outcome
            .chunk_outcomes
            .iter()
            .map(|r| ChunkLogEntry {
                chunk_number: r.chunk.number(),
                line_range: r.chunk.line_range,
                original_length: r.chunk.len(),
                cleaned_length: r.cleaned_text().map(str::len),
                cleaned: r.is_success(),
                attempts: r.attempts,
                status: match &r.status {
                    CallStatus::Success(_) => "success".to_string(),
                    CallStatus::Filtered(_) => "filtered".to_string(),
                    CallStatus::Failed(f) => f.kind.to_string(),
                },
            })
            .collect();

        FileLog {
            file_name: outcome.file_id.clone(),
            status: status.to_string(),
            start_time: outcome.started_at,
            end_time: outcome.finished_at,
            processing_time_secs: outcome.processing_time().as_secs_f64(),
            total_chunks: outcome.total_chunks(),
            cleaned_chunks: outcome.cleaned_chunks(),
            output_path: outcome.output_path.clone(),
            errors,
            chunks_info,
        }
    }
}

impl ResultSink for JsonLogSink {
    fn record_attempt(&self, event: &AttemptEvent) {
        lock(&self.attempt_errors)
            .entry(event.file_id.clone())
            .or_default()
            .push(format!(
                "Chunk {} attempt {}: {}",
                event.chunk_index + 1,
                event.attempt,
                event.error
            ));
    }

    fn record_file(&self, outcome: &FileOutcome) {
        let attempt_errors = lock(&self.attempt_errors)
            .remove(&outcome.file_id)
            .unwrap_or_default();
        let log = Self::build_log(outcome, attempt_errors);
        let path = self.log_path(&outcome.file_id);
        let file_id = outcome.file_id.clone();

        let json = match serde_json::to_string_pretty(&log) {
            Ok(json) => json,
            Err(e) => {
                error!(file = %file_id, error = %e, "Failed to serialize processing log");
                return;
            }
        };

        match Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn_blocking(move || write_log(&file_id, &path, &json));
                let mut pending = lock(&self.pending);
                pending.retain(|t| !t.is_finished());
                pending.push(task);
            }
            Err(_) => write_log(&file_id, &path, &json),
        }
    }
}

fn write_log(file_id: &str, path: &Path, json: &str) {
    match std::fs::write(path, json) {
        Ok(()) => debug!(file = %file_id, path = %path.display(), "Wrote processing log"),
        Err(e) => error!(
            file = %file_id,
            path = %path.display(),
            error = %e,
            "Failed to write processing log"
        ),
    }
}
