//! Progress bar over the files of a run.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::ResultSink;
use crate::types::FileOutcome;

const TEMPLATE: &str =
    "{spinner:.green} Overall Progress [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}";

/// Sink that advances a progress bar each time a file finishes.
pub struct ProgressSink {
    bar: ProgressBar,
}

impl ProgressSink {
    /// Create a bar over `total_files` files, drawn to stderr.
    pub fn new(total_files: usize) -> Self {
        let bar = ProgressBar::new(total_files as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }

    /// Create a bar that draws nothing.
    pub fn hidden(total_files: usize) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total_files as u64), ProgressDrawTarget::hidden());
        Self { bar }
    }

    /// Number of files finished so far.
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn length(&self) -> Option<u64> {
        self.bar.length()
    }

    /// Stop the bar, leaving a final message.
    pub fn finish(&self, message: impl Into<String>) {
        self.bar.finish_with_message(message.into());
    }
}

impl ResultSink for ProgressSink {
    fn record_file(&self, outcome: &FileOutcome) {
        self.bar.set_message(outcome.file_id.clone());
        self.bar.inc(1);
    }
}
