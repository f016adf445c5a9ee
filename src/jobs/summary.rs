//! Run-level summary statistics.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::error::{CleanerError, Result};
use crate::types::FileOutcome;

/// Name of the summary file written into the log directory.
pub const SUMMARY_FILE_NAME: &str = "processing_summary.txt";

/// Below this share of cleaned chunks the run ends with a review note.
pub const LOW_CLEANING_PERCENTAGE: f64 = 50.0;

/// Aggregate result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub total_files: usize,
    pub successful_files: usize,
    pub failed_files: Vec<String>,
    pub total_chunks: usize,
    pub cleaned_chunks: usize,
    pub elapsed: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl RunSummary {
    /// Summarize a set of outcomes.
    pub fn from_outcomes(run_id: Uuid, outcomes: &[FileOutcome], elapsed: Duration) -> Self {
        let mut failed_files: Vec<String> = outcomes
            .iter()
            .filter(|o| !o.success)
            .map(|o| o.file_id.clone())
            .collect();
        failed_files.sort();

        Self {
            run_id,
            total_files: outcomes.len(),
            successful_files: outcomes.len() - failed_files.len(),
            failed_files,
            total_chunks: outcomes.iter().map(FileOutcome::total_chunks).sum(),
            cleaned_chunks: outcomes.iter().map(FileOutcome::cleaned_chunks).sum(),
            elapsed,
            output_dir: None,
            log_dir: None,
        }
    }

    /// Record where outputs and logs were written.
    pub fn with_locations(mut self, output_dir: &Path, log_dir: &Path) -> Self {
        self.output_dir = Some(output_dir.to_path_buf());
        self.log_dir = Some(log_dir.to_path_buf());
        self
    }

    pub fn not_cleaned_chunks(&self) -> usize {
        self.total_chunks - self.cleaned_chunks
    }

    /// Share of chunks cleaned, as a percentage. Zero when there were none.
    pub fn cleaning_percentage(&self) -> f64 {
        if self.total_chunks == 0 {
            0.0
        } else {
            self.cleaned_chunks as f64 / self.total_chunks as f64 * 100.0
        }
    }

    /// Note to print after the summary when few chunks were cleaned.
    pub fn advisory(&self) -> Option<&'static str> {
        if self.total_chunks > 0 && self.cleaning_percentage() < LOW_CLEANING_PERCENTAGE {
            Some(
                "Note: Less than 50% of chunks were cleaned. You may want to review the \
                 content filtering settings or the nature of your input text.",
            )
        } else {
            None
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed_files.is_empty()
    }

    /// Write the human-readable summary to `dir/processing_summary.txt`.
    pub async fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(SUMMARY_FILE_NAME);
        tokio::fs::write(&path, self.to_string())
            .await
            .map_err(|source| CleanerError::FileWriteError {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let per_file = if self.total_files == 0 {
            0.0
        } else {
            self.elapsed.as_secs_f64() / self.total_files as f64
        };

        writeln!(f, "Processing Summary (run {})", self.run_id)?;
        writeln!(f, "-------------------")?;
        writeln!(f, "Total files processed: {}", self.total_files)?;
        writeln!(f, "Successfully processed files: {}", self.successful_files)?;
        writeln!(f, "Failed files: {}", self.failed_files.len())?;
        for name in &self.failed_files {
            writeln!(f, "  - {}", name)?;
        }
        writeln!(f)?;
        writeln!(f, "Chunk Statistics:")?;
        writeln!(f, "-----------------")?;
        writeln!(f, "Total chunks: {}", self.total_chunks)?;
        writeln!(f, "Cleaned chunks: {}", self.cleaned_chunks)?;
        writeln!(f, "Not cleaned chunks: {}", self.not_cleaned_chunks())?;
        writeln!(f, "Percentage of chunks cleaned: {:.2}%", self.cleaning_percentage())?;
        writeln!(f)?;
        writeln!(f, "Performance:")?;
        writeln!(f, "------------")?;
        writeln!(f, "Total processing time: {:.2} seconds", self.elapsed.as_secs_f64())?;
        writeln!(f, "Average time per file: {:.2} seconds", per_file)?;

        if let (Some(output_dir), Some(log_dir)) = (&self.output_dir, &self.log_dir) {
            writeln!(f)?;
            writeln!(f, "Output Locations:")?;
            writeln!(f, "-----------------")?;
            writeln!(f, "Cleaned text files are saved in: {}", output_dir.display())?;
            writeln!(f, "Processing logs are saved in: {}", log_dir.display())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CallResult, Chunk};
    use chrono::Utc;

    fn outcome(id: &str, cleaned: usize, total: usize) -> FileOutcome {
        let results: Vec<CallResult> = (0..total)
            .map(|i| {
                let chunk = Chunk::new(id, i, total, (i, i + 1), "x".into());
                if i < cleaned {
                    CallResult::success(chunk, "x".into(), 1)
                } else {
                    CallResult::filtered(chunk, "policy".into(), 1)
                }
            })
            .collect();
        let now = Utc::now();
        FileOutcome {
            file_id: id.into(),
            source_path: None,
            output_path: None,
            cleaned_text: Some(String::new()),
            success: cleaned == total,
            chunk_outcomes: results,
            error: None,
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn test_from_outcomes_counts() {
        let outcomes = vec![outcome("a", 3, 3), outcome("b", 1, 4)];
        let summary = RunSummary::from_outcomes(Uuid::new_v4(), &outcomes, Duration::from_secs(10));

        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.successful_files, 1);
        assert_eq!(summary.failed_files, vec!["b".to_string()]);
        assert_eq!(summary.total_chunks, 7);
        assert_eq!(summary.cleaned_chunks, 4);
        assert_eq!(summary.not_cleaned_chunks(), 3);
        assert!((summary.cleaning_percentage() - 57.142857).abs() < 1e-4);
        assert!(!summary.all_succeeded());
    }

    #[test]
    fn test_advisory_below_half_cleaned() {
        let low = RunSummary::from_outcomes(Uuid::new_v4(), &[outcome("a", 1, 3)], Duration::ZERO);
        assert!(low.advisory().unwrap().starts_with("Note: Less than 50%"));

        let half = RunSummary::from_outcomes(Uuid::new_v4(), &[outcome("a", 2, 4)], Duration::ZERO);
        assert_eq!(half.advisory(), None);

        let empty = RunSummary::from_outcomes(Uuid::new_v4(), &[], Duration::ZERO);
        assert_eq!(empty.advisory(), None);
    }

    #[test]
    fn test_empty_run() {
        let summary = RunSummary::from_outcomes(Uuid::new_v4(), &[], Duration::ZERO);
        assert_eq!(summary.cleaning_percentage(), 0.0);
        assert!(summary.to_string().contains("Average time per file: 0.00 seconds"));
    }

    #[tokio::test]
    async fn test_write_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let summary = RunSummary::from_outcomes(Uuid::new_v4(), &[outcome("a", 1, 1)], Duration::from_secs(2))
            .with_locations(Path::new("/out"), dir.path());

        let path = summary.write_to(dir.path()).await.unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("Successfully processed files: 1"));
        assert!(text.contains("Cleaned text files are saved in: /out"));
    }
}
