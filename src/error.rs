//! Error taxonomy for the cleaning pipeline.
//!
//! [`CleanerError`] covers run- and file-level failures. Only
//! `InvalidConfiguration` aborts a run. Chunk-level failures are data, not
//! errors: content filtering and transient call errors are reported by the
//! collaborator as [`CleanError`](crate::cleaning::CleanError), and a chunk
//! that used up its attempts ends as
//! [`FailureKind::RetryExhausted`](crate::types::FailureKind) in its
//! [`CallResult`](crate::types::CallResult).

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the cleaning pipeline.
#[derive(Debug, Error)]
pub enum CleanerError {
    /// A configuration value is out of range. Aborts the run before processing.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The input file could not be read or decoded.
    #[error("failed to read {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cleaned output could not be written.
    #[error("failed to write {path}: {source}")]
    FileWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input path holds no `.txt` files.
    #[error("no .txt files found at {0}")]
    NoInputFiles(PathBuf),

    /// The run was cancelled before the operation completed.
    #[error("operation cancelled")]
    Cancelled,
}

impl CleanerError {
    /// Shorthand for building an [`CleanerError::InvalidConfiguration`].
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }
}

/// Result alias used throughout the library.
pub type Result<T, E = CleanerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_message() {
        let err = CleanerError::invalid_config("max_lines must be > 0");
        assert_eq!(err.to_string(), "invalid configuration: max_lines must be > 0");
    }

    #[test]
    fn test_file_errors_name_the_path() {
        let err = CleanerError::FileReadError {
            path: PathBuf::from("/tmp/book.txt"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("/tmp/book.txt"));
    }
}
