//! The text-cleaning collaborator.
//!
//! The pipeline treats cleaning as an opaque remote call behind the
//! [`CleaningClient`] trait. Implementations report failures as
//! [`CleanError`], which the retry layer classifies into a [`FailureClass`].

mod anthropic_client;
mod prompts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use anthropic_client::{classify_response, AnthropicClient};
pub use prompts::cleaning_prompt;

/// Context sent alongside a chunk's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanContext {
    pub file_id: String,
    /// 1-based chunk number
    pub chunk_number: usize,
    pub total_chunks: usize,
}

/// A single cleaning request.
#[derive(Debug, Clone, Copy)]
pub struct CleanRequest<'a> {
    pub raw_text: &'a str,
    pub context: Option<&'a CleanContext>,
}

/// Errors reported by a cleaning collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CleanError {
    /// Policy-based refusal; never retried
    #[error("content filtered: {0}")]
    ContentFiltered(String),

    /// Timeouts, rate-limit rejections, 5xx, network errors
    #[error("transient error: {0}")]
    Transient(String),

    /// The request can never succeed as sent (bad request, auth failure)
    #[error("fatal error: {0}")]
    Fatal(String),
}

/// How the retry layer treats a [`CleanError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Retryable,
    Filtered,
    Fatal,
}

impl CleanError {
    /// Classify this error for the retry loop.
    pub fn class(&self) -> FailureClass {
        match self {
            CleanError::ContentFiltered(_) => FailureClass::Filtered,
            CleanError::Transient(_) => FailureClass::Retryable,
            CleanError::Fatal(_) => FailureClass::Fatal,
        }
    }

    /// The underlying message without the class prefix.
    pub fn message(&self) -> &str {
        match self {
            CleanError::ContentFiltered(m) | CleanError::Transient(m) | CleanError::Fatal(m) => m,
        }
    }
}

/// An external service that turns raw text into cleaned text.
#[async_trait]
pub trait CleaningClient: Send + Sync {
    /// Get the name of this client, for logs.
    fn name(&self) -> &'static str;

    /// Clean one piece of text.
    async fn clean(&self, request: CleanRequest<'_>) -> Result<String, CleanError>;
}
