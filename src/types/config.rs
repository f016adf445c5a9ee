//! Configuration types for the cleaning pipeline.

use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::{CallResult, CallStatus};
use crate::error::{CleanerError, Result};
use crate::{
    DEFAULT_BASE_BACKOFF_SECONDS, DEFAULT_MAX_BACKOFF_SECONDS, DEFAULT_MAX_CALLS_PER_WINDOW,
    DEFAULT_MAX_LINES_PER_CHUNK, DEFAULT_MAX_RETRY_ATTEMPTS, DEFAULT_WINDOW_SECONDS,
};

/// Prefix for environment overrides, e.g. `CLEANER_MAX_LINES_PER_CHUNK=100`
/// or `CLEANER_API__MODEL=...` for nested keys.
pub const ENV_PREFIX: &str = "CLEANER";

/// What goes into the reassembled text for a chunk that was not cleaned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UncleanChunkPolicy {
    /// Pass the chunk's raw text through unchanged
    #[default]
    Original,
    /// Insert a one-line marker naming the chunk and the problem
    Placeholder,
    /// Leave the chunk out entirely
    Omit,
}

impl UncleanChunkPolicy {
    /// Text contributed by `result` to the reassembled document.
    pub fn render(&self, result: &CallResult) -> Option<String> {
        if let CallStatus::Success(text) = &result.status {
            return Some(text.clone());
        }

        match self {
            UncleanChunkPolicy::Original => Some(result.chunk.raw_text.clone()),
            UncleanChunkPolicy::Placeholder => Some(format!(
                "[chunk {} of {} not cleaned: {}]",
                result.chunk.number(),
                result.chunk.total_chunks,
                result.problem().unwrap_or_default()
            )),
            UncleanChunkPolicy::Omit => None,
        }
    }
}

/// Settings for the Anthropic Messages API client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the API, without the `/v1/messages` path
    pub base_url: String,

    /// Model used for cleaning
    pub model: String,

    /// Maximum tokens the model may return per chunk
    pub max_tokens: u32,

    /// Per-request timeout in seconds
    pub request_timeout_seconds: u64,

    /// API key, normally taken from `ANTHROPIC_API_KEY`
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-3-haiku-20240307".to_string(),
            max_tokens: 4000,
            request_timeout_seconds: 120,
            api_key: None,
        }
    }
}

/// Global cleaning run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    /// Maximum calls granted in any sliding window
    pub max_calls_per_window: usize,

    /// Length of the sliding window in seconds
    pub window_seconds: u64,

    /// Maximum lines per chunk
    pub max_lines_per_chunk: usize,

    /// Maximum attempts per chunk, including the first
    pub max_retry_attempts: u32,

    /// Delay before the first retry, doubled on each further retry
    pub base_backoff_seconds: f64,

    /// Ceiling for any single backoff delay
    pub max_backoff_seconds: f64,

    /// Worker pool size; `None` means available parallelism
    pub concurrency: Option<usize>,

    /// How filtered or failed chunks are reassembled
    pub unclean_chunk_policy: UncleanChunkPolicy,

    /// Cleaning service settings
    pub api: ApiConfig,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            max_calls_per_window: DEFAULT_MAX_CALLS_PER_WINDOW,
            window_seconds: DEFAULT_WINDOW_SECONDS,
            max_lines_per_chunk: DEFAULT_MAX_LINES_PER_CHUNK,
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            base_backoff_seconds: DEFAULT_BASE_BACKOFF_SECONDS,
            max_backoff_seconds: DEFAULT_MAX_BACKOFF_SECONDS,
            concurrency: None,
            unclean_chunk_policy: UncleanChunkPolicy::default(),
            api: ApiConfig::default(),
        }
    }
}

impl CleanerConfig {
    /// Load configuration from `CLEANER_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load configuration from defaults, an optional TOML/YAML/JSON file and
    /// `CLEANER_*` environment variables, in increasing precedence.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(prefix)
                .prefix_separator("_")
                .separator("__"),
        );

        let mut loaded: CleanerConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CleanerError::invalid_config(e.to_string()))?;

        if loaded.api.api_key.is_none() {
            loaded.api.api_key = std::env::var("ANTHROPIC_API_KEY").ok();
        }

        loaded.validate()?;
        Ok(loaded)
    }

    /// Check that every value is usable. Called before any processing starts.
    pub fn validate(&self) -> Result<()> {
        if self.max_calls_per_window == 0 {
            return Err(CleanerError::invalid_config(
                "max_calls_per_window must be greater than 0",
            ));
        }
        if self.window_seconds == 0 {
            return Err(CleanerError::invalid_config(
                "window_seconds must be greater than 0",
            ));
        }
        if Instant::now().checked_add(self.window()).is_none() {
            return Err(CleanerError::invalid_config(
                "window_seconds is too large",
            ));
        }
        if self.max_lines_per_chunk == 0 {
            return Err(CleanerError::invalid_config(
                "max_lines_per_chunk must be greater than 0",
            ));
        }
        if self.max_retry_attempts == 0 {
            return Err(CleanerError::invalid_config(
                "max_retry_attempts must be greater than 0",
            ));
        }
        if Duration::try_from_secs_f64(self.base_backoff_seconds).is_err() {
            return Err(CleanerError::invalid_config(
                "base_backoff_seconds must be a non-negative number of seconds in range",
            ));
        }
        if Duration::try_from_secs_f64(self.max_backoff_seconds).is_err()
            || self.max_backoff_seconds < self.base_backoff_seconds
        {
            return Err(CleanerError::invalid_config(
                "max_backoff_seconds must be at least base_backoff_seconds",
            ));
        }
        if self.concurrency == Some(0) {
            return Err(CleanerError::invalid_config(
                "concurrency must be greater than 0",
            ));
        }
        if self.api.max_tokens == 0 {
            return Err(CleanerError::invalid_config(
                "api.max_tokens must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Worker pool size, defaulting to the machine's available parallelism.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    /// Delay before the first retry. Out-of-range values saturate.
    pub fn base_backoff(&self) -> Duration {
        Duration::try_from_secs_f64(self.base_backoff_seconds).unwrap_or(Duration::MAX)
    }

    /// Ceiling for a single retry delay. Out-of-range values saturate.
    pub fn max_backoff(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_backoff_seconds).unwrap_or(Duration::MAX)
    }

    /// Set the chunk size in lines.
    pub fn with_max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines_per_chunk = max_lines;
        self
    }

    /// Set the rate limit.
    pub fn with_rate_limit(mut self, max_calls: usize, window_seconds: u64) -> Self {
        self.max_calls_per_window = max_calls;
        self.window_seconds = window_seconds;
        self
    }

    /// Set the worker pool size.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }
}
