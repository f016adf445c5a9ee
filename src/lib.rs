//! Text Cleaner Library
//!
//! Cleans large text files by splitting them into line-bounded chunks,
//! sending each chunk to a remote cleaning model under a shared rate limit,
//! retrying transient failures, and reassembling the results in order.

pub mod chunkers;
pub mod cleaning;
pub mod cli;
pub mod error;
pub mod jobs;
pub mod output;
pub mod processing;
pub mod reliability;
pub mod types;

pub use chunkers::LineChunker;
pub use cleaning::{AnthropicClient, CleanError, CleaningClient};
pub use error::{CleanerError, Result};
pub use jobs::{ChunkProcessor, FileScheduler, PipelineBuilder, RunSummary, WorkItem};
pub use output::{JsonLogSink, ResultSink, TracingSink};
pub use reliability::{RateLimiter, RetryingCaller};
pub use types::{CallResult, CallStatus, Chunk, CleanerConfig, Document, FileOutcome};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::chunkers::*;
    pub use crate::cleaning::{CleanContext, CleanError, CleanRequest, CleaningClient};
    pub use crate::error::{CleanerError, Result};
    pub use crate::jobs::*;
    pub use crate::output::*;
    pub use crate::reliability::*;
    pub use crate::types::*;
}

/// Default chunk size in lines
pub const DEFAULT_MAX_LINES_PER_CHUNK: usize = 200;

/// Default number of calls allowed per rate-limit window
pub const DEFAULT_MAX_CALLS_PER_WINDOW: usize = 999;

/// Default rate-limit window length in seconds
pub const DEFAULT_WINDOW_SECONDS: u64 = 60;

/// Default attempts per chunk, including the first
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 5;

/// Default delay before the first retry, in seconds
pub const DEFAULT_BASE_BACKOFF_SECONDS: f64 = 1.0;

/// Default ceiling for a single retry delay, in seconds
pub const DEFAULT_MAX_BACKOFF_SECONDS: f64 = 10.0;
