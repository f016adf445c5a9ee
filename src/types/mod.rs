//! Core types for the cleaning pipeline.

mod chunk;
mod config;
mod document;
mod outcome;

pub use chunk::Chunk;
pub use config::{ApiConfig, CleanerConfig, UncleanChunkPolicy, ENV_PREFIX};
pub use document::{document_id, Document};
pub use outcome::{
    AttemptEvent, CallResult, CallStatus, ChunkFailure, FailureKind, FileOutcome,
};
