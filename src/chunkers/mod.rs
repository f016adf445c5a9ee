//! Chunking strategies for documents.

mod line_chunker;

pub use line_chunker::{chunk, LineChunker};
