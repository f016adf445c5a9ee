//! Chunk type definitions.

use serde::{Deserialize, Serialize};

/// A bounded, ordered slice of a document's lines.
///
/// Chunks are the unit of work sent to the cleaning service. Indices are
/// 0-based and gapless across a document, and `line_range` is half-open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// ID of the document this chunk was cut from
    pub file_id: String,

    /// Order of this chunk within its document (0-indexed)
    pub index: usize,

    /// Number of chunks the document was split into
    pub total_chunks: usize,

    /// Line range `[start, end)` in the original document
    pub line_range: (usize, usize),

    /// The raw lines of the chunk joined with `\n`
    pub raw_text: String,
}

impl Chunk {
    /// Create a new chunk.
    pub fn new(
        file_id: impl Into<String>,
        index: usize,
        total_chunks: usize,
        line_range: (usize, usize),
        raw_text: String,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            index,
            total_chunks,
            line_range,
            raw_text,
        }
    }

    /// Number of lines covered by this chunk.
    pub fn line_count(&self) -> usize {
        self.line_range.1 - self.line_range.0
    }

    /// 1-based chunk number, as shown to humans and to the cleaning service.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    /// Get the length of the raw text in bytes.
    pub fn len(&self) -> usize {
        self.raw_text.len()
    }

    /// Check if the raw text is empty.
    pub fn is_empty(&self) -> bool {
        self.raw_text.is_empty()
    }
}
