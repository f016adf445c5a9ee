//! Line-based chunker for fixed-size line chunking.

use tracing::debug;

use crate::error::{CleanerError, Result};
use crate::types::{Chunk, Document};

/// Splits a document into runs of at most `max_lines` lines.
///
/// Chunks never overlap and never skip a line, so joining every chunk's
/// lines in index order reproduces the document exactly.
#[derive(Debug, Clone, Copy)]
pub struct LineChunker {
    max_lines: usize,
}

impl LineChunker {
    /// Create a new line chunker. Fails if `max_lines` is zero.
    pub fn new(max_lines: usize) -> Result<Self> {
        if max_lines == 0 {
            return Err(CleanerError::invalid_config(
                "max_lines per chunk must be greater than 0",
            ));
        }
        Ok(Self { max_lines })
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Chunk the given document.
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let total_chunks = document.lines.len().div_ceil(self.max_lines);

        let chunks: Vec<Chunk> = document
            .lines
            .chunks(self.max_lines)
            .enumerate()
            .map(|(index, lines)| {
                let start = index * self.max_lines;
                Chunk::new(
                    document.id.clone(),
                    index,
                    total_chunks,
                    (start, start + lines.len()),
                    lines.join("\n"),
                )
            })
            .collect();

        debug!(
            file = %document.id,
            lines = document.line_count(),
            chunks = chunks.len(),
            max_lines = self.max_lines,
            "Chunked document"
        );

        chunks
    }
}

impl Default for LineChunker {
    fn default() -> Self {
        Self {
            max_lines: crate::DEFAULT_MAX_LINES_PER_CHUNK,
        }
    }
}

/// Split `document` into chunks of at most `max_lines` lines.
pub fn chunk(document: &Document, max_lines: usize) -> Result<Vec<Chunk>> {
    Ok(LineChunker::new(max_lines)?.chunk(document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbered_document(lines: usize) -> Document {
        let text: Vec<String> = (0..lines).map(|i| format!("line {}", i)).collect();
        Document::from_text("doc", &text.join("\n"))
    }

    fn rejoin(chunks: &[Chunk]) -> Vec<String> {
        chunks
            .iter()
            .flat_map(|c| c.raw_text.split('\n').map(String::from))
            .collect()
    }

    #[test]
    fn test_empty_document() {
        let chunks = chunk(&Document::from_text("empty", ""), 200).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_short_document_is_single_chunk() {
        let chunks = chunk(&numbered_document(12), 200).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].line_range, (0, 12));
        assert_eq!(chunks[0].total_chunks, 1);
    }

    #[test]
    fn test_zero_max_lines_is_invalid() {
        let err = chunk(&numbered_document(3), 0).unwrap_err();
        assert!(matches!(err, CleanerError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_450_lines_in_chunks_of_200() {
        let chunks = chunk(&numbered_document(450), 200).unwrap();
        let sizes: Vec<usize> = chunks.iter().map(|c| c.line_count()).collect();
        assert_eq!(sizes, vec![200, 200, 50]);
        assert_eq!(chunks[2].line_range, (400, 450));
        assert!(chunks.iter().all(|c| c.total_chunks == 3));
    }

    #[test]
    fn test_round_trip_for_many_sizes() {
        for lines in [1, 2, 7, 199, 200, 201, 450] {
            let doc = numbered_document(lines);
            for max_lines in 1..=12 {
                let chunks = chunk(&doc, max_lines).unwrap();
                let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
                assert_eq!(indices, (0..chunks.len()).collect::<Vec<_>>());
                assert_eq!(rejoin(&chunks), doc.lines, "lines={} k={}", lines, max_lines);
            }
        }
    }

    #[test]
    fn test_blank_lines_are_preserved() {
        let doc = Document::from_text("doc", "a\n\n\nb\n\nc");
        let chunks = chunk(&doc, 2).unwrap();
        assert_eq!(rejoin(&chunks), doc.lines);
    }
}
