//! Document type definitions.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A text document to be cleaned.
///
/// Documents are immutable once read. Line endings are normalized to LF
/// before splitting, so `lines` never contains `\r`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier for this document (usually the file stem)
    pub id: String,

    /// Path the document was read from, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Encoding the content was decoded from
    pub encoding: String,

    /// Ordered lines of the document, without terminators
    pub lines: Vec<String>,

    /// Whether the input ended with a line terminator
    #[serde(default)]
    pub trailing_newline: bool,
}

impl Document {
    /// Create a document from in-memory text.
    pub fn from_text(id: impl Into<String>, text: &str) -> Self {
        Self {
            id: id.into(),
            path: None,
            encoding: "utf-8".to_string(),
            lines: split_lines(text),
            trailing_newline: ends_with_newline(text),
        }
    }

    /// Create a document from already-decoded file content.
    pub fn from_file_content(path: &Path, text: &str, encoding: &str) -> Self {
        Self {
            id: document_id(path),
            path: Some(path.to_path_buf()),
            encoding: encoding.to_string(),
            lines: split_lines(text),
            trailing_newline: ends_with_newline(text),
        }
    }

    /// Replace the document id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Number of lines in the document.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Check if the document has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The full text, lines joined with `\n`, ending with `\n` when the
    /// input did.
    pub fn text(&self) -> String {
        let mut text = self.lines.join("\n");
        if self.trailing_newline && !self.lines.is_empty() {
            text.push('\n');
        }
        text
    }
}

/// Derive a document id from a path: the file stem, falling back to the
/// full path when there is none.
pub fn document_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn ends_with_newline(text: &str) -> bool {
    text.ends_with('\n') || text.ends_with('\r')
}

fn split_lines(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    normalized.lines().map(String::from).collect()
}
