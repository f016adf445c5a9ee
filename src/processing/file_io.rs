//! Reading input documents and writing cleaned output.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{CleanerError, Result};
use crate::types::{document_id, Document};

/// Suffix appended to the document id for cleaned output files.
pub const CLEANED_SUFFIX: &str = "_cleaned.txt";

/// Decode raw bytes, returning the text and the encoding used.
///
/// Tries UTF-8, then UTF-16 with a byte-order mark, then falls back to
/// Latin-1, which always succeeds.
pub fn decode(content: &[u8]) -> (String, &'static str) {
    if let Ok(s) = std::str::from_utf8(content) {
        return (s.strip_prefix('\u{feff}').unwrap_or(s).to_string(), "utf-8");
    }

    if content.len() >= 2 && content[0] == 0xFF && content[1] == 0xFE {
        let utf16: Vec<u16> = content[2..]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        if let Ok(s) = String::from_utf16(&utf16) {
            return (s, "utf-16-le");
        }
    }

    if content.len() >= 2 && content[0] == 0xFE && content[1] == 0xFF {
        let utf16: Vec<u16> = content[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        if let Ok(s) = String::from_utf16(&utf16) {
            return (s, "utf-16-be");
        }
    }

    (content.iter().map(|&b| b as char).collect(), "latin-1")
}

/// Read a document from disk.
pub async fn read_document(path: &Path) -> Result<Document> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| CleanerError::FileReadError {
            path: path.to_path_buf(),
            source,
        })?;

    let (text, encoding) = decode(&bytes);
    let document = Document::from_file_content(path, &text, encoding);

    info!(
        path = %path.display(),
        encoding,
        lines = document.line_count(),
        "Read input file"
    );
    Ok(document)
}

/// Path of the cleaned output for `file_id` inside `output_dir`.
pub fn cleaned_path(output_dir: &Path, file_id: &str) -> PathBuf {
    output_dir.join(format!("{}{}", file_id, CLEANED_SUFFIX))
}

/// Write cleaned text for `file_id`, returning the path written.
pub async fn write_cleaned(output_dir: &Path, file_id: &str, text: &str) -> Result<PathBuf> {
    let path = cleaned_path(output_dir, file_id);
    tokio::fs::write(&path, text)
        .await
        .map_err(|source| CleanerError::FileWriteError {
            path: path.clone(),
            source,
        })?;

    debug!(path = %path.display(), bytes = text.len(), "Wrote cleaned text");
    Ok(path)
}

/// Resolve a user-supplied path into input files and the folder they live in.
///
/// A `.txt` file yields itself and its parent directory; a directory yields
/// every `.txt` file directly inside it, sorted by name.
pub fn discover_inputs(path: &Path) -> Result<(Vec<PathBuf>, PathBuf)> {
    if path.is_file() {
        if !is_text_file(path) {
            return Err(CleanerError::NoInputFiles(path.to_path_buf()));
        }
        let folder = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        return Ok((vec![path.to_path_buf()], folder));
    }

    let entries = std::fs::read_dir(path).map_err(|source| CleanerError::FileReadError {
        path: path.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_text_file(p))
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(CleanerError::NoInputFiles(path.to_path_buf()));
    }

    info!(folder = %path.display(), files = files.len(), "Found text files");
    Ok((files, path.to_path_buf()))
}

/// Assign each path a document id that no other path in the run shares.
///
/// Ids are file stems. When stems collide (`book.txt` and `book.TXT`), the
/// first keeps the stem and later ones get `_2`, `_3`, ... so their outputs
/// and logs never overwrite each other.
pub fn unique_ids(paths: &[PathBuf]) -> Vec<String> {
    let stems: Vec<String> = paths.iter().map(|p| document_id(p)).collect();
    let natural: HashSet<&str> = stems.iter().map(String::as_str).collect();
    let mut taken: HashSet<String> = HashSet::with_capacity(stems.len());

    stems
        .iter()
        .map(|stem| {
            let mut id = stem.clone();
            let mut n = 2;
            while taken.contains(&id) || (id != *stem && natural.contains(id.as_str())) {
                id = format!("{}_{}", stem, n);
                n += 1;
            }
            if id != *stem {
                debug!(stem = %stem, id = %id, "Renamed colliding document id");
            }
            taken.insert(id.clone());
            id
        })
        .collect()
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("txt"))
        .unwrap_or(false)
}

/// Create `dir` and any missing parents.
pub async fn ensure_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| CleanerError::FileWriteError {
            path: dir.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_utf8_strips_bom() {
        let (text, encoding) = decode("\u{feff}héllo".as_bytes());
        assert_eq!(text, "héllo");
        assert_eq!(encoding, "utf-8");
    }

    #[test]
    fn test_decode_falls_back_to_latin1() {
        let (text, encoding) = decode(&[b'c', b'a', b'f', 0xE9]);
        assert_eq!(text, "café");
        assert_eq!(encoding, "latin-1");
    }

    #[test]
    fn test_decode_utf16_le() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "hi".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode(&bytes), ("hi".to_string(), "utf-16-le"));
    }

    #[tokio::test]
    async fn test_read_and_write_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("chapter.txt");
        std::fs::write(&input, "one\r\ntwo\n").unwrap();

        let doc = read_document(&input).await.unwrap();
        assert_eq!(doc.id, "chapter");
        assert_eq!(doc.lines, vec!["one", "two"]);

        let written = write_cleaned(dir.path(), &doc.id, "ONE\nTWO").await.unwrap();
        assert_eq!(written, dir.path().join("chapter_cleaned.txt"));
        assert_eq!(std::fs::read_to_string(written).unwrap(), "ONE\nTWO");
    }

    #[tokio::test]
    async fn test_read_missing_file_is_read_error() {
        let err = read_document(Path::new("/definitely/not/here.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, CleanerError::FileReadError { .. }));
    }

    #[test]
    fn test_discover_inputs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.TXT"), "a").unwrap();
        std::fs::write(dir.path().join("notes.md"), "skip").unwrap();

        let (files, folder) = discover_inputs(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.TXT", "b.txt"]);
        assert_eq!(folder, dir.path());

        let (single, parent) = discover_inputs(&dir.path().join("b.txt")).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(parent, dir.path());
    }

    #[test]
    fn test_unique_ids_for_colliding_stems() {
        let paths = vec![
            PathBuf::from("/in/book.TXT"),
            PathBuf::from("/in/book.txt"),
            PathBuf::from("/in/book_2.txt"),
            PathBuf::from("/in/other.txt"),
        ];
        assert_eq!(unique_ids(&paths), vec!["book", "book_3", "book_2", "other"]);
    }

    #[test]
    fn test_discover_empty_folder_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_inputs(dir.path()).unwrap_err();
        assert!(matches!(err, CleanerError::NoInputFiles(_)));
    }
}
