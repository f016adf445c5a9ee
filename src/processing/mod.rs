//! File handling for the cleaning pipeline.
//!
//! This module provides:
//! - Input discovery (a `.txt` file or a folder of them)
//! - Encoding detection with Latin-1 fallback
//! - Writing cleaned output

pub mod file_io;

pub use file_io::{
    decode, discover_inputs, ensure_dir, read_document, unique_ids, write_cleaned,
};
