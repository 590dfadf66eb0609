//! Document loader: file on disk → ordered [`Segment`]s.
//!
//! The format parser is chosen solely by the (case-insensitive) file
//! extension. Pages produced by [`extract`](crate::extract) are split into
//! segments by [`split_text`], and segment ordinals run contiguously across
//! all pages of the document.

use std::path::Path;

use crate::chunk::split_text;
use crate::error::LoadError;
use crate::extract::{extract_pages, DocumentFormat};
use crate::models::Segment;

/// Files larger than this are refused instead of being read into memory.
pub const MAX_FILE_BYTES: u64 = 100 * 1024 * 1024;

/// Load a document and split it into segments of at most `max_chars` bytes.
///
/// A path whose extension is not a supported format yields an empty
/// sequence; filtering unsupported files is the caller's job. An empty
/// sequence is also a valid result for a blank document.
pub fn load(path: &Path, max_chars: usize) -> Result<Vec<Segment>, LoadError> {
    let Some(format) = DocumentFormat::from_path(path) else {
        tracing::debug!(path = %path.display(), "no parser for extension, nothing loaded");
        return Ok(Vec::new());
    };

    let size = std::fs::metadata(path)
        .map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .len();
    if size > MAX_FILE_BYTES {
        return Err(LoadError::TooLarge {
            path: path.to_path_buf(),
            size,
            limit: MAX_FILE_BYTES,
        });
    }

    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let pages = extract_pages(&bytes, format).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let segments = segment_pages(&pages, max_chars);
    tracing::debug!(
        path = %path.display(),
        %format,
        pages = pages.len(),
        segments = segments.len(),
        "document loaded"
    );
    Ok(segments)
}

/// Split pages into segments, numbering them across page boundaries.
pub fn segment_pages(pages: &[String], max_chars: usize) -> Vec<Segment> {
    let mut segments = Vec::new();
    for (page, text) in pages.iter().enumerate() {
        for piece in split_text(text, max_chars) {
            segments.push(Segment {
                ordinal: segments.len(),
                page,
                text: piece,
            });
        }
    }
    segments
}
