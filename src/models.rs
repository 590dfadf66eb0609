//! Core data types shared by the loader, the indexes and the answer path.

use std::path::{Path, PathBuf};

use crate::extract::DocumentFormat;

/// A course document discovered under the corpus root.
///
/// Identity is the canonical path; two `Document`s with the same path are
/// the same document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Document {
    /// Canonical (absolute, symlink-free) path.
    pub path: PathBuf,
    /// Format resolved from the file extension.
    pub format: DocumentFormat,
    /// Human-readable name, the file stem.
    pub display_name: String,
}

impl Document {
    /// Build a document from a path, resolving its canonical form.
    ///
    /// Returns `Ok(None)` when the extension is not a supported format.
    pub fn from_path(path: &Path) -> std::io::Result<Option<Self>> {
        let Some(format) = DocumentFormat::from_path(path) else {
            return Ok(None);
        };
        let path = path.canonicalize()?;
        let display_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Some(Self {
            path,
            format,
            display_name,
        }))
    }

    /// Registry key: the canonical path as a string.
    pub fn key(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    /// Lowercase file extension without the dot.
    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }
}

/// A contiguous span of extracted text, the smallest retrievable unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Position within the document, contiguous from 0.
    pub ordinal: usize,
    /// Source page (PDF page, slide) the text came from, from 0.
    pub page: usize,
    pub text: String,
}
