//! Error taxonomy for the question-answering engine.
//!
//! Failures fall into two groups:
//!
//! | Error | Scope | Handling |
//! |-------|-------|----------|
//! | [`LoadError`] | one source file | document skipped, warning logged |
//! | [`EmbeddingError`] | one segment at build time | segment dropped, warning logged |
//! | [`RegistryError::NoDocuments`] | whole corpus | startup fails |
//! | [`GenerationError`] | one question | surfaced to the caller |
//!
//! Build-time failures are absorbed at the registry and index boundary.
//! Query-time failures ([`AnswerError`]) always reach the caller.

use std::path::PathBuf;
use std::time::Duration;

use crate::extract::ExtractError;

/// A source file could not be read or parsed.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file could not be read from disk.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is larger than the loader accepts.
    #[error("{} is too large ({size} bytes, limit {limit})", path.display())]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    /// The file was read but its content could not be extracted.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ExtractError,
    },
}

impl LoadError {
    /// Path of the file that failed to load.
    pub fn path(&self) -> &std::path::Path {
        match self {
            LoadError::Io { path, .. }
            | LoadError::TooLarge { path, .. }
            | LoadError::Parse { path, .. } => path,
        }
    }
}

/// The embedding model could not produce a vector for a text.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding provider is disabled")]
    Disabled,

    #[error("embedding service unreachable at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("embedding API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed embedding response: {0}")]
    Malformed(String),

    #[error("embedding has {got} dimensions, expected {expected}")]
    Dimension { expected: usize, got: usize },

    #[error("embedding call timed out after {0:?}")]
    Timeout(Duration),
}

/// The generation model failed to answer a prompt.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation provider is disabled")]
    Disabled,

    #[error("generation service unreachable at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("generation API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed generation response: {0}")]
    Malformed(String),

    #[error("generation call timed out after {0:?}")]
    Timeout(Duration),
}

/// Failures of the discovery pass as a whole.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The root directory does not exist or is not a directory.
    #[error("corpus root {} is not a readable directory", root.display())]
    RootMissing { root: PathBuf },

    /// An exclude pattern is not a valid glob.
    #[error("invalid exclude pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// No supported file under the root could be indexed. `failed` counts
    /// supported files that were found but skipped.
    #[error("no indexable documents under {} ({failed} supported files failed to load)", root.display())]
    NoDocuments { root: PathBuf, failed: usize },
}

/// A question could not be answered.
#[derive(Debug, thiserror::Error)]
pub enum AnswerError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error("failed to embed question: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}
