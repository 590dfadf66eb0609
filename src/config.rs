//! TOML configuration.
//!
//! Every section has defaults, so an empty file is a valid configuration
//! that indexes `files/` with a local Ollama `mistral` model.
//!
//! ```toml
//! [corpus]
//! root = "files/"
//!
//! [retrieval]
//! top_k = 4
//!
//! [embedding]
//! provider = "ollama"
//! model = "mistral"
//!
//! [generation]
//! provider = "ollama"
//! model = "mistral:latest"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::extract::DocumentFormat;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            extensions: default_extensions(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

impl CorpusConfig {
    /// The configured extensions resolved to formats. Unknown entries are dropped.
    pub fn formats(&self) -> Vec<DocumentFormat> {
        self.extensions
            .iter()
            .filter_map(|e| DocumentFormat::from_extension(e))
            .collect()
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("files/")
}
fn default_extensions() -> Vec<String> {
    DocumentFormat::ALL
        .iter()
        .map(|f| f.extension().to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    4000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Segments retrieved per question.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

/// Number of segments placed in the prompt context unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 4;

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_embedding_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            url: None,
            dims: None,
            timeout_secs: default_embedding_timeout_secs(),
            max_retries: default_embedding_max_retries(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

fn default_embedding_provider() -> String {
    "ollama".to_string()
}
fn default_embedding_model() -> String {
    "mistral".to_string()
}
fn default_embedding_timeout_secs() -> u64 {
    30
}
fn default_embedding_max_retries() -> u32 {
    3
}
fn default_max_input_chars() -> usize {
    8000
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            url: None,
            timeout_secs: default_generation_timeout_secs(),
            max_retries: 0,
        }
    }
}

fn default_generation_provider() -> String {
    "ollama".to_string()
}
fn default_generation_model() -> String {
    "mistral:latest".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PromptConfig {
    /// Replaces the built-in instruction template. Must contain `{context}` and `{question}`.
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    #[serde(default = "default_max_parallel_documents")]
    pub max_parallel_documents: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_parallel_documents: default_max_parallel_documents(),
        }
    }
}

fn default_max_parallel_documents() -> usize {
    4
}

/// Read, parse and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.corpus.extensions.is_empty() {
        bail!("corpus.extensions must not be empty");
    }
    for ext in &config.corpus.extensions {
        if DocumentFormat::from_extension(ext).is_none() {
            bail!(
                "Unsupported extension in corpus.extensions: '{}'. Supported: pdf, txt, docx, pptx, html",
                ext
            );
        }
    }

    if config.chunking.max_chars == 0 {
        bail!("chunking.max_chars must be > 0");
    }

    if config.indexing.max_parallel_documents == 0 {
        bail!("indexing.max_parallel_documents must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "ollama" | "openai" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, ollama, or openai.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0 when set");
    }
    if config.embedding.max_input_chars == 0 {
        bail!("embedding.max_input_chars must be > 0");
    }

    match config.generation.provider.as_str() {
        "disabled" | "ollama" => {}
        other => bail!(
            "Unknown generation provider: '{}'. Must be disabled or ollama.",
            other
        ),
    }

    if let Some(template) = &config.prompt.template {
        for placeholder in ["{context}", "{question}"] {
            if !template.contains(placeholder) {
                bail!("prompt.template must contain {}", placeholder);
            }
        }
    }

    Ok(())
}
