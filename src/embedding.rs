//! Embedding capability and its providers.
//!
//! Defines the [`Embedder`] trait and concrete implementations:
//! - **[`OllamaEmbedder`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **[`OpenAIEmbedder`]**: calls the OpenAI embeddings API.
//! - **[`DisabledEmbedder`]**: always fails; used when embeddings are not configured.
//!
//! Also provides [`cosine_similarity`], the metric used by
//! [`DocumentIndex`](crate::index::DocumentIndex) both at build and at query time.
//!
//! # Provider Selection
//!
//! ```rust
//! # use dsmate::config::EmbeddingConfig;
//! # use dsmate::embedding::{create_embedder, Embedder};
//! let config = EmbeddingConfig {
//!     provider: "disabled".to_string(),
//!     ..EmbeddingConfig::default()
//! };
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.model_name(), "disabled");
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use crate::http::{client_with_timeout, join_url, send_json_with_retry, HttpFailure};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Maps a text to a fixed-length vector.
///
/// Implementations must be deterministic for a fixed model and must never
/// substitute a placeholder vector on failure.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"mistral"`).
    fn model_name(&self) -> &str;

    /// Returns the vector dimensionality when it is known up front.
    fn dims(&self) -> Option<usize>;

    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

// ============ Disabled Provider ============

/// An embedder that always fails with [`EmbeddingError::Disabled`].
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> Option<usize> {
        None
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Disabled)
    }
}

// ============ Ollama Provider ============

/// Embedder backed by a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default: `http://localhost:11434`).
/// Requires the model to be pulled (e.g. `ollama pull mistral`).
pub struct OllamaEmbedder {
    model: String,
    dims: Option<usize>,
    url: String,
    max_retries: u32,
    max_input_chars: usize,
    timeout: Duration,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = client_with_timeout(timeout)?;
        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            max_retries: config.max_retries,
            max_input_chars: config.max_input_chars,
            timeout,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> Option<usize> {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let endpoint = join_url(&self.url, "api/embed");
        let body = serde_json::json!({
            "model": self.model,
            "input": truncate_chars(text, self.max_input_chars),
        });

        let json = send_json_with_retry(|| self.client.post(&endpoint).json(&body), self.max_retries)
            .await
            .map_err(|f| map_failure(f, &self.url, self.timeout))?;

        let vector = parse_ollama_response(&json)?;
        check_vector(vector, self.dims)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<f32>, EmbeddingError> {
    let first = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .and_then(|e| e.first())
        .ok_or_else(|| EmbeddingError::Malformed("missing embeddings array".to_string()))?;
    parse_vector(first)
}

// ============ OpenAI Provider ============

/// Embedder using the OpenAI API.
///
/// Calls `POST /v1/embeddings` with the configured model.
/// Requires the `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAIEmbedder {
    model: String,
    dims: Option<usize>,
    url: String,
    api_key: String,
    max_retries: u32,
    max_input_chars: usize,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    /// Create an OpenAI embedder with an explicit API key.
    pub fn with_api_key(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = client_with_timeout(timeout)?;
        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            api_key,
            max_retries: config.max_retries,
            max_input_chars: config.max_input_chars,
            timeout,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> Option<usize> {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let endpoint = join_url(&self.url, "v1/embeddings");
        let body = serde_json::json!({
            "model": self.model,
            "input": [truncate_chars(text, self.max_input_chars)],
        });

        let json = send_json_with_retry(
            || {
                self.client
                    .post(&endpoint)
                    .bearer_auth(&self.api_key)
                    .json(&body)
            },
            self.max_retries,
        )
        .await
        .map_err(|f| map_failure(f, &self.url, self.timeout))?;

        let vector = parse_openai_response(&json)?;
        check_vector(vector, self.dims)
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<f32>, EmbeddingError> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .ok_or_else(|| EmbeddingError::Malformed("missing data[0].embedding".to_string()))?;
    parse_vector(embedding)
}

// ============ Shared helpers ============

fn parse_vector(value: &serde_json::Value) -> Result<Vec<f32>, EmbeddingError> {
    let items = value
        .as_array()
        .ok_or_else(|| EmbeddingError::Malformed("embedding is not an array".to_string()))?;
    items
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| EmbeddingError::Malformed(format!("non-numeric component: {}", v)))
        })
        .collect()
}

fn check_vector(vector: Vec<f32>, dims: Option<usize>) -> Result<Vec<f32>, EmbeddingError> {
    if vector.is_empty() {
        return Err(EmbeddingError::Malformed("empty embedding".to_string()));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(EmbeddingError::Malformed(
            "embedding contains non-finite values".to_string(),
        ));
    }
    if let Some(expected) = dims {
        if vector.len() != expected {
            return Err(EmbeddingError::Dimension {
                expected,
                got: vector.len(),
            });
        }
    }
    Ok(vector)
}

fn map_failure(failure: HttpFailure, url: &str, timeout: Duration) -> EmbeddingError {
    match failure {
        HttpFailure::Network {
            timed_out: true, ..
        } => EmbeddingError::Timeout(timeout),
        HttpFailure::Network { reason, .. } => EmbeddingError::Unreachable {
            url: url.to_string(),
            reason,
        },
        HttpFailure::Status { status, body } => EmbeddingError::Api { status, body },
        HttpFailure::Decode(reason) => EmbeddingError::Malformed(reason),
    }
}

/// Cut `text` to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Create the [`Embedder`] selected by the configuration.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ollama_config(url: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            url: Some(url.to_string()),
            max_retries: 0,
            ..EmbeddingConfig::default()
        }
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn check_vector_rejects_wrong_dimension() {
        let err = check_vector(vec![1.0, 2.0], Some(3)).unwrap_err();
        assert!(matches!(err, EmbeddingError::Dimension { expected: 3, got: 2 }));
        assert!(check_vector(vec![], None).is_err());
        assert!(check_vector(vec![f32::NAN], None).is_err());
    }

    #[tokio::test]
    async fn disabled_embedder_always_fails() {
        let err = DisabledEmbedder.embed("anything").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Disabled));
    }

    #[tokio::test]
    async fn ollama_embedder_parses_first_embedding() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(json!({"model": "mistral", "input": "sockets"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"model": "mistral", "embeddings": [[0.5, -0.25, 1.0]]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(&ollama_config(&server.uri())).unwrap();
        let v = embedder.embed("sockets").await.unwrap();
        assert_eq!(v, vec![0.5, -0.25, 1.0]);
    }

    #[tokio::test]
    async fn ollama_embedder_reports_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"oops": true})))
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(&ollama_config(&server.uri())).unwrap();
        let err = embedder.embed("sockets").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Malformed(_)));
    }

    #[tokio::test]
    async fn ollama_embedder_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .expect(1)
            .mount(&server)
            .await;

        let config = EmbeddingConfig {
            max_retries: 3,
            ..ollama_config(&server.uri())
        };
        let embedder = OllamaEmbedder::new(&config).unwrap();
        let err = embedder.embed("sockets").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn ollama_embedder_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[1.0]]})))
            .with_priority(2)
            .mount(&server)
            .await;

        let config = EmbeddingConfig {
            max_retries: 1,
            ..ollama_config(&server.uri())
        };
        let embedder = OllamaEmbedder::new(&config).unwrap();
        assert_eq!(embedder.embed("x").await.unwrap(), vec![1.0]);
    }

    #[tokio::test]
    async fn unreachable_ollama_is_reported() {
        // Nothing listens on port 9 (discard) in the test environment.
        let embedder = OllamaEmbedder::new(&ollama_config("http://127.0.0.1:9")).unwrap();
        let err = embedder.embed("x").await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::Unreachable { .. } | EmbeddingError::Timeout(_)
        ));
    }

    #[tokio::test]
    async fn openai_embedder_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [0.1, 0.2]}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dims: Some(2),
            ..ollama_config(&server.uri())
        };
        let embedder = OpenAIEmbedder::with_api_key(&config, "sk-test".to_string()).unwrap();
        assert_eq!(embedder.embed("hello").await.unwrap(), vec![0.1, 0.2]);
    }
}
