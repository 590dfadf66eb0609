//! Generation capability and its providers.
//!
//! - **[`OllamaGenerator`]**: calls `POST /api/generate` on a local Ollama
//!   instance with streaming disabled and returns the `response` text as is.
//! - **[`DisabledGenerator`]**: always fails; lets the corpus be indexed and
//!   inspected without a generation model.
//!
//! Generation is not retried by default (`generation.max_retries = 0`): a
//! failed answer is reported to the user rather than silently re-asked.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::GenerationError;
use crate::http::{client_with_timeout, join_url, send_json_with_retry, HttpFailure};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Turns a rendered prompt into answer text.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier (e.g. `"mistral:latest"`).
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`, returned unmodified.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// A generator that always fails with [`GenerationError::Disabled`].
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Disabled)
    }
}

/// Generator backed by a local Ollama instance.
pub struct OllamaGenerator {
    model: String,
    url: String,
    max_retries: u32,
    timeout: Duration,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = client_with_timeout(timeout)?;
        Ok(Self {
            model: config.model.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            max_retries: config.max_retries,
            timeout,
            client,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let endpoint = join_url(&self.url, "api/generate");
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let json = send_json_with_retry(|| self.client.post(&endpoint).json(&body), self.max_retries)
            .await
            .map_err(|failure| match failure {
                HttpFailure::Network {
                    timed_out: true, ..
                } => GenerationError::Timeout(self.timeout),
                HttpFailure::Network { reason, .. } => GenerationError::Unreachable {
                    url: self.url.clone(),
                    reason,
                },
                HttpFailure::Status { status, body } => GenerationError::Api { status, body },
                HttpFailure::Decode(reason) => GenerationError::Malformed(reason),
            })?;

        json.get("response")
            .and_then(|r| r.as_str())
            .map(|r| r.to_string())
            .ok_or_else(|| GenerationError::Malformed("missing response field".to_string()))
    }
}

/// Create the [`Generator`] selected by the configuration.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
