//! Ollama embedding backend implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, instrument};

use versebank_core::{defaults, EmbeddingBackend, Error, Result, Vector};

use crate::response::{error_snippet, log_embed_latency};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = defaults::OLLAMA_URL;

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = defaults::EMBED_MODEL;

/// Default embedding dimension for nomic-embed-text.
pub const DEFAULT_DIMENSION: usize = defaults::EMBED_DIMENSION;

/// Timeout for embedding requests (seconds).
pub const EMBED_TIMEOUT_SECS: u64 = defaults::EMBED_TIMEOUT_SECS;

/// Ollama embedding backend.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    embed_model: String,
    dimension: usize,
    embed_timeout_secs: u64,
}

impl OllamaBackend {
    /// Create a new Ollama backend with default settings.
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_OLLAMA_URL.to_string(),
            DEFAULT_EMBED_MODEL.to_string(),
            DEFAULT_DIMENSION,
        )
    }

    /// Create a new Ollama backend with custom configuration.
    pub fn with_config(base_url: String, embed_model: String, dimension: usize) -> Self {
        let embed_timeout = std::env::var("VERSEBANK_EMBED_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(EMBED_TIMEOUT_SECS);

        info!(
            "Initializing Ollama backend: url={}, embed={}, dim={}",
            base_url, embed_model, dimension
        );

        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            embed_model,
            dimension,
            embed_timeout_secs: embed_timeout,
        }
    }

    /// Create from `OLLAMA_BASE`, `OLLAMA_EMBED_MODEL` and `OLLAMA_EMBED_DIM`.
    /// Unset or blank variables keep their defaults.
    pub fn from_env() -> Self {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self::with_config(
            env("OLLAMA_BASE").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            env("OLLAMA_EMBED_MODEL").unwrap_or_else(|| DEFAULT_EMBED_MODEL.to_string()),
            env("OLLAMA_EMBED_DIM")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_DIMENSION),
        )
    }

    /// Override the per-request embedding timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.embed_timeout_secs = secs;
        self
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    #[instrument(skip(self, texts), fields(subsystem = "inference", component = "ollama", op = "embed_texts", model = %self.embed_model, input_count = texts.len()))]
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let start = Instant::now();

        let request = EmbeddingRequest {
            model: self.embed_model.clone(),
            input: texts.to_vec(),
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .timeout(Duration::from_secs(self.embed_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "Ollama returned {}: {}",
                status,
                error_snippet(&body)
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse response: {}", e)))?;

        let vectors: Vec<Vector> = result.embeddings.into_iter().map(Vector::from).collect();
        log_embed_latency(start, texts.len(), vectors.len());
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.embed_model
    }
}
