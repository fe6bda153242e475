//! OpenAI-compatible embedding backend implementation.

use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

use versebank_core::{defaults, EmbeddingBackend, Error, Result, Vector};

use super::error::{to_versebank_error, OpenAIErrorCode};
use crate::response::log_embed_latency;
use super::types::*;

/// Default OpenAI API endpoint.
pub const DEFAULT_OPENAI_URL: &str = defaults::OPENAI_URL;

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = defaults::OPENAI_EMBED_MODEL;

/// Default embedding dimension for text-embedding-3-small.
pub const DEFAULT_DIMENSION: usize = defaults::OPENAI_EMBED_DIMENSION;

/// Default timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = defaults::EMBED_TIMEOUT_SECS;

/// Configuration for OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key for authentication (optional for local endpoints).
    pub api_key: Option<String>,
    /// Model to use for embeddings.
    pub embed_model: String,
    /// Expected embedding dimension.
    pub embed_dimension: usize,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// Skip TLS verification (for self-signed certs in local environments).
    pub skip_tls_verify: bool,
}

impl OpenAIConfig {
    /// Defaults overridden by `OPENAI_BASE_URL`, `OPENAI_API_KEY`,
    /// `OPENAI_EMBED_MODEL`, `OPENAI_EMBED_DIM`, `OPENAI_TIMEOUT` and
    /// `OPENAI_SKIP_TLS_VERIFY`.
    pub fn from_env() -> Self {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        let base = Self::default();
        Self {
            base_url: env("OPENAI_BASE_URL").unwrap_or(base.base_url),
            api_key: env("OPENAI_API_KEY"),
            embed_model: env("OPENAI_EMBED_MODEL").unwrap_or(base.embed_model),
            embed_dimension: env("OPENAI_EMBED_DIM")
                .and_then(|v| v.parse().ok())
                .unwrap_or(base.embed_dimension),
            timeout_seconds: env("OPENAI_TIMEOUT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(base.timeout_seconds),
            skip_tls_verify: env("OPENAI_SKIP_TLS_VERIFY")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENAI_URL.to_string(),
            api_key: None,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            embed_dimension: DEFAULT_DIMENSION,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            skip_tls_verify: false,
        }
    }
}

/// OpenAI-compatible embedding backend.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIBackend {
    /// Create a new OpenAI backend with the given configuration.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let mut client_builder =
            Client::builder().timeout(Duration::from_secs(config.timeout_seconds));

        if config.skip_tls_verify {
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "Initializing OpenAI backend: url={}, embed={}, dim={}",
            config.base_url, config.embed_model, config.embed_dimension
        );

        Ok(Self { client, config })
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(OpenAIConfig::default())
    }

    /// Create from `OPENAI_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::from_env())
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    /// Build a request with authentication if configured.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.post(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        req
    }
}

/// Reorder response entries by `index`, requiring exactly one entry per input.
fn vectors_in_input_order(mut data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vector>> {
    data.sort_by_key(|d| d.index);
    let contiguous = data.len() == expected && data.iter().enumerate().all(|(i, d)| d.index == i);
    if !contiguous {
        return Err(Error::Embedding(format!(
            "Response indices do not cover {} inputs: {:?}",
            expected,
            data.iter().map(|d| d.index).collect::<Vec<_>>()
        )));
    }
    Ok(data
        .into_iter()
        .map(|d| Vector::from(d.embedding))
        .collect())
}

#[async_trait]
impl EmbeddingBackend for OpenAIBackend {
    #[instrument(skip(self, texts), fields(subsystem = "inference", component = "openai", op = "embed_texts", model = %self.config.embed_model, input_count = texts.len()))]
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let start = Instant::now();

        let request = EmbeddingRequest {
            model: self.config.embed_model.clone(),
            input: texts.to_vec(),
            encoding_format: Some("float".to_string()),
        };

        let response = self
            .build_request("/embeddings")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body: OpenAIErrorResponse = response.json().await.unwrap_or(OpenAIErrorResponse {
                error: OpenAIError {
                    message: "Unknown error".to_string(),
                    error_type: "unknown".to_string(),
                    code: None,
                },
            });
            let code = OpenAIErrorCode::from_response(status.as_u16(), &body.error.error_type);
            warn!(
                status = status.as_u16(),
                retryable = code.is_retryable(),
                "OpenAI embedding request rejected"
            );
            return Err(to_versebank_error(
                code,
                &format!("OpenAI returned {}: {}", status, body.error.message),
            ));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse response: {}", e)))?;

        let vectors = vectors_in_input_order(result.data, texts.len())?;
        log_embed_latency(start, texts.len(), vectors.len());
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.embed_dimension
    }

    fn model_name(&self) -> &str {
        &self.config.embed_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OpenAIConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.embed_model, "text-embedding-3-small");
        assert_eq!(config.embed_dimension, 1536);
        assert!(config.api_key.is_none());
        assert!(!config.skip_tls_verify);
    }

    #[test]
    fn test_backend_reports_config() {
        let backend = OpenAIBackend::new(OpenAIConfig {
            embed_model: "nomic-embed-text".to_string(),
            embed_dimension: 768,
            ..OpenAIConfig::default()
        })
        .unwrap();
        assert_eq!(backend.model_name(), "nomic-embed-text");
        assert_eq!(backend.dimension(), 768);
        assert_eq!(backend.config().timeout_seconds, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_skip_tls_verify_builds() {
        let backend = OpenAIBackend::new(OpenAIConfig {
            skip_tls_verify: true,
            ..OpenAIConfig::default()
        });
        assert!(backend.is_ok());
    }

    fn entry(index: usize, value: f32) -> EmbeddingData {
        EmbeddingData {
            embedding: vec![value; 2],
            index,
        }
    }

    #[test]
    fn test_vectors_reordered_by_index() {
        let vectors =
            vectors_in_input_order(vec![entry(2, 2.0), entry(0, 0.0), entry(1, 1.0)], 3).unwrap();
        let firsts: Vec<f32> = vectors.iter().map(|v| v.as_slice()[0]).collect();
        assert_eq!(firsts, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_vectors_with_gap_rejected() {
        let err = vectors_in_input_order(vec![entry(0, 0.0), entry(2, 2.0)], 2).unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[test]
    fn test_vectors_short_response_rejected() {
        assert!(vectors_in_input_order(vec![entry(0, 0.0)], 2).is_err());
    }

    #[tokio::test]
    async fn test_embed_empty_input_skips_request() {
        let backend = OpenAIBackend::new(OpenAIConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            ..OpenAIConfig::default()
        })
        .unwrap();
        assert!(backend.embed_texts(&[]).await.unwrap().is_empty());
    }
}
