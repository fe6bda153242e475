//! OpenAI-compatible embedding backend.
//!
//! Works with any endpoint that speaks the OpenAI `/embeddings` API:
//! OpenAI itself, Azure OpenAI, Ollama in compatibility mode, vLLM and
//! similar servers.
//!
//! # Example
//!
//! ```rust,no_run
//! use versebank_inference::openai::{OpenAIBackend, OpenAIConfig};
//! use versebank_core::EmbeddingBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = OpenAIConfig {
//!         base_url: "http://localhost:11434/v1".to_string(),
//!         api_key: None,
//!         embed_model: "nomic-embed-text".to_string(),
//!         embed_dimension: 768,
//!         ..OpenAIConfig::default()
//!     };
//!     let backend = OpenAIBackend::new(config).unwrap();
//!
//!     let texts = vec!["Hello, world!".to_string()];
//!     let vectors = backend.embed_texts(&texts).await.unwrap();
//! }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{
    OpenAIBackend, OpenAIConfig, DEFAULT_DIMENSION, DEFAULT_EMBED_MODEL, DEFAULT_OPENAI_URL,
    DEFAULT_TIMEOUT_SECS,
};
pub use error::{to_versebank_error, OpenAIErrorCode};
pub use types::*;
