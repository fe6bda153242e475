//! # versebank-inference
//!
//! Embedding backends for versebank.
//!
//! This crate provides:
//! - Ollama implementation (default)
//! - OpenAI-compatible implementation (optional, feature `openai`)
//! - Backend selection from the environment
//! - A deterministic mock backend (feature `mock`)
//!
//! # Feature Flags
//!
//! - `ollama` (default): Enable Ollama backend
//! - `openai`: Enable OpenAI-compatible backend
//! - `mock`: Enable [`MockEmbeddingBackend`] outside this crate's tests
//!
//! # Example
//!
//! ```rust,no_run
//! use versebank_inference::OllamaBackend;
//! use versebank_core::EmbeddingBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OllamaBackend::from_env();
//!     let texts = vec!["Hello".to_string()];
//!     let embeddings = backend.embed_texts(&texts).await.unwrap();
//! }
//! ```

pub mod provider;

#[cfg(any(feature = "ollama", feature = "openai"))]
mod response;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use versebank_core::*;

#[cfg(feature = "ollama")]
pub use ollama::OllamaBackend;

#[cfg(feature = "openai")]
pub use openai::{OpenAIBackend, OpenAIConfig};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockEmbeddingBackend;

pub use provider::{backend_from_env, BackendKind};
