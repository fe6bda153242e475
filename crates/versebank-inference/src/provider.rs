//! Embedding backend selection.
//!
//! `EMBED_BACKEND` picks the provider (`ollama` by default, or `openai`).
//! Each provider then reads its own environment variables.

use std::sync::Arc;

use tracing::info;

use versebank_core::{EmbeddingBackend, Error, Result};

/// Known embedding providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Ollama,
    OpenAI,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" => Some(Self::OpenAI),
            _ => None,
        }
    }

    /// Read `EMBED_BACKEND`, defaulting to Ollama when unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var("EMBED_BACKEND") {
            Ok(value) => Self::parse(&value).ok_or_else(|| {
                Error::Config(format!(
                    "Unknown EMBED_BACKEND '{}' (expected 'ollama' or 'openai')",
                    value
                ))
            }),
            Err(_) => Ok(Self::Ollama),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the backend for `kind` from its environment variables.
pub fn build_backend(kind: BackendKind) -> Result<Arc<dyn EmbeddingBackend>> {
    let backend: Arc<dyn EmbeddingBackend> = match kind {
        #[cfg(feature = "ollama")]
        BackendKind::Ollama => Arc::new(crate::ollama::OllamaBackend::from_env()),
        #[cfg(feature = "openai")]
        BackendKind::OpenAI => Arc::new(crate::openai::OpenAIBackend::from_env()?),
        #[allow(unreachable_patterns)]
        other => {
            return Err(Error::Config(format!(
                "Embedding backend '{}' is not compiled in",
                other
            )))
        }
    };

    info!(
        subsystem = "inference",
        backend = %kind,
        model = backend.model_name(),
        dimension = backend.dimension(),
        "Embedding backend ready"
    );
    Ok(backend)
}

/// Select and build the embedding backend named by `EMBED_BACKEND`.
pub fn backend_from_env() -> Result<Arc<dyn EmbeddingBackend>> {
    build_backend(BackendKind::from_env()?)
}
