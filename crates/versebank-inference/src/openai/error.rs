//! OpenAI-specific error handling.

use versebank_core::Error;

/// OpenAI-specific error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAIErrorCode {
    /// Invalid authentication credentials.
    AuthenticationError,
    /// Rate limit exceeded.
    RateLimitExceeded,
    /// Model not found or not available.
    ModelNotFound,
    /// Input exceeds the model's context window.
    ContextLengthExceeded,
    /// Server error.
    ServerError,
    /// Unknown error.
    Unknown,
}

impl OpenAIErrorCode {
    /// Determine error code from HTTP status and error type.
    pub fn from_response(status: u16, error_type: &str) -> Self {
        match (status, error_type) {
            (401, _) => Self::AuthenticationError,
            (429, _) => Self::RateLimitExceeded,
            (404, _) | (_, "model_not_found") => Self::ModelNotFound,
            (400, _) if error_type.contains("context_length") => Self::ContextLengthExceeded,
            (500..=599, _) => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Whether a later attempt of the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimitExceeded | Self::ServerError)
    }
}

/// Map an OpenAI failure onto the versebank error type.
///
/// Credential and model problems are configuration errors; everything else
/// is an embedding failure.
pub fn to_versebank_error(code: OpenAIErrorCode, message: &str) -> Error {
    match code {
        OpenAIErrorCode::AuthenticationError => {
            Error::Config(format!("Authentication failed: {}", message))
        }
        OpenAIErrorCode::ModelNotFound => Error::Config(format!("Model not found: {}", message)),
        OpenAIErrorCode::RateLimitExceeded => {
            Error::Embedding(format!("Rate limit exceeded: {}", message))
        }
        OpenAIErrorCode::ContextLengthExceeded => {
            Error::Embedding(format!("Context too long: {}", message))
        }
        OpenAIErrorCode::ServerError => Error::Embedding(format!("Server error: {}", message)),
        OpenAIErrorCode::Unknown => Error::Embedding(message.to_string()),
    }
}
