//! Error types for versebank.

use thiserror::Error;

/// Result type alias using versebank's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type shared by every versebank crate.
///
/// A job fails with the `Display` text of this error stored as its
/// `error_message`.
#[derive(Error, Debug)]
pub enum Error {
    /// Query or transaction failed; the transaction has been rolled back
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Song not found
    #[error("Song not found: {0}")]
    SongNotFound(uuid::Uuid),

    /// Embedding call failed or returned vectors of the wrong count or dimension
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Queueing a job failed
    #[error("Job error: {0}")]
    Job(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected arguments, such as a non-positive batch limit
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short stable label for the variant, used as the `error_kind` log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Database(_) => "database",
            Error::NotFound(_) | Error::SongNotFound(_) => "not_found",
            Error::Embedding(_) => "embedding",
            Error::Job(_) => "job",
            Error::Serialization(_) => "serialization",
            Error::Config(_) => "config",
            Error::InvalidInput(_) => "invalid_input",
            Error::Request(_) => "request",
            Error::Internal(_) => "internal",
            Error::Io(_) => "io",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_display_carries_context() {
        let id = Uuid::nil();
        let cases = [
            (
                Error::SongNotFound(id),
                format!("Song not found: {}", id),
            ),
            (
                Error::Embedding("Expected 3 embeddings, backend returned 2".into()),
                "Embedding error: Expected 3 embeddings, backend returned 2".to_string(),
            ),
            (
                Error::InvalidInput("limit must be positive, got 0".into()),
                "Invalid input: limit must be positive, got 0".to_string(),
            ),
            (
                Error::Config("unknown EMBED_BACKEND 'foo'".into()),
                "Configuration error: unknown EMBED_BACKEND 'foo'".to_string(),
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(Error::SongNotFound(Uuid::nil()).kind(), "not_found");
        assert_eq!(Error::NotFound("job".into()).kind(), "not_found");
        assert_eq!(Error::Embedding("x".into()).kind(), "embedding");
        assert_eq!(Error::InvalidInput("x".into()).kind(), "invalid_input");
        assert_eq!(Error::Database(sqlx::Error::RowNotFound).kind(), "database");
    }

    #[test]
    fn test_payload_parse_error_becomes_serialization() {
        let json_err = serde_json::from_str::<i64>("\"ten\"").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(ref msg) if !msg.is_empty()));
        assert_eq!(err.kind(), "serialization");
    }

    #[test]
    fn test_io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "songs.json");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("songs.json"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
