//! Domain errors for the ragcore retrieval subsystem.

use thiserror::Error;

/// Errors that can occur while chunking, embedding, storing or retrieving documents.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Embedding backend error: {0}")]
    Embedding(String),

    #[error("Vector store error ({backend}): {message}")]
    Store { backend: String, message: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Operation timed out after {0}s")]
    Timeout(u64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Import failed: {0}")]
    Import(String),
}

impl RagError {
    /// Shorthand for a backend-tagged store error.
    pub fn store(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Whether the failure is worth retrying or degrading around.
    ///
    /// Configuration and validation problems are permanent: retrying them only
    /// hides the bug.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Embedding(_) | Self::Store { .. } | Self::Http(_) | Self::Timeout(_) | Self::Database(_)
        )
    }
}

pub type RagResult<T> = Result<T, RagError>;

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Http(format!("request timed out: {err}"));
        }
        Self::Http(err.to_string())
    }
}

impl From<sqlx::Error> for RagError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
