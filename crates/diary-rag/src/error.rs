//! Error types for the diary RAG system

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// Diary RAG errors
///
/// The three `*Unavailable` variants are the faults a query can hit. The
/// pipeline never lets them escape; it folds them into a failed outcome.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding width differs from the configured deployment width
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedding backend unreachable or erroring
    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// Vector backend unreachable or erroring
    #[error("Vector index unavailable: {0}")]
    RetrievalUnavailable(String),

    /// LLM backend unreachable or erroring
    #[error("Generation backend unavailable: {0}")]
    GenerationUnavailable(String),

    /// Text extraction error
    #[error("Failed to parse file '{path}': {message}")]
    Parse { path: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a text extraction error
    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an embedding backend error
    pub fn model_unavailable(message: impl Into<String>) -> Self {
        Self::ModelUnavailable(message.into())
    }

    /// Create a vector backend error
    pub fn retrieval_unavailable(message: impl Into<String>) -> Self {
        Self::RetrievalUnavailable(message.into())
    }

    /// Create an LLM backend error
    pub fn generation_unavailable(message: impl Into<String>) -> Self {
        Self::GenerationUnavailable(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error is one of the backend faults a query can hit
    pub fn is_backend_fault(&self) -> bool {
        matches!(
            self,
            Error::ModelUnavailable(_)
                | Error::RetrievalUnavailable(_)
                | Error::GenerationUnavailable(_)
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            Error::Config(msg) => (StatusCode::BAD_REQUEST, "config_error", msg.clone()),
            Error::DimensionMismatch { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "dimension_mismatch",
                self.to_string(),
            ),
            Error::ModelUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "model_unavailable", msg.clone())
            }
            Error::RetrievalUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "retrieval_unavailable",
                msg.clone(),
            ),
            Error::GenerationUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "generation_unavailable",
                msg.clone(),
            ),
            Error::Parse { path, message } => (
                StatusCode::BAD_REQUEST,
                "parse_error",
                format!("Failed to parse '{}': {}", path, message),
            ),
            Error::Io(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "io_error",
                err.to_string(),
            ),
            Error::Json(err) => (StatusCode::BAD_REQUEST, "json_error", err.to_string()),
            Error::Http(err) => (StatusCode::BAD_GATEWAY, "http_error", err.to_string()),
            Error::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone())
            }
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
