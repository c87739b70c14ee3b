//! Error types for docqa-model.

use thiserror::Error;

/// Errors raised by a [`CompletionModel`](crate::CompletionModel) backend.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The backend could not be reached at all.
    #[error("Model backend unreachable at {endpoint}: {message}")]
    Unreachable { endpoint: String, message: String },

    /// The requested model is not installed on the backend.
    #[error("Model '{model}' is not available on the backend")]
    ModelNotFound { model: String },

    /// The backend answered with a non-success status.
    #[error("Model backend returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The backend response could not be decoded.
    #[error("Failed to parse model response: {0}")]
    ResponseParsing(String),

    /// Generic completion failure.
    #[error("Completion failed: {0}")]
    Completion(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for [`ModelError`]
pub type Result<T> = std::result::Result<T, ModelError>;
