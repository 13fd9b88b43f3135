//! Generation provider error types

use std::time::Duration;
use thiserror::Error;

use crate::scheduler::ExecutionError;

/// Errors that can occur while talking to a generation provider
#[derive(Debug, Error)]
pub enum GenAiError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The long-running operation finished with an error
    #[error("API Error: {0}")]
    Operation(String),

    #[error("Video generation succeeded but no download link was provided.")]
    MissingVideo,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("API key not found. Set the {0} environment variable.")]
    MissingApiKey(String),

    #[error("Unknown provider: '{0}'. Supported: auto, gemini, mock")]
    UnknownProvider(String),

    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Check if an HTTP status code is retryable
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

impl GenAiError {
    /// Whether sending the same request again may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            GenAiError::RateLimited { .. } => true,
            GenAiError::ApiError { status, .. } => is_retryable_status(*status),
            GenAiError::Network(_) => true,
            GenAiError::Timeout(_) => true,
            GenAiError::InvalidResponse(_)
            | GenAiError::Operation(_)
            | GenAiError::MissingVideo
            | GenAiError::MissingApiKey(_)
            | GenAiError::UnknownProvider(_)
            | GenAiError::Io(_)
            | GenAiError::Json(_) => false,
        }
    }
}

impl From<GenAiError> for ExecutionError {
    fn from(e: GenAiError) -> Self {
        ExecutionError::new(e.to_string())
    }
}
