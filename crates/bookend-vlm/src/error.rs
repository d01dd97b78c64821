//! VLM client error types.

use thiserror::Error;

pub type VlmResult<T> = Result<T, VlmError>;

#[derive(Debug, Error)]
pub enum VlmError {
    #[error("VLM service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("VLM returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No models configured")]
    NoModels,

    #[error("Failed to read image {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VlmError {
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            VlmError::ServiceUnavailable(_) | VlmError::Network(_) => true,
            VlmError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
