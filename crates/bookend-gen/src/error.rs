//! Generation error types.

use thiserror::Error;

pub type GenResult<T> = Result<T, GenError>;

#[derive(Debug, Error)]
pub enum GenError {
    #[error("Backend unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Workflow error: {0}")]
    Workflow(String),

    #[error("Cannot bind {field} to {target}: {message}")]
    Binding {
        field: String,
        target: String,
        message: String,
    },

    #[error("Prompt rejected by ComfyUI: {0}")]
    NodeErrors(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Generation produced no outputs")]
    NoOutputs,

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GenError {
    pub fn workflow(msg: impl Into<String>) -> Self {
        Self::Workflow(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn generation_failed(msg: impl Into<String>) -> Self {
        Self::GenerationFailed(msg.into())
    }

    pub fn binding(field: &str, target: &str, message: impl Into<String>) -> Self {
        Self::Binding {
            field: field.to_string(),
            target: target.to_string(),
            message: message.into(),
        }
    }

    /// Network failures and 5xx responses are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenError::ServiceUnavailable(_) | GenError::Network(_) => true,
            GenError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
