//! Harness error types.

use thiserror::Error;

pub type HarnessResult<T> = Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Text check setup failed: {0}")]
    TextCheckSetup(String),

    #[error("Model error: {0}")]
    Model(#[from] bookend_models::ModelError),

    #[error("Media error: {0}")]
    Media(#[from] bookend_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] bookend_storage::StorageError),

    #[error("Generation error: {0}")]
    Generation(#[from] bookend_gen::GenError),

    #[error("VLM error: {0}")]
    Vlm(#[from] bookend_vlm::VlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<config::ConfigError> for HarnessError {
    fn from(e: config::ConfigError) -> Self {
        Self::ConfigError(e.to_string())
    }
}

impl HarnessError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn text_check_setup(msg: impl Into<String>) -> Self {
        Self::TextCheckSetup(msg.into())
    }
}
