//! Model loading and validation errors.

use std::path::PathBuf;

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Validation failed for {item}: {message}")]
    Validation { item: String, message: String },

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
}

impl ModelError {
    pub fn validation(item: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            item: item.into(),
            message: message.into(),
        }
    }

    pub fn invalid_threshold(msg: impl Into<String>) -> Self {
        Self::InvalidThreshold(msg.into())
    }
}

/// Read and deserialize a JSON file, attaching the path to any error.
pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> ModelResult<T> {
    let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ModelError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
