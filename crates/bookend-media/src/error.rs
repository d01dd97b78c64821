//! Media error type.

use std::path::PathBuf;
use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    /// `ffmpeg` or `ffprobe` is not installed
    #[error("{0} not found on PATH")]
    ToolNotFound(&'static str),

    #[error("{tool} failed: {message}")]
    ToolFailed {
        tool: &'static str,
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Expected at least {expected} output frames, found {found}")]
    MissingFrames { expected: usize, found: usize },

    #[error("No video stream in probe output")]
    NoVideoStream,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl MediaError {
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::ToolFailed {
            tool: "ffmpeg",
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn ffprobe_failed(stderr: &[u8]) -> Self {
        let stderr = String::from_utf8_lossy(stderr).trim().to_string();
        Self::ToolFailed {
            tool: "ffprobe",
            message: "non-zero exit status".to_string(),
            stderr: (!stderr.is_empty()).then_some(stderr),
            exit_code: None,
        }
    }
}
