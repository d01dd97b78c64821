//! Vision-language model scoring for generated bookend clips.
//!
//! This crate provides:
//! - An OpenAI-compatible chat completions client (LM Studio)
//! - The scoring rubric prompt with keyframe and output frame images
//! - Tolerant parsing of model replies into `VlmScores`
//! - The `FrameScorer` seam used by the harness pipelines

pub mod client;
pub mod error;
pub mod parse;
pub mod prompt;
pub mod types;

use std::path::PathBuf;

use async_trait::async_trait;
use bookend_models::VlmScores;

pub use client::{VlmClient, VlmConfig};
pub use error::{VlmError, VlmResult};
pub use parse::{extract_json_object, parse_scores, strip_code_fences};

/// Everything the scorer looks at for one sample.
#[derive(Debug, Clone)]
pub struct ScoringInput {
    pub prompt: String,
    pub start_keyframe: PathBuf,
    pub end_keyframe: PathBuf,
    pub first_frame: PathBuf,
    pub last_frame: PathBuf,
}

/// Semantic quality scoring of a generated clip.
#[async_trait]
pub trait FrameScorer: Send + Sync {
    /// Configured models the scorer can reach, for preflight.
    async fn available_models(&self) -> VlmResult<Vec<String>>;

    async fn score(&self, input: &ScoringInput) -> VlmResult<VlmScores>;
}
