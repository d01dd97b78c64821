//! Frame similarity and VLM scores.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Similarity of generated bookend frames to the input keyframes (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameScores {
    /// Generated first frame vs start keyframe
    pub start_similarity: f64,
    /// Generated last frame vs end keyframe
    pub end_similarity: f64,
    /// Mean of start and end
    pub average: f64,
}

impl FrameScores {
    pub fn new(start_similarity: f64, end_similarity: f64) -> Self {
        Self {
            start_similarity,
            end_similarity,
            average: (start_similarity + end_similarity) / 2.0,
        }
    }
}

/// Semantic quality scores returned by the vision-language model (0-100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VlmScores {
    /// How well the motion and content follow the prompt
    pub prompt_adherence: f64,
    /// First frame fidelity to the start keyframe
    pub start_fidelity: f64,
    /// Last frame fidelity to the end keyframe
    pub end_fidelity: f64,
    /// Plausibility of the transition between bookends
    pub temporal_coherence: f64,
    /// Absence of visual artifacts (100 = none)
    pub artifact_free: f64,
    /// Overall quality
    pub overall: f64,
    /// Concrete problems spotted
    #[serde(default)]
    pub issues: Vec<String>,
    /// One-line summary
    #[serde(default)]
    pub summary: String,
    /// Model that produced the scores
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl VlmScores {
    /// Mean of the five sub-scores.
    pub fn sub_score_mean(&self) -> f64 {
        (self.prompt_adherence
            + self.start_fidelity
            + self.end_fidelity
            + self.temporal_coherence
            + self.artifact_free)
            / 5.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_scores_average() {
        let scores = FrameScores::new(90.0, 70.0);
        assert!((scores.average - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_vlm_sub_score_mean() {
        let scores = VlmScores {
            prompt_adherence: 80.0,
            start_fidelity: 90.0,
            end_fidelity: 70.0,
            temporal_coherence: 60.0,
            artifact_free: 100.0,
            overall: 0.0,
            issues: vec![],
            summary: String::new(),
            model: None,
        };
        assert!((scores.sub_score_mean() - 80.0).abs() < 1e-9);
    }
}
