//! A/B comparison between two runs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which run scored better on a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    A,
    B,
    Tie,
    /// Sample absent (or unscored) in one of the runs
    Missing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SampleComparison {
    pub sample_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b_score: Option<f64>,
    /// `b_score - a_score`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
    pub winner: Winner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AbComparison {
    pub run_a: String,
    pub run_b: String,
    pub samples: Vec<SampleComparison>,
    pub a_wins: usize,
    pub b_wins: usize,
    pub ties: usize,
}
