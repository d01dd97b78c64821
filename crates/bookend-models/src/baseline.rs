//! Baseline metrics used for drift detection.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::report::SampleResult;

/// Current on-disk baseline format.
pub const BASELINE_VERSION: u32 = 1;

/// Recorded metrics for one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BaselineMetrics {
    pub start_similarity: f64,
    pub end_similarity: f64,
    pub average: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlm_overall: Option<f64>,
    /// Digest of the keyframes the metrics were recorded with
    pub keyframe_digest: String,
}

impl BaselineMetrics {
    /// Capture metrics from a scored sample. `None` when it has no frame scores.
    pub fn from_result(result: &SampleResult) -> Option<Self> {
        let frames = result.frames?;
        Some(Self {
            start_similarity: frames.start_similarity,
            end_similarity: frames.end_similarity,
            average: frames.average,
            vlm_overall: result.vlm.as_ref().map(|v| v.overall),
            keyframe_digest: result.keyframe_digest.clone(),
        })
    }
}

/// Baseline file (`baseline.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Baseline {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    /// Run the metrics were taken from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_run: Option<String>,
    pub samples: BTreeMap<String, BaselineMetrics>,
}

impl Default for Baseline {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Baseline {
    pub fn new(source_run: Option<String>) -> Self {
        Self {
            version: BASELINE_VERSION,
            created_at: Utc::now(),
            source_run,
            samples: BTreeMap::new(),
        }
    }

    pub fn get(&self, sample_id: &str) -> Option<&BaselineMetrics> {
        self.samples.get(sample_id)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
