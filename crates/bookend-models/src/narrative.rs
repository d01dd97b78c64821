//! Narrative (multi-shot) scripts and runs.

use std::path::Path;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{read_json, ModelError, ModelResult};
use crate::report::SampleResult;
use crate::sample::{check_samples, BookendSample};
use crate::verdict::Verdict;

/// A shot carries the same generation fields as a standalone sample.
pub type ShotSpec = BookendSample;

/// Ordered list of shots that form one story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NarrativeScript {
    pub id: String,
    pub title: String,
    pub shots: Vec<ShotSpec>,
}

impl NarrativeScript {
    /// Load a script from JSON, resolving keyframe paths against its directory.
    pub fn load(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let mut script: NarrativeScript = read_json(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for shot in &mut script.shots {
            shot.resolve_paths(base);
        }
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> ModelResult<()> {
        if self.id.trim().is_empty() {
            return Err(ModelError::validation("narrative script", "empty id"));
        }
        if self.shots.is_empty() {
            return Err(ModelError::validation(
                format!("narrative '{}'", self.id),
                "at least one shot is required",
            ));
        }
        check_samples(&self.shots)
    }
}

/// Similarity between the end of one shot and the start of the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContinuityCheck {
    pub from_shot: String,
    pub to_shot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    pub verdict: Verdict,
    #[serde(default)]
    pub message: String,
}

/// Aggregate counts for a narrative run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct NarrativeSummary {
    pub total_shots: usize,
    pub passed: usize,
    pub warned: usize,
    pub failed: usize,
    pub continuity_failures: usize,
    pub verdict: Verdict,
}

impl NarrativeSummary {
    /// Summarize shots and continuity checks; the verdict is the worst of both.
    pub fn from_parts(shots: &[SampleResult], continuity: &[ContinuityCheck]) -> Self {
        let count = |v: Verdict| shots.iter().filter(|s| s.verdict == v).count();
        let verdict = Verdict::worst(
            shots
                .iter()
                .map(|s| s.verdict)
                .chain(continuity.iter().map(|c| c.verdict)),
        );

        Self {
            total_shots: shots.len(),
            passed: count(Verdict::Pass),
            warned: count(Verdict::Warn),
            failed: count(Verdict::Fail),
            continuity_failures: continuity.iter().filter(|c| c.verdict.is_fail()).count(),
            verdict,
        }
    }
}

/// Result of running a narrative script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NarrativeRun {
    pub run_id: String,
    pub script_id: String,
    pub title: String,
    pub backend: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub shots: Vec<SampleResult>,
    pub continuity: Vec<ContinuityCheck>,
    pub summary: NarrativeSummary,
}
