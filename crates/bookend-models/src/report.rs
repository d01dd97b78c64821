//! Per-sample results and run reports.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::scores::{FrameScores, VlmScores};
use crate::thresholds::QualityThresholds;
use crate::verdict::{Verdict, VerdictReason};

/// Change of one metric versus the baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RegressionDelta {
    pub metric: String,
    pub baseline: f64,
    pub current: f64,
    /// `current - baseline`; negative values are drops
    pub delta: f64,
    pub verdict: Verdict,
}

impl RegressionDelta {
    pub fn new(metric: impl Into<String>, baseline: f64, current: f64, verdict: Verdict) -> Self {
        Self {
            metric: metric.into(),
            baseline,
            current,
            delta: current - baseline,
            verdict,
        }
    }
}

/// How a sample related to the stored baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum BaselineStatus {
    /// Baseline comparison was not requested
    #[default]
    Disabled,
    /// No baseline entry for this sample
    Missing,
    /// Keyframes changed since the baseline was recorded
    Stale,
    /// Compared against a matching baseline entry
    Matched,
}

/// QA result for one sample (or one narrative shot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SampleResult {
    pub sample_id: String,
    pub prompt: String,
    pub verdict: Verdict,
    #[serde(default)]
    pub reasons: Vec<VerdictReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames: Option<FrameScores>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlm: Option<VlmScores>,
    #[serde(default)]
    pub regressions: Vec<RegressionDelta>,
    #[serde(default)]
    pub baseline_status: BaselineStatus,
    /// SHA-256 of start and end keyframes, concatenated
    #[serde(default)]
    pub keyframe_digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_frame_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_frame_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SampleResult {
    /// Empty result for a sample, verdict pending.
    pub fn new(sample_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            sample_id: sample_id.into(),
            prompt: prompt.into(),
            verdict: Verdict::Pass,
            reasons: Vec::new(),
            frames: None,
            vlm: None,
            regressions: Vec::new(),
            baseline_status: BaselineStatus::Disabled,
            keyframe_digest: String::new(),
            video_path: None,
            first_frame_path: None,
            last_frame_path: None,
            generation_ms: None,
            error: None,
        }
    }

    /// Mark the sample as failed by an error that stopped its evaluation.
    pub fn failed(mut self, check: &str, error: impl Into<String>) -> Self {
        let error = error.into();
        self.reasons.push(VerdictReason::fail(check, error.clone()));
        self.error = Some(error);
        self.verdict = Verdict::Fail;
        self
    }

    /// Reasons that did not pass.
    pub fn problems(&self) -> impl Iterator<Item = &VerdictReason> {
        self.reasons.iter().filter(|r| r.verdict != Verdict::Pass)
    }
}

/// Aggregate counts for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub warned: usize,
    pub failed: usize,
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_similarity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_vlm: Option<f64>,
}

impl RunSummary {
    /// Summarize a set of sample results.
    pub fn from_results(results: &[SampleResult]) -> Self {
        let count = |v: Verdict| results.iter().filter(|r| r.verdict == v).count();

        Self {
            total: results.len(),
            passed: count(Verdict::Pass),
            warned: count(Verdict::Warn),
            failed: count(Verdict::Fail),
            verdict: Verdict::worst(results.iter().map(|r| r.verdict)),
            mean_similarity: mean(results.iter().filter_map(|r| r.frames.map(|f| f.average))),
            mean_vlm: mean(results.iter().filter_map(|r| r.vlm.as_ref().map(|v| v.overall))),
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Full report for one regression run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunReport {
    pub run_id: String,
    /// Manifest name
    pub manifest: String,
    /// Generation backend name
    pub backend: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub thresholds: QualityThresholds,
    pub samples: Vec<SampleResult>,
    pub summary: RunSummary,
}

impl RunReport {
    /// Find a sample result by id.
    pub fn sample(&self, sample_id: &str) -> Option<&SampleResult> {
        self.samples.iter().find(|s| s.sample_id == sample_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, verdict: Verdict, avg: Option<f64>) -> SampleResult {
        let mut r = SampleResult::new(id, "prompt");
        r.verdict = verdict;
        r.frames = avg.map(|a| FrameScores::new(a, a));
        r
    }

    #[test]
    fn test_summary_counts() {
        let results = vec![
            result("a", Verdict::Pass, Some(90.0)),
            result("b", Verdict::Warn, Some(70.0)),
            result("c", Verdict::Fail, None),
        ];
        let summary = RunSummary::from_results(&results);
        assert_eq!(summary.total, 3);
        assert_eq!((summary.passed, summary.warned, summary.failed), (1, 1, 1));
        assert_eq!(summary.verdict, Verdict::Fail);
        assert_eq!(summary.mean_similarity, Some(80.0));
        assert_eq!(summary.mean_vlm, None);
    }

    #[test]
    fn test_empty_summary_passes() {
        let summary = RunSummary::from_results(&[]);
        assert_eq!(summary.verdict, Verdict::Pass);
        assert_eq!(summary.total, 0);
    }

    #[test]
    fn test_failed_sets_error() {
        let r = SampleResult::new("a", "p").failed("generation", "backend down");
        assert_eq!(r.verdict, Verdict::Fail);
        assert_eq!(r.error.as_deref(), Some("backend down"));
        assert_eq!(r.problems().count(), 1);
    }

    #[test]
    fn test_regression_delta_sign() {
        let d = RegressionDelta::new("average_similarity", 85.0, 80.0, Verdict::Pass);
        assert!((d.delta + 5.0).abs() < f64::EPSILON);
    }
}
