//! Shared data models for the bookend QA harness.
//!
//! This crate provides Serde-serializable types for:
//! - Bookend samples, sample manifests and narrative scripts
//! - Quality thresholds and pass/warn/fail verdicts
//! - Frame similarity and VLM scores
//! - Run reports, baselines and A/B comparisons
//! - Artifact metadata and done-marker payloads written by generators

pub mod baseline;
pub mod comparison;
pub mod error;
pub mod metadata;
pub mod narrative;
pub mod report;
pub mod sample;
pub mod scores;
pub mod thresholds;
pub mod verdict;

// Re-export common types
pub use baseline::{Baseline, BaselineMetrics, BASELINE_VERSION};
pub use comparison::{AbComparison, SampleComparison, Winner};
pub use error::{ModelError, ModelResult};
pub use metadata::{ArtifactMetadata, DoneMarker, SceneMetadata};
pub use narrative::{ContinuityCheck, NarrativeRun, NarrativeScript, NarrativeSummary, ShotSpec};
pub use report::{BaselineStatus, RegressionDelta, RunReport, RunSummary, SampleResult};
pub use sample::{BookendSample, SampleManifest};
pub use scores::{FrameScores, VlmScores};
pub use thresholds::{BandThreshold, QualityThresholds, RegressionThreshold};
pub use verdict::{Verdict, VerdictReason};
