//! Quality thresholds.
//!
//! Scores are on a 0-100 scale. A score strictly below `fail_below` fails,
//! strictly below `warn_below` warns, anything else passes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::verdict::Verdict;

/// Two-level band for a single score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BandThreshold {
    pub fail_below: f64,
    pub warn_below: f64,
}

impl BandThreshold {
    pub const fn new(fail_below: f64, warn_below: f64) -> Self {
        Self {
            fail_below,
            warn_below,
        }
    }

    /// Classify a score against this band. NaN always fails.
    pub fn classify(&self, score: f64) -> Verdict {
        if score.is_nan() || score < self.fail_below {
            Verdict::Fail
        } else if score < self.warn_below {
            Verdict::Warn
        } else {
            Verdict::Pass
        }
    }

    fn validate(&self, name: &str) -> ModelResult<()> {
        if !(0.0..=100.0).contains(&self.fail_below) || !(0.0..=100.0).contains(&self.warn_below) {
            return Err(ModelError::invalid_threshold(format!(
                "{name}: bounds must be within 0-100"
            )));
        }
        if self.fail_below > self.warn_below {
            return Err(ModelError::invalid_threshold(format!(
                "{name}: fail_below ({}) exceeds warn_below ({})",
                self.fail_below, self.warn_below
            )));
        }
        Ok(())
    }
}

/// Maximum allowed drop versus baseline, in score points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RegressionThreshold {
    pub warn_drop: f64,
    pub fail_drop: f64,
}

impl Default for RegressionThreshold {
    fn default() -> Self {
        Self {
            warn_drop: 5.0,
            fail_drop: 10.0,
        }
    }
}

impl RegressionThreshold {
    /// Classify a delta (`current - baseline`). Only drops are penalised.
    pub fn classify(&self, delta: f64) -> Verdict {
        let drop = -delta;
        if delta.is_nan() || drop > self.fail_drop {
            Verdict::Fail
        } else if drop > self.warn_drop {
            Verdict::Warn
        } else {
            Verdict::Pass
        }
    }
}

/// Full threshold set applied to a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct QualityThresholds {
    /// Start, end and average frame similarity
    pub similarity: BandThreshold,
    /// VLM overall score
    pub vlm: BandThreshold,
    /// Shot-to-shot similarity in narrative runs
    pub continuity: BandThreshold,
    /// Drift versus baseline
    pub regression: RegressionThreshold,
    /// Fail samples when the VLM could not score them
    pub vlm_required: bool,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            similarity: BandThreshold::new(70.0, 80.0),
            vlm: BandThreshold::new(60.0, 75.0),
            continuity: BandThreshold::new(50.0, 65.0),
            regression: RegressionThreshold::default(),
            vlm_required: false,
        }
    }
}

impl QualityThresholds {
    /// Check internal consistency of every band.
    pub fn validate(&self) -> ModelResult<()> {
        self.similarity.validate("similarity")?;
        self.vlm.validate("vlm")?;
        self.continuity.validate("continuity")?;

        let r = &self.regression;
        if r.warn_drop < 0.0 || r.fail_drop < 0.0 {
            return Err(ModelError::invalid_threshold("regression: drops must be non-negative"));
        }
        if r.warn_drop > r.fail_drop {
            return Err(ModelError::invalid_threshold(format!(
                "regression: warn_drop ({}) exceeds fail_drop ({})",
                r.warn_drop, r.fail_drop
            )));
        }
        Ok(())
    }
}
