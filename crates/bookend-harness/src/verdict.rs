//! Threshold evaluation and verdict aggregation.

use bookend_models::{
    BaselineMetrics, FrameScores, QualityThresholds, RegressionDelta, RegressionThreshold,
    RunSummary, SampleResult, Verdict, VerdictReason, VlmScores,
};

pub const CHECK_START: &str = "start_similarity";
pub const CHECK_END: &str = "end_similarity";
pub const CHECK_AVERAGE: &str = "average_similarity";
pub const CHECK_VLM: &str = "vlm_overall";
pub const CHECK_BASELINE: &str = "baseline";

/// Classify start, end and average similarity.
pub fn evaluate_frames(frames: &FrameScores, thresholds: &QualityThresholds) -> Vec<VerdictReason> {
    let band = &thresholds.similarity;
    [
        (CHECK_START, frames.start_similarity),
        (CHECK_END, frames.end_similarity),
        (CHECK_AVERAGE, frames.average),
    ]
    .into_iter()
    .map(|(check, score)| {
        let verdict = band.classify(score);
        VerdictReason::new(check, verdict, band_message(check, score, verdict, band.fail_below, band.warn_below))
    })
    .collect()
}

/// Classify the VLM overall score. A missing score warns, or fails when
/// `vlm_required` is set.
pub fn evaluate_vlm(vlm: Option<&VlmScores>, thresholds: &QualityThresholds) -> VerdictReason {
    match vlm {
        Some(scores) => {
            let band = &thresholds.vlm;
            let verdict = band.classify(scores.overall);
            VerdictReason::new(
                CHECK_VLM,
                verdict,
                band_message(CHECK_VLM, scores.overall, verdict, band.fail_below, band.warn_below),
            )
        }
        None if thresholds.vlm_required => VerdictReason::fail(CHECK_VLM, "VLM unavailable (required)"),
        None => VerdictReason::warn(CHECK_VLM, "VLM unavailable"),
    }
}

/// Deltas versus baseline for average similarity and, when both sides have
/// it, VLM overall.
pub fn check_regressions(
    frames: &FrameScores,
    vlm: Option<&VlmScores>,
    baseline: &BaselineMetrics,
    threshold: &RegressionThreshold,
) -> Vec<RegressionDelta> {
    let mut deltas = Vec::with_capacity(2);

    let delta = frames.average - baseline.average;
    deltas.push(RegressionDelta::new(
        CHECK_AVERAGE,
        baseline.average,
        frames.average,
        threshold.classify(delta),
    ));

    if let (Some(current), Some(base)) = (vlm, baseline.vlm_overall) {
        let delta = current.overall - base;
        deltas.push(RegressionDelta::new(
            CHECK_VLM,
            base,
            current.overall,
            threshold.classify(delta),
        ));
    }
    deltas
}

/// One reason per regression delta.
pub fn regression_reasons(deltas: &[RegressionDelta]) -> Vec<VerdictReason> {
    deltas
        .iter()
        .map(|d| {
            VerdictReason::new(
                format!("regression.{}", d.metric),
                d.verdict,
                format!(
                    "{}: {:.1} -> {:.1} ({:+.1} vs baseline)",
                    d.metric, d.baseline, d.current, d.delta
                ),
            )
        })
        .collect()
}

/// Worst verdict across reasons; `Pass` when there are none.
pub fn aggregate(reasons: &[VerdictReason]) -> Verdict {
    Verdict::worst(reasons.iter().map(|r| r.verdict))
}

/// Counts, means and overall verdict for a finished run.
pub fn summarize(samples: &[SampleResult]) -> RunSummary {
    RunSummary::from_results(samples)
}

/// Whether a run verdict counts as success for the process exit code.
pub fn is_success(verdict: Verdict, strict: bool) -> bool {
    match verdict {
        Verdict::Pass => true,
        Verdict::Warn => !strict,
        Verdict::Fail => false,
    }
}

fn band_message(check: &str, score: f64, verdict: Verdict, fail_below: f64, warn_below: f64) -> String {
    match verdict {
        Verdict::Pass => format!("{check} {score:.1} >= {warn_below:.1}"),
        Verdict::Warn => format!("{check} {score:.1} below warn threshold {warn_below:.1}"),
        Verdict::Fail => format!("{check} {score:.1} below fail threshold {fail_below:.1}"),
    }
}
