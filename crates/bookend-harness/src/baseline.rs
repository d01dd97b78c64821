//! Baseline matching, creation and merging.

use bookend_models::{Baseline, BaselineMetrics, BaselineStatus, RunReport};
use tracing::info;

/// Status of a sample against the configured baseline.
pub fn baseline_status<'a>(
    baseline: Option<&'a Baseline>,
    sample_id: &str,
    keyframe_digest: &str,
) -> (BaselineStatus, Option<&'a BaselineMetrics>) {
    let Some(baseline) = baseline else {
        return (BaselineStatus::Disabled, None);
    };
    match baseline.get(sample_id) {
        None => (BaselineStatus::Missing, None),
        Some(m) if m.keyframe_digest != keyframe_digest => (BaselineStatus::Stale, Some(m)),
        Some(m) => (BaselineStatus::Matched, Some(m)),
    }
}

/// Build a baseline from a run. Samples without frame scores are skipped,
/// and failed samples too unless `include_failed`.
pub fn baseline_from_report(report: &RunReport, include_failed: bool) -> Baseline {
    let mut baseline = Baseline::new(Some(report.run_id.clone()));
    for sample in &report.samples {
        if sample.verdict.is_fail() && !include_failed {
            continue;
        }
        if let Some(metrics) = BaselineMetrics::from_result(sample) {
            baseline.samples.insert(sample.sample_id.clone(), metrics);
        }
    }
    info!(
        run_id = %report.run_id,
        samples = baseline.len(),
        "Built baseline from run"
    );
    baseline
}

/// Replace per-sample entries of `existing` with those in `update`.
pub fn merge_baseline(existing: Option<Baseline>, update: Baseline) -> Baseline {
    let Some(mut merged) = existing else {
        return update;
    };
    merged.samples.extend(update.samples);
    merged.created_at = update.created_at;
    merged.source_run = update.source_run;
    merged.version = update.version;
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookend_models::{FrameScores, QualityThresholds, RunSummary, SampleResult, Verdict};
    use chrono::Utc;

    fn result(id: &str, avg: f64, verdict: Verdict) -> SampleResult {
        let mut r = SampleResult::new(id, "p");
        r.frames = Some(FrameScores::new(avg, avg));
        r.verdict = verdict;
        r.keyframe_digest = format!("digest-{id}");
        r
    }

    fn report(samples: Vec<SampleResult>) -> RunReport {
        RunReport {
            run_id: "run-1".into(),
            manifest: "m".into(),
            backend: "comfyui".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            thresholds: QualityThresholds::default(),
            summary: RunSummary::from_results(&samples),
            samples,
        }
    }

    #[test]
    fn test_status() {
        let base = baseline_from_report(&report(vec![result("a", 90.0, Verdict::Pass)]), false);

        assert_eq!(baseline_status(None, "a", "x").0, BaselineStatus::Disabled);
        assert_eq!(baseline_status(Some(&base), "zzz", "x").0, BaselineStatus::Missing);
        assert_eq!(baseline_status(Some(&base), "a", "other").0, BaselineStatus::Stale);
        let (status, metrics) = baseline_status(Some(&base), "a", "digest-a");
        assert_eq!(status, BaselineStatus::Matched);
        assert_eq!(metrics.unwrap().average, 90.0);
    }

    #[test]
    fn test_failed_samples_excluded_by_default() {
        let mut no_frames = SampleResult::new("c", "p");
        no_frames.verdict = Verdict::Warn;
        let r = report(vec![
            result("a", 90.0, Verdict::Pass),
            result("b", 40.0, Verdict::Fail),
            no_frames,
        ]);

        let base = baseline_from_report(&r, false);
        assert_eq!(base.len(), 1);
        assert_eq!(base.source_run.as_deref(), Some("run-1"));

        let all = baseline_from_report(&r, true);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_merge_replaces_entries() {
        let old = baseline_from_report(
            &report(vec![result("a", 80.0, Verdict::Pass), result("b", 80.0, Verdict::Pass)]),
            false,
        );
        let mut update_report = report(vec![result("a", 95.0, Verdict::Pass)]);
        update_report.run_id = "run-2".into();
        let update = baseline_from_report(&update_report, false);

        let merged = merge_baseline(Some(old), update.clone());
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get("a").unwrap().average, 95.0);
        assert_eq!(merged.get("b").unwrap().average, 80.0);
        assert_eq!(merged.source_run.as_deref(), Some("run-2"));

        assert_eq!(merge_baseline(None, update.clone()), update);
    }
}
