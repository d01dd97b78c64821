//! Harness metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless a
//! recorder is installed (the API binary installs a Prometheus one).

use bookend_models::Verdict;

pub mod names {
    pub const SAMPLES_EVALUATED: &str = "bookend_samples_evaluated_total";
    pub const SAMPLE_DURATION: &str = "bookend_sample_duration_seconds";
    pub const VLM_CALLS: &str = "bookend_vlm_calls_total";
    pub const RUNS_COMPLETED: &str = "bookend_runs_completed_total";
}

pub fn record_sample(verdict: Verdict, duration_secs: f64) {
    metrics::counter!(names::SAMPLES_EVALUATED, "verdict" => verdict.as_str()).increment(1);
    metrics::histogram!(names::SAMPLE_DURATION).record(duration_secs);
}

pub fn record_vlm_call(success: bool) {
    let outcome = if success { "success" } else { "error" };
    metrics::counter!(names::VLM_CALLS, "outcome" => outcome).increment(1);
}

pub fn record_run(kind: &'static str, verdict: Verdict) {
    metrics::counter!(names::RUNS_COMPLETED, "kind" => kind, "verdict" => verdict.as_str())
        .increment(1);
}
