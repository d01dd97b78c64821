//! Narrative pipeline: shots in order, then shot-to-shot continuity.

use std::path::Path;

use bookend_media::compare_images;
use bookend_models::{
    BandThreshold, ContinuityCheck, NarrativeRun, NarrativeScript, NarrativeSummary, SampleResult,
    Verdict,
};
use bookend_storage::{new_run_id, ResultsStore};
use chrono::Utc;
use tracing::{info, warn, Instrument};

use crate::error::HarnessResult;
use crate::logging::RunLogger;
use crate::metrics;
use crate::qa::{evaluate_sample, QaContext};
use crate::report::render_narrative_markdown;

pub struct NarrativePipeline<'a> {
    ctx: QaContext<'a>,
    store: &'a ResultsStore,
}

impl<'a> NarrativePipeline<'a> {
    pub fn new(ctx: QaContext<'a>, store: &'a ResultsStore) -> Self {
        Self { ctx, store }
    }

    /// Evaluate every shot, check continuity between neighbours and persist
    /// the narrative run.
    pub async fn run(&self, script: &NarrativeScript) -> HarnessResult<NarrativeRun> {
        let run_id = new_run_id();
        let started_at = Utc::now();
        info!(
            run_id = %run_id,
            script_id = %script.id,
            shots = script.shots.len(),
            backend = self.ctx.backend.name(),
            "Starting narrative run"
        );

        let mut shots = Vec::with_capacity(script.shots.len());
        for shot in &script.shots {
            let logger = RunLogger::new(&run_id, &shot.id, "narrative");
            let span = logger.create_span();

            let result = async {
                match self.store.shot_dir(&run_id, &shot.id).await {
                    Ok(dir) => evaluate_sample(&self.ctx, shot, &dir, &logger).await,
                    Err(e) => SampleResult::new(&shot.id, &shot.prompt)
                        .failed("storage", e.to_string()),
                }
            }
            .instrument(span)
            .await;
            shots.push(result);
        }

        let continuity = continuity_checks(&shots, &self.ctx.thresholds.continuity);
        let run = NarrativeRun {
            run_id: run_id.clone(),
            script_id: script.id.clone(),
            title: script.title.clone(),
            backend: self.ctx.backend.name().to_string(),
            started_at,
            finished_at: Utc::now(),
            summary: NarrativeSummary::from_parts(&shots, &continuity),
            shots,
            continuity,
        };

        self.store.save_narrative(&run).await?;
        self.store
            .save_narrative_markdown(&run_id, &render_narrative_markdown(&run))
            .await?;
        metrics::record_run("narrative", run.summary.verdict);

        info!(
            run_id = %run_id,
            verdict = run.summary.verdict.as_str(),
            continuity_failures = run.summary.continuity_failures,
            "Narrative run finished"
        );
        Ok(run)
    }
}

/// Compare the last frame of each shot with the first frame of the next.
///
/// A pair with a missing frame, or frames that cannot be compared, warns.
pub fn continuity_checks(shots: &[SampleResult], band: &BandThreshold) -> Vec<ContinuityCheck> {
    shots
        .windows(2)
        .map(|pair| {
            let (from, to) = (&pair[0], &pair[1]);
            match (from.last_frame_path.as_deref(), to.first_frame_path.as_deref()) {
                (Some(last), Some(first)) => measure(from, to, last, first, band),
                _ => unmeasurable(from, to, "continuity not measurable: frame missing".to_string()),
            }
        })
        .collect()
}

fn measure(
    from: &SampleResult,
    to: &SampleResult,
    last: &Path,
    first: &Path,
    band: &BandThreshold,
) -> ContinuityCheck {
    match compare_images(last, first) {
        Ok(score) => {
            let verdict = band.classify(score.combined);
            ContinuityCheck {
                from_shot: from.sample_id.clone(),
                to_shot: to.sample_id.clone(),
                similarity: Some(score.combined),
                verdict,
                message: format!(
                    "{} -> {}: {:.1} ({})",
                    from.sample_id,
                    to.sample_id,
                    score.combined,
                    verdict.label()
                ),
            }
        }
        Err(e) => {
            warn!(from = %from.sample_id, to = %to.sample_id, error = %e, "Continuity comparison failed");
            unmeasurable(from, to, format!("continuity not measurable: {e}"))
        }
    }
}

fn unmeasurable(from: &SampleResult, to: &SampleResult, message: String) -> ContinuityCheck {
    ContinuityCheck {
        from_shot: from.sample_id.clone(),
        to_shot: to.sample_id.clone(),
        similarity: None,
        verdict: Verdict::Warn,
        message,
    }
}
