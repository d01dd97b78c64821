//! Per-sample QA: generate, extract bookend frames, score, judge.
//!
//! Shared by the regression and narrative pipelines. Errors never escape:
//! a sample that cannot be evaluated becomes a failed `SampleResult`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use bookend_gen::{GenerationBackend, GenerationOutput, GenerationRequest};
use bookend_media::{compare_images, extract_first_frame, extract_last_frame, keyframe_digest};
use bookend_models::{
    Baseline, BaselineStatus, BookendSample, FrameScores, QualityThresholds, SampleResult,
    VerdictReason, VlmScores,
};
use bookend_vlm::{FrameScorer, ScoringInput};

use crate::baseline::baseline_status;
use crate::error::{HarnessError, HarnessResult};
use crate::logging::RunLogger;
use crate::metrics;
use crate::verdict::{
    aggregate, check_regressions, evaluate_frames, evaluate_vlm, regression_reasons, CHECK_BASELINE,
};

pub const FIRST_FRAME_FILE: &str = "first_frame.png";
pub const LAST_FRAME_FILE: &str = "last_frame.png";

/// Collaborators for evaluating samples.
#[derive(Clone, Copy)]
pub struct QaContext<'a> {
    pub backend: &'a dyn GenerationBackend,
    pub scorer: Option<&'a dyn FrameScorer>,
    pub thresholds: &'a QualityThresholds,
    pub baseline: Option<&'a Baseline>,
}

/// Run the full QA sequence for one sample, writing artifacts to `artifact_dir`.
pub async fn evaluate_sample(
    ctx: &QaContext<'_>,
    sample: &BookendSample,
    artifact_dir: &Path,
    logger: &RunLogger,
) -> SampleResult {
    let started = Instant::now();
    logger.log_start(&sample.prompt);

    let result = evaluate_inner(ctx, sample, artifact_dir, logger).await;

    metrics::record_sample(result.verdict, started.elapsed().as_secs_f64());
    match &result.error {
        Some(e) => logger.log_error(e),
        None => logger.log_completion(&format!("verdict {}", result.verdict.label())),
    }
    result
}

async fn evaluate_inner(
    ctx: &QaContext<'_>,
    sample: &BookendSample,
    artifact_dir: &Path,
    logger: &RunLogger,
) -> SampleResult {
    let mut result = SampleResult::new(&sample.id, &sample.prompt);

    match keyframe_digest(&sample.start_keyframe, &sample.end_keyframe) {
        Ok(digest) => result.keyframe_digest = digest,
        Err(e) => return result.failed("keyframes", e.to_string()),
    }
    let (status, baseline) = baseline_status(ctx.baseline, &sample.id, &result.keyframe_digest);
    result.baseline_status = status;

    let request = GenerationRequest::from(sample);
    let output = match ctx.backend.generate(&request, artifact_dir).await {
        Ok(output) => output,
        Err(e) => return result.failed("generation", e.to_string()),
    };
    result.generation_ms = Some(output.duration_ms);
    result.video_path = output.video_path.clone();
    logger.log_progress(&format!("generated in {} ms", output.duration_ms));

    let (first, last) = match bookend_frames(&output, artifact_dir).await {
        Ok(frames) => frames,
        Err(e) => return result.failed("frames", e.to_string()),
    };
    result.first_frame_path = Some(first.clone());
    result.last_frame_path = Some(last.clone());

    let frames = match score_frames(sample, &first, &last) {
        Ok(frames) => frames,
        Err(e) => return result.failed("similarity", e.to_string()),
    };
    result.frames = Some(frames);
    logger.log_progress(&format!(
        "similarity start {:.1} end {:.1}",
        frames.start_similarity, frames.end_similarity
    ));

    result.vlm = match ctx.scorer {
        Some(scorer) => score_vlm(scorer, sample, &first, &last, logger).await,
        None => None,
    };

    result.reasons.extend(evaluate_frames(&frames, ctx.thresholds));
    result.reasons.push(evaluate_vlm(result.vlm.as_ref(), ctx.thresholds));

    match (status, baseline) {
        (BaselineStatus::Stale, _) => result.reasons.push(VerdictReason::warn(
            CHECK_BASELINE,
            "keyframes changed since baseline; regression check skipped",
        )),
        (BaselineStatus::Matched, Some(metrics)) => {
            result.regressions =
                check_regressions(&frames, result.vlm.as_ref(), metrics, &ctx.thresholds.regression);
            result.reasons.extend(regression_reasons(&result.regressions));
        }
        _ => {}
    }

    result.verdict = aggregate(&result.reasons);
    result
}

/// First and last frame of the generated clip.
///
/// Videos are decoded with FFmpeg into `artifact_dir`; frame sequences are
/// used as-is.
pub async fn bookend_frames(
    output: &GenerationOutput,
    artifact_dir: &Path,
) -> HarnessResult<(PathBuf, PathBuf)> {
    if let Some(video) = &output.video_path {
        let first = artifact_dir.join(FIRST_FRAME_FILE);
        let last = artifact_dir.join(LAST_FRAME_FILE);
        extract_first_frame(video, &first).await?;
        extract_last_frame(video, &last).await?;
        return Ok((first, last));
    }

    match (output.first_frame(), output.last_frame()) {
        (Some(first), Some(last)) => Ok((first.to_path_buf(), last.to_path_buf())),
        _ => Err(HarnessError::Generation(bookend_gen::GenError::NoOutputs)),
    }
}

fn score_frames(sample: &BookendSample, first: &Path, last: &Path) -> HarnessResult<FrameScores> {
    let start = compare_images(first, &sample.start_keyframe)?;
    let end = compare_images(last, &sample.end_keyframe)?;
    Ok(FrameScores::new(start.combined, end.combined))
}

async fn score_vlm(
    scorer: &dyn FrameScorer,
    sample: &BookendSample,
    first: &Path,
    last: &Path,
    logger: &RunLogger,
) -> Option<VlmScores> {
    let input = ScoringInput {
        prompt: sample.prompt.clone(),
        start_keyframe: sample.start_keyframe.clone(),
        end_keyframe: sample.end_keyframe.clone(),
        first_frame: first.to_path_buf(),
        last_frame: last.to_path_buf(),
    };
    match scorer.score(&input).await {
        Ok(scores) => {
            metrics::record_vlm_call(true);
            Some(scores)
        }
        Err(e) => {
            metrics::record_vlm_call(false);
            logger.log_warning(&format!("VLM unavailable: {e}"));
            None
        }
    }
}
