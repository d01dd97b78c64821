//! End-to-end pipeline tests with in-process generation and scoring fakes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bookend_gen::{GenError, GenResult, GenerationBackend, GenerationOutput, GenerationRequest};
use bookend_harness::{baseline_from_report, NarrativePipeline, QaContext, RegressionPipeline};
use bookend_media::create_test_image;
use bookend_models::{
    BaselineStatus, BookendSample, NarrativeScript, QualityThresholds, SampleManifest, Verdict,
    VlmScores,
};
use bookend_storage::ResultsStore;
use bookend_vlm::{FrameScorer, ScoringInput, VlmError, VlmResult};
use tempfile::TempDir;

/// Copies the keyframes back as the clip's first and last frames.
struct EchoBackend {
    fail_sample: Option<String>,
    calls: AtomicUsize,
}

impl EchoBackend {
    fn new() -> Self {
        Self {
            fail_sample: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing_on(sample_id: &str) -> Self {
        Self {
            fail_sample: Some(sample_id.to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GenerationBackend for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    async fn health_check(&self) -> GenResult<()> {
        Ok(())
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        output_dir: &Path,
    ) -> GenResult<GenerationOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sample.as_deref() == Some(request.sample_id.as_str()) {
            return Err(GenError::generation_failed("out of memory"));
        }
        let first = output_dir.join("frame_00001.jpg");
        let last = output_dir.join("frame_00025.jpg");
        tokio::fs::copy(&request.start_keyframe, &first).await?;
        tokio::fs::copy(&request.end_keyframe, &last).await?;
        Ok(GenerationOutput {
            video_path: None,
            frame_paths: vec![first, last],
            duration_ms: 42,
            seed: request.seed,
        })
    }
}

struct FixedScorer(Option<f64>);

#[async_trait]
impl FrameScorer for FixedScorer {
    async fn available_models(&self) -> VlmResult<Vec<String>> {
        Ok(vec!["fixed".to_string()])
    }

    async fn score(&self, _input: &ScoringInput) -> VlmResult<VlmScores> {
        let overall = self.0.ok_or_else(|| VlmError::ServiceUnavailable("offline".to_string()))?;
        Ok(VlmScores {
            prompt_adherence: overall,
            start_fidelity: overall,
            end_fidelity: overall,
            temporal_coherence: overall,
            artifact_free: overall,
            overall,
            issues: Vec::new(),
            summary: "looks right".to_string(),
            model: Some("fixed".to_string()),
        })
    }
}

struct Fixture {
    _tmp: TempDir,
    keyframe: PathBuf,
    store: ResultsStore,
}

fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let keyframe = tmp.path().join("keyframes").join("test.jpg");
    std::fs::create_dir_all(keyframe.parent().unwrap()).unwrap();
    create_test_image(&keyframe).unwrap();
    let store = ResultsStore::new(tmp.path().join("results"), tmp.path().join("baseline.json"));
    Fixture {
        _tmp: tmp,
        keyframe,
        store,
    }
}

fn manifest(keyframe: &Path, ids: &[&str]) -> SampleManifest {
    SampleManifest {
        name: "smoke".to_string(),
        samples: ids
            .iter()
            .map(|id| BookendSample::new(*id, "a calm scene", keyframe, keyframe))
            .collect(),
    }
}

#[tokio::test]
async fn test_regression_run_passes_and_persists() {
    let fx = fixture();
    let backend = EchoBackend::new();
    let scorer = FixedScorer(Some(90.0));
    let thresholds = QualityThresholds::default();
    let ctx = QaContext {
        backend: &backend,
        scorer: Some(&scorer),
        thresholds: &thresholds,
        baseline: None,
    };

    let report = RegressionPipeline::new(ctx, &fx.store)
        .run(&manifest(&fx.keyframe, &["s1", "s2"]))
        .await
        .unwrap();

    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.verdict, Verdict::Pass);
    for sample in &report.samples {
        let frames = sample.frames.unwrap();
        assert!(frames.average > 95.0, "average {}", frames.average);
        assert_eq!(sample.vlm.as_ref().unwrap().overall, 90.0);
        assert_eq!(sample.baseline_status, BaselineStatus::Disabled);
        assert_eq!(sample.generation_ms, Some(42));
        assert!(!sample.keyframe_digest.is_empty());
    }

    let loaded = fx.store.load_report(&report.run_id).await.unwrap();
    assert_eq!(loaded, report);
    let markdown = fx.store.run_dir(&report.run_id).unwrap().join("report.md");
    assert!(markdown.exists());
    assert_eq!(fx.store.list_runs().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_generation_failure_fails_only_that_sample() {
    let fx = fixture();
    let backend = EchoBackend::failing_on("s2");
    let scorer = FixedScorer(Some(90.0));
    let thresholds = QualityThresholds::default();
    let ctx = QaContext {
        backend: &backend,
        scorer: Some(&scorer),
        thresholds: &thresholds,
        baseline: None,
    };

    let report = RegressionPipeline::new(ctx, &fx.store)
        .run(&manifest(&fx.keyframe, &["s1", "s2"]))
        .await
        .unwrap();

    assert_eq!(report.samples[0].verdict, Verdict::Pass);
    let failed = &report.samples[1];
    assert_eq!(failed.verdict, Verdict::Fail);
    assert!(failed.error.as_deref().unwrap().contains("out of memory"));
    assert!(failed.frames.is_none());
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.verdict, Verdict::Fail);
}

#[tokio::test]
async fn test_vlm_outage_warns_unless_required() {
    let fx = fixture();
    let backend = EchoBackend::new();
    let offline = FixedScorer(None);
    let manifest = manifest(&fx.keyframe, &["s1"]);

    let thresholds = QualityThresholds::default();
    let ctx = QaContext {
        backend: &backend,
        scorer: Some(&offline),
        thresholds: &thresholds,
        baseline: None,
    };
    let report = RegressionPipeline::new(ctx, &fx.store).run(&manifest).await.unwrap();
    assert!(report.samples[0].vlm.is_none());
    assert_eq!(report.summary.verdict, Verdict::Warn);

    let required = QualityThresholds {
        vlm_required: true,
        ..QualityThresholds::default()
    };
    let ctx = QaContext {
        thresholds: &required,
        ..ctx
    };
    let report = RegressionPipeline::new(ctx, &fx.store).run(&manifest).await.unwrap();
    assert_eq!(report.summary.verdict, Verdict::Fail);
}

#[tokio::test]
async fn test_baseline_matched_stale_and_regressed() {
    let fx = fixture();
    let backend = EchoBackend::new();
    let scorer = FixedScorer(Some(90.0));
    let thresholds = QualityThresholds::default();
    let manifest = manifest(&fx.keyframe, &["s1", "s2", "s3"]);

    let ctx = QaContext {
        backend: &backend,
        scorer: Some(&scorer),
        thresholds: &thresholds,
        baseline: None,
    };
    let first = RegressionPipeline::new(ctx, &fx.store).run(&manifest).await.unwrap();

    let mut baseline = baseline_from_report(&first, false);
    assert_eq!(baseline.len(), 3);
    baseline.samples.get_mut("s2").unwrap().keyframe_digest = "changed".to_string();
    baseline.samples.get_mut("s3").unwrap().average += 15.0;
    tokio_test::assert_ok!(fx.store.save_baseline(&baseline).await);
    let baseline = fx.store.load_baseline().await.unwrap().unwrap();

    let ctx = QaContext {
        baseline: Some(&baseline),
        ..ctx
    };
    let second = RegressionPipeline::new(ctx, &fx.store).run(&manifest).await.unwrap();

    let s1 = second.sample("s1").unwrap();
    assert_eq!(s1.baseline_status, BaselineStatus::Matched);
    assert_eq!(s1.verdict, Verdict::Pass);
    assert_eq!(s1.regressions.len(), 2);

    let s2 = second.sample("s2").unwrap();
    assert_eq!(s2.baseline_status, BaselineStatus::Stale);
    assert!(s2.regressions.is_empty());
    assert_eq!(s2.verdict, Verdict::Warn);

    let s3 = second.sample("s3").unwrap();
    assert_eq!(s3.baseline_status, BaselineStatus::Matched);
    assert_eq!(s3.verdict, Verdict::Fail);
    assert!(s3.regressions.iter().any(|d| d.verdict == Verdict::Fail));
}

fn assert_send<F: std::future::Future + Send>(future: F) -> F {
    future
}

#[tokio::test]
async fn test_pipeline_futures_are_send() {
    let fx = fixture();
    let backend = EchoBackend::new();
    let scorer = FixedScorer(Some(90.0));
    let thresholds = QualityThresholds::default();
    let ctx = QaContext {
        backend: &backend,
        scorer: Some(&scorer),
        thresholds: &thresholds,
        baseline: None,
    };
    let samples = manifest(&fx.keyframe, &["s1"]);
    let script = NarrativeScript {
        id: "story".to_string(),
        title: "One shot".to_string(),
        shots: samples.samples.clone(),
    };

    let regression = RegressionPipeline::new(ctx, &fx.store);
    let report = assert_send(regression.run(&samples)).await.unwrap();
    assert_eq!(report.summary.verdict, Verdict::Pass);

    let narrative = NarrativePipeline::new(ctx, &fx.store);
    let run = assert_send(narrative.run(&script)).await.unwrap();
    assert_eq!(run.shots.len(), 1);
}

#[tokio::test]
async fn test_narrative_run_checks_continuity() {
    let fx = fixture();
    let backend = EchoBackend::new();
    let scorer = FixedScorer(Some(85.0));
    let thresholds = QualityThresholds::default();
    let ctx = QaContext {
        backend: &backend,
        scorer: Some(&scorer),
        thresholds: &thresholds,
        baseline: None,
    };
    let script = NarrativeScript {
        id: "story".to_string(),
        title: "A short story".to_string(),
        shots: ["opening", "middle", "closing"]
            .iter()
            .map(|id| BookendSample::new(*id, "a calm scene", &fx.keyframe, &fx.keyframe))
            .collect(),
    };

    let run = NarrativePipeline::new(ctx, &fx.store).run(&script).await.unwrap();

    assert_eq!(run.shots.len(), 3);
    assert_eq!(run.continuity.len(), 2);
    assert_eq!(run.continuity[0].from_shot, "opening");
    assert_eq!(run.continuity[1].to_shot, "closing");
    assert!(run.continuity.iter().all(|c| c.verdict == Verdict::Pass));
    assert_eq!(run.summary.continuity_failures, 0);
    assert_eq!(run.summary.verdict, Verdict::Pass);

    let loaded = fx.store.load_narrative(&run.run_id).await.unwrap();
    assert_eq!(loaded.script_id, "story");
    assert_eq!(fx.store.list_narratives().await.unwrap().len(), 1);
}
