//! Regression pipeline: every manifest sample, sequentially.

use bookend_models::{RunReport, SampleManifest, SampleResult};
use bookend_storage::{new_run_id, ResultsStore};
use chrono::Utc;
use tracing::{info, Instrument};

use crate::error::HarnessResult;
use crate::logging::RunLogger;
use crate::metrics;
use crate::qa::{evaluate_sample, QaContext};
use crate::report::render_run_markdown;
use crate::verdict::summarize;

pub struct RegressionPipeline<'a> {
    ctx: QaContext<'a>,
    store: &'a ResultsStore,
}

impl<'a> RegressionPipeline<'a> {
    pub fn new(ctx: QaContext<'a>, store: &'a ResultsStore) -> Self {
        Self { ctx, store }
    }

    /// Evaluate every sample and persist the report (JSON + Markdown).
    ///
    /// Per-sample failures are recorded in the report; only storage errors
    /// abort the run.
    pub async fn run(&self, manifest: &SampleManifest) -> HarnessResult<RunReport> {
        let run_id = new_run_id();
        let started_at = Utc::now();
        info!(
            run_id = %run_id,
            manifest = %manifest.name,
            samples = manifest.samples.len(),
            backend = self.ctx.backend.name(),
            "Starting regression run"
        );

        let mut samples = Vec::with_capacity(manifest.samples.len());
        for sample in &manifest.samples {
            let logger = RunLogger::new(&run_id, &sample.id, "regression");
            let span = logger.create_span();

            let result = async {
                match self.store.sample_dir(&run_id, &sample.id).await {
                    Ok(dir) => evaluate_sample(&self.ctx, sample, &dir, &logger).await,
                    Err(e) => SampleResult::new(&sample.id, &sample.prompt)
                        .failed("storage", e.to_string()),
                }
            }
            .instrument(span)
            .await;
            samples.push(result);
        }

        let report = RunReport {
            run_id: run_id.clone(),
            manifest: manifest.name.clone(),
            backend: self.ctx.backend.name().to_string(),
            started_at,
            finished_at: Utc::now(),
            thresholds: self.ctx.thresholds.clone(),
            summary: summarize(&samples),
            samples,
        };

        self.store.save_report(&report).await?;
        self.store
            .save_markdown(&run_id, &render_run_markdown(&report))
            .await?;
        metrics::record_run("regression", report.summary.verdict);

        info!(
            run_id = %run_id,
            verdict = report.summary.verdict.as_str(),
            passed = report.summary.passed,
            warned = report.summary.warned,
            failed = report.summary.failed,
            "Regression run finished"
        );
        Ok(report)
    }
}
