//! `bookend-qa` command line.
//!
//! Exit codes: 0 pass (warn passes unless `--strict`), 1 fail, 2 setup error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bookend_media::MediaError;
use bookend_models::{
    Baseline, NarrativeRun, NarrativeScript, QualityThresholds, RunReport, SampleManifest,
};
use bookend_storage::ResultsStore;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

use crate::backends::{build_scorer, Backend};
use crate::baseline::{baseline_from_report, merge_baseline};
use crate::compare::compare_reports;
use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::narrative::NarrativePipeline;
use crate::pipeline::RegressionPipeline;
use crate::preflight::run_preflight;
use crate::qa::QaContext;
use crate::report::render_comparison;
use crate::text_checks::{self, TextCheckKind};
use crate::verdict::is_success;

pub const EXIT_PASS: i32 = 0;
pub const EXIT_FAIL: i32 = 1;
pub const EXIT_SETUP: i32 = 2;

#[derive(Debug, Parser)]
#[command(name = "bookend-qa")]
#[command(about = "Quality gate for bookend (start/end keyframe) video generation")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to ./bookend.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON on stdout
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check backend, workflow, FFmpeg and VLM before a run
    Preflight,
    /// Run the regression manifest
    Run {
        #[arg(long)]
        manifest: PathBuf,
        /// Compare against the stored baseline
        #[arg(long, default_value_t = false)]
        baseline: bool,
        #[arg(long, default_value_t = false)]
        no_vlm: bool,
        /// Treat warnings as failures
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
    /// Run a multi-shot narrative script
    Narrative {
        #[arg(long)]
        script: PathBuf,
        #[arg(long, default_value_t = false)]
        no_vlm: bool,
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
    Baseline {
        #[command(subcommand)]
        command: BaselineCommand,
    },
    /// Compare two regression runs sample by sample
    Compare { run_a: String, run_b: String },
    /// Text quality checks over artifact-metadata.json
    TextCheck {
        #[arg(value_enum)]
        check: TextCheckKind,
        #[arg(default_value = "logs")]
        path: PathBuf,
    },
    Marker {
        #[command(subcommand)]
        command: MarkerCommand,
    },
    /// Write the synthetic 576x1024 test keyframe
    TestImage { out: PathBuf },
    /// Check that a frame sequence has at least `expected` frames
    VerifyOutput {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        prefix: String,
        #[arg(long)]
        expected: usize,
    },
    /// Print the JSON schema of an input or output document
    Schema {
        #[arg(value_enum, default_value_t = SchemaKind::Manifest)]
        kind: SchemaKind,
    },
}

#[derive(Debug, Subcommand)]
pub enum BaselineCommand {
    /// Promote a run to the baseline
    Update {
        #[arg(long)]
        run: String,
        #[arg(long, default_value_t = false)]
        include_failed: bool,
    },
    Show,
}

#[derive(Debug, Subcommand)]
pub enum MarkerCommand {
    /// Write `<prefix>.done` into the output directory
    Write {
        #[arg(long)]
        output_dir: PathBuf,
        #[arg(long)]
        prefix: String,
        #[arg(long)]
        frames: Option<u32>,
        /// Suffix of the temporary file renamed into place
        #[arg(long, default_value = bookend_media::DEFAULT_TMP_EXT)]
        tmp_ext: String,
    },
    /// Block until `<prefix>.done` appears
    Wait {
        #[arg(long)]
        output_dir: PathBuf,
        #[arg(long)]
        prefix: String,
        #[arg(long, default_value_t = 600)]
        timeout_secs: u64,
        #[arg(long, default_value_t = 1000)]
        poll_ms: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchemaKind {
    Manifest,
    Narrative,
    Report,
    NarrativeRun,
    Baseline,
    Thresholds,
}

fn emit<T: Serialize>(
    json: bool,
    value: &T,
    human: impl FnOnce(&T) -> String,
) -> HarnessResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", human(value));
    }
    Ok(())
}

fn store(config: &HarnessConfig) -> ResultsStore {
    ResultsStore::new(&config.paths.results_dir, &config.paths.baseline_path)
}

fn verdict_exit(passed: bool) -> i32 {
    if passed {
        EXIT_PASS
    } else {
        EXIT_FAIL
    }
}

/// Execute a parsed command, returning the process exit code.
///
/// Errors are setup failures; the caller maps them to exit code 2.
pub async fn execute(cli: Cli) -> HarnessResult<i32> {
    let json = cli.json;
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Preflight => {
            let config = HarnessConfig::load(config_path)?;
            let backend = Backend::from_config(&config)?;
            let scorer = build_scorer(&config, false)?;
            let report = run_preflight(&backend, scorer.as_deref(), &config.thresholds).await;
            emit(json, &report, |r| {
                let mut lines: Vec<String> = r
                    .checks
                    .iter()
                    .map(|c| format!("[{}] {}: {}", c.verdict.label(), c.name, c.message))
                    .collect();
                lines.push(format!("Preflight: {}", r.verdict.label()));
                lines.join("\n")
            })?;
            Ok(verdict_exit(!report.verdict.is_fail()))
        }

        Commands::Run {
            manifest,
            baseline,
            no_vlm,
            strict,
        } => {
            let config = HarnessConfig::load(config_path)?;
            let manifest = SampleManifest::load(&manifest)?;
            let backend = Backend::from_config(&config)?;
            let scorer = build_scorer(&config, no_vlm)?;
            let store = store(&config);

            let baseline = if baseline {
                let loaded = store.load_baseline().await?;
                if loaded.is_none() {
                    info!(path = %store.baseline_path().display(), "No baseline yet; regression checks skipped");
                }
                loaded
            } else {
                None
            };

            let ctx = QaContext {
                backend: backend.as_generation(),
                scorer: scorer.as_deref(),
                thresholds: &config.thresholds,
                baseline: baseline.as_ref(),
            };
            let report = RegressionPipeline::new(ctx, &store).run(&manifest).await?;
            emit(json, &report, |r| run_summary_line(r, &store))?;
            Ok(verdict_exit(is_success(report.summary.verdict, strict)))
        }

        Commands::Narrative {
            script,
            no_vlm,
            strict,
        } => {
            let config = HarnessConfig::load(config_path)?;
            let script = NarrativeScript::load(&script)?;
            let backend = Backend::from_config(&config)?;
            let scorer = build_scorer(&config, no_vlm)?;
            let store = store(&config);

            let ctx = QaContext {
                backend: backend.as_generation(),
                scorer: scorer.as_deref(),
                thresholds: &config.thresholds,
                baseline: None,
            };
            let run = NarrativePipeline::new(ctx, &store).run(&script).await?;
            emit(json, &run, |r| narrative_summary_line(r, &store))?;
            Ok(verdict_exit(is_success(run.summary.verdict, strict)))
        }

        Commands::Baseline { command } => {
            let config = HarnessConfig::load(config_path)?;
            let store = store(&config);
            match command {
                BaselineCommand::Update { run, include_failed } => {
                    let report = store.load_report(&run).await?;
                    let update = baseline_from_report(&report, include_failed);
                    if update.is_empty() {
                        return Err(HarnessError::not_found(format!(
                            "run {run} has no samples eligible for the baseline"
                        )));
                    }
                    let merged = merge_baseline(store.load_baseline().await?, update);
                    store.save_baseline(&merged).await?;
                    emit(json, &merged, |b| {
                        format!(
                            "Baseline updated from {run}: {} samples at {}",
                            b.len(),
                            store.baseline_path().display()
                        )
                    })?;
                    Ok(EXIT_PASS)
                }
                BaselineCommand::Show => match store.load_baseline().await? {
                    Some(baseline) => {
                        emit(json, &baseline, show_baseline)?;
                        Ok(EXIT_PASS)
                    }
                    None => Err(HarnessError::not_found(format!(
                        "baseline at {}",
                        store.baseline_path().display()
                    ))),
                },
            }
        }

        Commands::Compare { run_a, run_b } => {
            let config = HarnessConfig::load(config_path)?;
            let store = store(&config);
            let a = store.load_report(&run_a).await?;
            let b = store.load_report(&run_b).await?;
            let comparison = compare_reports(&a, &b);
            emit(json, &comparison, render_comparison)?;
            Ok(EXIT_PASS)
        }

        Commands::TextCheck { check, path } => {
            let outcomes = text_checks::run_checks(check, &path)?;
            emit(json, &outcomes, |outcomes| {
                outcomes
                    .iter()
                    .map(|o| {
                        format!(
                            "[{}] {}: {:.3} (threshold {}) -> {}",
                            o.status.label(),
                            o.check_name,
                            o.score,
                            o.threshold,
                            o.report_path.display()
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
            Ok(text_checks::exit_code(&outcomes))
        }

        Commands::Marker { command } => marker(json, command).await,

        Commands::TestImage { out } => {
            bookend_media::create_test_image(&out)?;
            emit(json, &out, |p| format!("Test image written to {}", p.display()))?;
            Ok(EXIT_PASS)
        }

        Commands::VerifyOutput {
            dir,
            prefix,
            expected,
        } => verify_output(json, &dir, &prefix, expected),

        Commands::Schema { kind } => {
            let schema = match kind {
                SchemaKind::Manifest => schemars::schema_for!(SampleManifest),
                SchemaKind::Narrative => schemars::schema_for!(NarrativeScript),
                SchemaKind::Report => schemars::schema_for!(RunReport),
                SchemaKind::NarrativeRun => schemars::schema_for!(NarrativeRun),
                SchemaKind::Baseline => schemars::schema_for!(Baseline),
                SchemaKind::Thresholds => schemars::schema_for!(QualityThresholds),
            };
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(EXIT_PASS)
        }
    }
}

async fn marker(json: bool, command: MarkerCommand) -> HarnessResult<i32> {
    match command {
        MarkerCommand::Write {
            output_dir,
            prefix,
            frames,
            tmp_ext,
        } => {
            let path = bookend_media::write_done_marker_with_tmp_ext(
                &output_dir,
                &prefix,
                &tmp_ext,
                frames,
            )
            .await?;
            emit(json, &path, |p| format!("Done marker written: {}", p.display()))?;
            Ok(EXIT_PASS)
        }
        MarkerCommand::Wait {
            output_dir,
            prefix,
            timeout_secs,
            poll_ms,
        } => {
            let waited = bookend_media::wait_for_done_marker(
                &output_dir,
                &prefix,
                Duration::from_secs(timeout_secs),
                Duration::from_millis(poll_ms),
            )
            .await;
            match waited {
                Ok(marker) => {
                    emit(json, &marker, |m| format!("Done marker found: {}", m.timestamp))?;
                    Ok(EXIT_PASS)
                }
                Err(MediaError::Timeout(secs)) => {
                    eprintln!("No done marker for '{prefix}' after {secs}s");
                    Ok(EXIT_FAIL)
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

fn verify_output(json: bool, dir: &Path, prefix: &str, expected: usize) -> HarnessResult<i32> {
    match bookend_media::verify_output_frames(dir, prefix, expected) {
        Ok(found) => {
            emit(json, &found, |n| format!("{n} frames found (expected {expected})"))?;
            Ok(EXIT_PASS)
        }
        Err(MediaError::MissingFrames { expected, found }) => {
            eprintln!("Expected at least {expected} frames with prefix '{prefix}', found {found}");
            Ok(EXIT_FAIL)
        }
        Err(e) => Err(e.into()),
    }
}

fn run_summary_line(report: &RunReport, store: &ResultsStore) -> String {
    let s = &report.summary;
    let location = store
        .run_dir(&report.run_id)
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    format!(
        "Run {}: {} ({} pass, {} warn, {} fail) -> {}",
        report.run_id,
        s.verdict.label(),
        s.passed,
        s.warned,
        s.failed,
        location
    )
}

fn narrative_summary_line(run: &NarrativeRun, store: &ResultsStore) -> String {
    let s = &run.summary;
    let location = store
        .narrative_dir(&run.run_id)
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    format!(
        "Narrative {} ({}): {} ({} shots, {} continuity failures) -> {}",
        run.run_id,
        run.script_id,
        s.verdict.label(),
        s.total_shots,
        s.continuity_failures,
        location
    )
}

fn show_baseline(baseline: &Baseline) -> String {
    let mut lines = vec![format!(
        "Baseline v{} from {} ({} samples, created {})",
        baseline.version,
        baseline.source_run.as_deref().unwrap_or("-"),
        baseline.len(),
        baseline.created_at.to_rfc3339()
    )];
    for (id, m) in &baseline.samples {
        lines.push(format!(
            "  {id}: avg {:.1}, vlm {}",
            m.average,
            m.vlm_overall.map(|v| format!("{v:.1}")).unwrap_or_else(|| "-".to_string())
        ));
    }
    lines.join("\n")
}
