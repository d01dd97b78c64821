//! Bookend video QA harness.
//!
//! This crate provides:
//! - Layered configuration and tracing setup
//! - Per-sample QA: generation, bookend frame extraction, similarity and VLM scoring
//! - Threshold verdicts, baselines and regression detection
//! - Regression and narrative pipelines with JSON + Markdown reports
//! - A/B run comparison and text quality checks
//! - The `bookend-qa` command line

pub mod backends;
pub mod baseline;
pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod narrative;
pub mod pipeline;
pub mod preflight;
pub mod qa;
pub mod report;
pub mod text_checks;
pub mod verdict;

pub use backends::{build_scorer, Backend};
pub use baseline::{baseline_from_report, baseline_status, merge_baseline};
pub use cli::{execute, Cli, EXIT_FAIL, EXIT_PASS, EXIT_SETUP};
pub use compare::{compare_reports, sample_score};
pub use config::{BackendKind, HarnessConfig, PathsConfig, WorkflowConfig};
pub use error::{HarnessError, HarnessResult};
pub use logging::{init_tracing, RunLogger};
pub use narrative::{continuity_checks, NarrativePipeline};
pub use pipeline::RegressionPipeline;
pub use preflight::{run_preflight, PreflightCheck, PreflightReport};
pub use qa::{evaluate_sample, QaContext};
