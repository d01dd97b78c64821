//! Text quality checks over `artifact-metadata.json`.
//!
//! Each check reads the scenes exported by a story run, computes one
//! aggregate score, writes `<name>-check-report.json` next to the metadata
//! and maps the outcome to an exit code.

pub mod coherence;
pub mod diversity;
pub mod similarity;

use std::path::{Path, PathBuf};

use bookend_models::ArtifactMetadata;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{HarnessError, HarnessResult};

pub const METADATA_FILE: &str = "artifact-metadata.json";

/// Which text check to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TextCheckKind {
    Similarity,
    Coherence,
    Diversity,
    All,
}

/// Reported status of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl CheckStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Warn => "WARN",
            CheckStatus::Fail => "FAIL",
        }
    }

    /// 0 when the threshold is met, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            CheckStatus::Pass => 0,
            CheckStatus::Warn | CheckStatus::Fail => 1,
        }
    }
}

/// Short result of one check, for the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub check_name: String,
    pub score: f64,
    pub threshold: f64,
    pub status: CheckStatus,
    pub report_path: PathBuf,
}

/// Resolve a user-supplied path to the metadata file.
///
/// Accepts the file itself, a directory holding it, or a directory of run
/// subdirectories (the most recently modified one wins). Anything else gets
/// `/artifact-metadata.json` appended.
pub fn resolve_metadata_path(path: &Path) -> HarnessResult<PathBuf> {
    let resolved = if path.is_dir() {
        let candidate = path.join(METADATA_FILE);
        if candidate.exists() {
            candidate
        } else {
            newest_entry(path)?
                .map(|dir| dir.join(METADATA_FILE))
                .unwrap_or(candidate)
        }
    } else if path.ends_with(METADATA_FILE) {
        path.to_path_buf()
    } else {
        path.join(METADATA_FILE)
    };

    if !resolved.exists() {
        return Err(HarnessError::text_check_setup(format!(
            "{METADATA_FILE} not found at {}",
            resolved.display()
        )));
    }
    Ok(resolved)
}

fn newest_entry(dir: &Path) -> HarnessResult<Option<PathBuf>> {
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let modified = entry.metadata()?.modified()?;
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, entry.path()));
        }
    }
    Ok(newest.map(|(_, p)| p))
}

pub fn load_metadata(path: &Path) -> HarnessResult<ArtifactMetadata> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| HarnessError::text_check_setup(format!("failed to read {}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| HarnessError::text_check_setup(format!("failed to parse {}: {e}", path.display())))
}

/// Name of the directory holding the metadata, used as the report timestamp.
pub(crate) fn run_label(metadata_path: &Path) -> String {
    metadata_path
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Write `<check>-check-report.json` beside the metadata file.
pub(crate) fn write_report<T: Serialize>(
    metadata_path: &Path,
    check_name: &str,
    report: &T,
) -> HarnessResult<PathBuf> {
    let dir = metadata_path.parent().unwrap_or_else(|| Path::new("."));
    let path = dir.join(format!("{check_name}-check-report.json"));
    std::fs::write(&path, serde_json::to_string_pretty(report)?)?;
    info!(path = %path.display(), "Report saved");
    Ok(path)
}

pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Run one check, or all three, against a metadata location.
pub fn run_checks(kind: TextCheckKind, path: &Path) -> HarnessResult<Vec<CheckOutcome>> {
    let metadata_path = resolve_metadata_path(path)?;
    let metadata = load_metadata(&metadata_path)?;

    let mut outcomes = Vec::new();
    if matches!(kind, TextCheckKind::Similarity | TextCheckKind::All) {
        outcomes.push(similarity::run(&metadata, &metadata_path)?);
    }
    if matches!(kind, TextCheckKind::Coherence | TextCheckKind::All) {
        outcomes.push(coherence::run(&metadata, &metadata_path)?);
    }
    if matches!(kind, TextCheckKind::Diversity | TextCheckKind::All) {
        outcomes.push(diversity::run(&metadata, &metadata_path)?);
    }
    Ok(outcomes)
}

/// Highest exit code across outcomes.
pub fn exit_code(outcomes: &[CheckOutcome]) -> i32 {
    outcomes.iter().map(|o| o.status.exit_code()).max().unwrap_or(0)
}
