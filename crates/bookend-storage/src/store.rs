//! Results directory layout and persistence.
//!
//! ```text
//! <results_dir>/runs/<run_id>/report.json
//! <results_dir>/runs/<run_id>/report.md
//! <results_dir>/runs/<run_id>/<sample_id>/
//! <results_dir>/narratives/<run_id>/narrative.json
//! <results_dir>/narratives/<run_id>/<shot_id>/
//! ```

use std::path::{Path, PathBuf};

use bookend_models::{Baseline, NarrativeRun, NarrativeSummary, RunReport, RunSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::fs_utils::{read_json, write_atomic, write_json_atomic};

const RUNS_DIR: &str = "runs";
const NARRATIVES_DIR: &str = "narratives";
const REPORT_JSON: &str = "report.json";
const REPORT_MD: &str = "report.md";
const NARRATIVE_JSON: &str = "narrative.json";

/// Generate a sortable run id: `YYYYMMDD-HHMMSS-xxxxxxxx`.
pub fn new_run_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().format("%Y%m%d-%H%M%S"), &suffix[..8])
}

/// Ids become directory names, so only `[A-Za-z0-9_-]+` is accepted.
pub fn validate_id(id: &str) -> StorageResult<()> {
    let ok = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(StorageError::invalid_id(id))
    }
}

/// Row in the run history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunListing {
    pub run_id: String,
    pub manifest: String,
    pub backend: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: RunSummary,
}

impl From<&RunReport> for RunListing {
    fn from(report: &RunReport) -> Self {
        Self {
            run_id: report.run_id.clone(),
            manifest: report.manifest.clone(),
            backend: report.backend.clone(),
            started_at: report.started_at,
            finished_at: report.finished_at,
            summary: report.summary.clone(),
        }
    }
}

/// Row in the narrative run history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeListing {
    pub run_id: String,
    pub script_id: String,
    pub title: String,
    pub started_at: DateTime<Utc>,
    pub summary: NarrativeSummary,
}

impl From<&NarrativeRun> for NarrativeListing {
    fn from(run: &NarrativeRun) -> Self {
        Self {
            run_id: run.run_id.clone(),
            script_id: run.script_id.clone(),
            title: run.title.clone(),
            started_at: run.started_at,
            summary: run.summary.clone(),
        }
    }
}

/// Filesystem store rooted at the results directory.
#[derive(Debug, Clone)]
pub struct ResultsStore {
    root: PathBuf,
    baseline_path: PathBuf,
}

impl ResultsStore {
    pub fn new(root: impl Into<PathBuf>, baseline_path: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            baseline_path: baseline_path.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn baseline_path(&self) -> &Path {
        &self.baseline_path
    }

    pub fn run_dir(&self, run_id: &str) -> StorageResult<PathBuf> {
        validate_id(run_id)?;
        Ok(self.root.join(RUNS_DIR).join(run_id))
    }

    pub fn narrative_dir(&self, run_id: &str) -> StorageResult<PathBuf> {
        validate_id(run_id)?;
        Ok(self.root.join(NARRATIVES_DIR).join(run_id))
    }

    /// Per-sample artifact directory, created on demand.
    pub async fn sample_dir(&self, run_id: &str, sample_id: &str) -> StorageResult<PathBuf> {
        validate_id(sample_id)?;
        let dir = self.run_dir(run_id)?.join(sample_id);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Per-shot artifact directory inside a narrative run, created on demand.
    pub async fn shot_dir(&self, run_id: &str, shot_id: &str) -> StorageResult<PathBuf> {
        validate_id(shot_id)?;
        let dir = self.narrative_dir(run_id)?.join(shot_id);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    // --- Run reports ---

    pub async fn save_report(&self, report: &RunReport) -> StorageResult<PathBuf> {
        let path = self.run_dir(&report.run_id)?.join(REPORT_JSON);
        write_json_atomic(&path, report).await?;
        info!(run_id = %report.run_id, "Saved run report to {}", path.display());
        Ok(path)
    }

    pub async fn load_report(&self, run_id: &str) -> StorageResult<RunReport> {
        let path = self.run_dir(run_id)?.join(REPORT_JSON);
        read_json(&path).await.map_err(|e| match e {
            StorageError::NotFound(_) => StorageError::not_found(format!("run {run_id}")),
            other => other,
        })
    }

    pub async fn save_markdown(&self, run_id: &str, markdown: &str) -> StorageResult<PathBuf> {
        let path = self.run_dir(run_id)?.join(REPORT_MD);
        write_atomic(&path, markdown.as_bytes()).await?;
        debug!(run_id, "Saved Markdown report to {}", path.display());
        Ok(path)
    }

    /// Summaries of every stored run, newest first.
    ///
    /// Directories without a readable report are skipped with a warning.
    pub async fn list_runs(&self) -> StorageResult<Vec<RunListing>> {
        let mut listings = Vec::new();
        for dir in self.subdirs(RUNS_DIR).await? {
            match read_json::<RunReport>(dir.join(REPORT_JSON)).await {
                Ok(report) => listings.push(RunListing::from(&report)),
                Err(e) => warn!("Skipping run directory {}: {}", dir.display(), e),
            }
        }
        listings.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.run_id.cmp(&a.run_id))
        });
        Ok(listings)
    }

    // --- Narratives ---

    pub async fn save_narrative(&self, run: &NarrativeRun) -> StorageResult<PathBuf> {
        let path = self.narrative_dir(&run.run_id)?.join(NARRATIVE_JSON);
        write_json_atomic(&path, run).await?;
        info!(run_id = %run.run_id, "Saved narrative run to {}", path.display());
        Ok(path)
    }

    pub async fn load_narrative(&self, run_id: &str) -> StorageResult<NarrativeRun> {
        let path = self.narrative_dir(run_id)?.join(NARRATIVE_JSON);
        read_json(&path).await.map_err(|e| match e {
            StorageError::NotFound(_) => StorageError::not_found(format!("narrative {run_id}")),
            other => other,
        })
    }

    pub async fn save_narrative_markdown(&self, run_id: &str, markdown: &str) -> StorageResult<PathBuf> {
        let path = self.narrative_dir(run_id)?.join(REPORT_MD);
        write_atomic(&path, markdown.as_bytes()).await?;
        Ok(path)
    }

    pub async fn list_narratives(&self) -> StorageResult<Vec<NarrativeListing>> {
        let mut listings = Vec::new();
        for dir in self.subdirs(NARRATIVES_DIR).await? {
            match read_json::<NarrativeRun>(dir.join(NARRATIVE_JSON)).await {
                Ok(run) => listings.push(NarrativeListing::from(&run)),
                Err(e) => warn!("Skipping narrative directory {}: {}", dir.display(), e),
            }
        }
        listings.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(listings)
    }

    // --- Baseline ---

    /// Load the baseline; a missing file yields `None`.
    pub async fn load_baseline(&self) -> StorageResult<Option<Baseline>> {
        match read_json::<Baseline>(&self.baseline_path).await {
            Ok(b) => Ok(Some(b)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn save_baseline(&self, baseline: &Baseline) -> StorageResult<()> {
        write_json_atomic(&self.baseline_path, baseline).await?;
        info!(
            samples = baseline.len(),
            "Saved baseline to {}",
            self.baseline_path.display()
        );
        Ok(())
    }

    async fn subdirs(&self, kind: &str) -> StorageResult<Vec<PathBuf>> {
        let base = self.root.join(kind);
        let mut entries = match fs::read_dir(&base).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut dirs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookend_models::{
        BaselineMetrics, FrameScores, NarrativeSummary, QualityThresholds, SampleResult,
    };
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> ResultsStore {
        ResultsStore::new(tmp.path().join("results"), tmp.path().join("baseline.json"))
    }

    fn report(run_id: &str, hour: u32) -> RunReport {
        let mut sample = SampleResult::new("s1", "a cat walks");
        sample.frames = Some(FrameScores::new(90.0, 85.0));
        let samples = vec![sample];
        let started = Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap();
        RunReport {
            run_id: run_id.to_string(),
            manifest: "smoke".into(),
            backend: "comfyui".into(),
            started_at: started,
            finished_at: started,
            thresholds: QualityThresholds::default(),
            summary: RunSummary::from_results(&samples),
            samples,
        }
    }

    #[test]
    fn test_new_run_id_format() {
        let id = new_run_id();
        assert_eq!(id.len(), "20250101-120000-abcdef12".len());
        assert!(validate_id(&id).is_ok());
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 6);
    }

    #[test]
    fn test_validate_id_rejects_traversal() {
        assert!(validate_id("../etc").is_err());
        assert!(validate_id("a/b").is_err());
        assert!(validate_id("").is_err());
        assert!(validate_id("run_01-b").is_ok());
    }

    #[tokio::test]
    async fn test_report_roundtrip_and_listing_order() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        store.save_report(&report("older", 1)).await.unwrap();
        store.save_report(&report("newer", 5)).await.unwrap();
        store.save_markdown("newer", "# Report").await.unwrap();

        // Junk directory is skipped
        std::fs::create_dir_all(tmp.path().join("results/runs/broken")).unwrap();

        let loaded = store.load_report("newer").await.unwrap();
        assert_eq!(loaded.samples.len(), 1);

        let runs = store.list_runs().await.unwrap();
        let ids: Vec<_> = runs.iter().map(|r| r.run_id.as_str()).collect();
        assert_eq!(ids, vec!["newer", "older"]);
        assert!(tmp.path().join("results/runs/newer/report.md").exists());
    }

    #[tokio::test]
    async fn test_missing_report_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = store(&tmp).load_report("nope").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store(&tmp).list_runs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sample_dir_created() {
        let tmp = TempDir::new().unwrap();
        let dir = store(&tmp).sample_dir("run1", "s1").await.unwrap();
        assert!(dir.is_dir());
        assert!(store(&tmp).sample_dir("run1", "../x").await.is_err());
    }

    #[tokio::test]
    async fn test_baseline_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        assert!(store.load_baseline().await.unwrap().is_none());

        let mut baseline = Baseline::new(Some("run1".into()));
        baseline.samples.insert(
            "s1".into(),
            BaselineMetrics {
                start_similarity: 90.0,
                end_similarity: 80.0,
                average: 85.0,
                vlm_overall: None,
                keyframe_digest: "abc".into(),
            },
        );
        tokio_test::assert_ok!(store.save_baseline(&baseline).await);

        let loaded = store.load_baseline().await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.source_run.as_deref(), Some("run1"));
    }

    #[tokio::test]
    async fn test_narrative_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let now = Utc::now();
        let run = NarrativeRun {
            run_id: "n1".into(),
            script_id: "demo".into(),
            title: "Demo".into(),
            backend: "comfyui".into(),
            started_at: now,
            finished_at: now,
            shots: vec![],
            continuity: vec![],
            summary: NarrativeSummary::from_parts(&[], &[]),
        };
        store.save_narrative(&run).await.unwrap();

        assert_eq!(store.load_narrative("n1").await.unwrap().title, "Demo");
        let list = store.list_narratives().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].script_id, "demo");
    }
}
