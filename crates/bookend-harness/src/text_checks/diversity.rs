//! Thematic diversity across scene prompts (Shannon entropy of theme tags).

use std::collections::BTreeMap;
use std::path::Path;

use bookend_models::ArtifactMetadata;
use serde::Serialize;
use tracing::{info, warn};

use super::{round3, run_label, write_report, CheckOutcome, CheckStatus};
use crate::error::HarnessResult;

pub const CHECK_NAME: &str = "diversity";
pub const THRESHOLD: f64 = 2.0;
pub const OTHER_THEME: &str = "other";

const THEMES: &[(&str, &[&str])] = &[
    ("action", &["action", "fight", "chase", "battle", "attack", "run", "escape"]),
    ("romance", &["love", "kiss", "romance", "heart", "embrace", "affection"]),
    ("mystery", &["mystery", "secret", "hide", "discover", "clue", "unknown"]),
    ("dialogue", &["dialogue", "talk", "say", "speak", "ask", "answer", "reply"]),
    ("exposition", &["exposition", "explain", "reveal", "show", "tell", "describe"]),
    ("suspense", &["suspense", "danger", "threat", "fear", "worry", "anxious"]),
    ("comedy", &["comedy", "laugh", "funny", "joke", "humor", "amusing"]),
    ("drama", &["drama", "emotional", "sad", "cry", "conflict", "tension"]),
];

#[derive(Debug, Serialize)]
pub struct SceneThemes {
    pub scene_id: String,
    pub themes: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct DiversityReport {
    pub check_name: &'static str,
    pub timestamp: String,
    pub scenes: Vec<SceneThemes>,
    pub theme_distribution: BTreeMap<&'static str, usize>,
    pub entropy: f64,
    pub meets_threshold: bool,
}

/// Themes whose keywords occur in the text (substring match), or `other`.
pub fn extract_themes(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    let themes: Vec<_> = THEMES
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(theme, _)| *theme)
        .collect();
    if themes.is_empty() {
        vec![OTHER_THEME]
    } else {
        themes
    }
}

/// Shannon entropy (bits) of the tag distribution.
pub fn entropy(counts: &BTreeMap<&str, usize>) -> f64 {
    let total: usize = counts.values().sum();
    if total == 0 {
        return 0.0;
    }
    counts
        .values()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.log2()
        })
        .sum()
}

pub fn analyze(metadata: &ArtifactMetadata, timestamp: String) -> DiversityReport {
    let mut scenes = Vec::new();
    let mut distribution = BTreeMap::new();
    for (i, scene) in metadata.scenes.iter().enumerate() {
        let scene_id = scene.id_or_index(i);
        let Some(prompt) = scene.prompt_text() else {
            warn!(scene_id = %scene_id, "No prompt found");
            continue;
        };
        let themes = extract_themes(prompt);
        for theme in &themes {
            *distribution.entry(*theme).or_insert(0) += 1;
        }
        info!(scene_id = %scene_id, themes = %themes.join(", "), "Scene analyzed");
        scenes.push(SceneThemes { scene_id, themes });
    }

    let entropy = entropy(&distribution);
    DiversityReport {
        check_name: CHECK_NAME,
        timestamp,
        scenes,
        theme_distribution: distribution,
        entropy: round3(entropy),
        meets_threshold: entropy >= THRESHOLD,
    }
}

pub fn run(metadata: &ArtifactMetadata, metadata_path: &Path) -> HarnessResult<CheckOutcome> {
    let report = analyze(metadata, run_label(metadata_path));
    let report_path = write_report(metadata_path, CHECK_NAME, &report)?;
    let status = if report.meets_threshold {
        CheckStatus::Pass
    } else {
        CheckStatus::Warn
    };
    info!(entropy = report.entropy, threshold = THRESHOLD, status = ?status, "Diversity check finished");
    Ok(CheckOutcome {
        check_name: CHECK_NAME.to_string(),
        score: report.entropy,
        threshold: THRESHOLD,
        status,
        report_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text_checks::{load_metadata, test_support::write_metadata};
    use tempfile::TempDir;

    #[test]
    fn test_extract_themes() {
        assert_eq!(extract_themes("A fierce BATTLE in the rain"), vec!["action"]);
        assert_eq!(extract_themes("They kiss, then laugh"), vec!["romance", "comedy"]);
        assert_eq!(extract_themes("A still lake"), vec![OTHER_THEME]);
    }

    #[test]
    fn test_entropy() {
        let uniform: BTreeMap<&str, usize> = [("a", 1), ("b", 1), ("c", 1), ("d", 1)].into();
        assert!((entropy(&uniform) - 2.0).abs() < 1e-9);

        let single: BTreeMap<&str, usize> = [("a", 5)].into();
        assert_eq!(entropy(&single), 0.0);
        assert_eq!(entropy(&BTreeMap::new()), 0.0);
    }

    #[test]
    fn test_run_diverse_passes() {
        let dir = TempDir::new().unwrap();
        let path = write_metadata(
            dir.path(),
            &[
                ("a chase through the market", ""),
                ("a secret letter", ""),
                ("they laugh at the joke", ""),
                ("a sad farewell", ""),
            ],
        );
        let outcome = run(&load_metadata(&path).unwrap(), &path).unwrap();
        assert_eq!(outcome.score, 2.0);
        assert_eq!(outcome.status, CheckStatus::Pass);
    }

    #[test]
    fn test_run_monotone_warns() {
        let dir = TempDir::new().unwrap();
        let path = write_metadata(dir.path(), &[("a battle", ""), ("another battle", "")]);
        let outcome = run(&load_metadata(&path).unwrap(), &path).unwrap();
        assert_eq!(outcome.status, CheckStatus::Warn);
        assert_eq!(outcome.status.exit_code(), 1);
    }
}
