//! Narrative coherence of scene prompts.
//!
//! A pronoun is resolved when a named entity (a capitalised word that is not
//! a pronoun or function word) appears before it in the same sentence or
//! anywhere in the previous sentence.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use bookend_models::ArtifactMetadata;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use super::{round3, run_label, write_report, CheckOutcome, CheckStatus};
use crate::error::{HarnessError, HarnessResult};

pub const CHECK_NAME: &str = "coherence";
pub const THRESHOLD: f64 = 0.85;
const MAX_LISTED_ENTITIES: usize = 10;

static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+").unwrap());
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z'-]*").unwrap());

const PRONOUNS: &[&str] = &["he", "she", "it", "they", "him", "her", "them", "his", "their"];

/// Capitalised words that never name an entity.
const FUNCTION_WORDS: &[&str] = &[
    "a", "an", "the", "and", "but", "or", "as", "at", "in", "on", "of", "to", "with", "from",
    "then", "when", "while", "after", "before", "suddenly", "meanwhile", "later", "there", "this",
    "that", "these", "those", "i", "we", "you", "its", "our", "your", "my", "close", "wide",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoherenceAnalysis {
    pub entity_count: usize,
    pub entities: Vec<String>,
    pub pronoun_count: usize,
    pub resolved_count: usize,
    pub link_ratio: f64,
    pub score: f64,
}

#[derive(Debug, Serialize)]
pub struct SceneCoherence {
    pub scene_id: String,
    #[serde(flatten)]
    pub analysis: CoherenceAnalysis,
}

#[derive(Debug, Serialize)]
pub struct CoherenceReport {
    pub check_name: &'static str,
    pub timestamp: String,
    pub scenes: Vec<SceneCoherence>,
    pub average_score: f64,
    pub meets_threshold: bool,
}

fn is_entity(word: &str) -> bool {
    let starts_upper = word.chars().next().is_some_and(char::is_uppercase);
    let lower = word.to_lowercase();
    starts_upper && !PRONOUNS.contains(&lower.as_str()) && !FUNCTION_WORDS.contains(&lower.as_str())
}

/// Pronoun resolution analysis of one text. Text without pronouns scores 1.
pub fn analyze_text(text: &str) -> CoherenceAnalysis {
    let mut entities = BTreeSet::new();
    let mut pronoun_count = 0;
    let mut resolved_count = 0;
    let mut previous_had_entity = false;

    for sentence in SENTENCE_END.split(text) {
        let mut seen_entity = false;
        for word in WORD.find_iter(sentence).map(|m| m.as_str()) {
            if PRONOUNS.contains(&word.to_lowercase().as_str()) {
                pronoun_count += 1;
                if seen_entity || previous_had_entity {
                    resolved_count += 1;
                }
            } else if is_entity(word) {
                entities.insert(word.to_lowercase());
                seen_entity = true;
            }
        }
        if !sentence.trim().is_empty() {
            previous_had_entity = seen_entity;
        }
    }

    // No pronouns means nothing links the entities, which scores 0.
    let link_ratio = if pronoun_count > 0 {
        resolved_count as f64 / pronoun_count as f64
    } else {
        0.0
    };

    CoherenceAnalysis {
        entity_count: entities.len(),
        entities: entities.into_iter().take(MAX_LISTED_ENTITIES).collect(),
        pronoun_count,
        resolved_count,
        link_ratio: round3(link_ratio),
        score: round3(link_ratio.min(1.0)),
    }
}

pub fn analyze(metadata: &ArtifactMetadata, timestamp: String) -> HarnessResult<CoherenceReport> {
    let mut scenes = Vec::new();
    for (i, scene) in metadata.scenes.iter().enumerate() {
        let scene_id = scene.id_or_index(i);
        let Some(prompt) = scene.prompt_text() else {
            warn!(scene_id = %scene_id, "No prompt found");
            continue;
        };
        let analysis = analyze_text(prompt);
        info!(
            scene_id = %scene_id,
            score = analysis.score,
            entities = analysis.entity_count,
            resolved = analysis.resolved_count,
            pronouns = analysis.pronoun_count,
            "Scene analyzed"
        );
        scenes.push(SceneCoherence { scene_id, analysis });
    }

    if scenes.is_empty() {
        return Err(HarnessError::text_check_setup("no scenes processed"));
    }

    let average = round3(scenes.iter().map(|s| s.analysis.score).sum::<f64>() / scenes.len() as f64);
    Ok(CoherenceReport {
        check_name: CHECK_NAME,
        timestamp,
        scenes,
        average_score: average,
        meets_threshold: average >= THRESHOLD,
    })
}

pub fn run(metadata: &ArtifactMetadata, metadata_path: &Path) -> HarnessResult<CheckOutcome> {
    let report = analyze(metadata, run_label(metadata_path))?;
    let report_path = write_report(metadata_path, CHECK_NAME, &report)?;
    let status = if report.meets_threshold {
        CheckStatus::Pass
    } else {
        CheckStatus::Fail
    };
    info!(average = report.average_score, threshold = THRESHOLD, status = ?status, "Coherence check finished");
    Ok(CheckOutcome {
        check_name: CHECK_NAME.to_string(),
        score: report.average_score,
        threshold: THRESHOLD,
        status,
        report_path,
    })
}
