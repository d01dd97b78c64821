//! Prompt versus generated description alignment.
//!
//! Lexical cosine similarity over term-frequency vectors with stop words
//! removed.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use bookend_models::ArtifactMetadata;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use super::{round3, run_label, write_report, CheckOutcome, CheckStatus};
use crate::error::HarnessResult;

pub const CHECK_NAME: &str = "similarity";
pub const THRESHOLD: f64 = 0.75;
const PREVIEW_CHARS: usize = 80;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z0-9]+(?:'[a-z]+)?").unwrap());

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "into", "is", "it",
    "its", "of", "on", "or", "that", "the", "their", "then", "there", "this", "to", "was", "with",
];

#[derive(Debug, Serialize)]
pub struct SceneSimilarity {
    pub scene_id: String,
    pub similarity: f64,
    pub prompt_preview: String,
    pub description_preview: String,
}

#[derive(Debug, Serialize)]
pub struct SimilarityReport {
    pub check_name: &'static str,
    pub timestamp: String,
    pub scenes: Vec<SceneSimilarity>,
    pub aggregate_alignment: f64,
    pub meets_threshold: bool,
}

fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let lower = text.to_lowercase();
    let mut tf = HashMap::new();
    for word in WORD.find_iter(&lower).map(|m| m.as_str()) {
        if !STOP_WORDS.contains(&word) {
            *tf.entry(word.to_string()).or_insert(0.0) += 1.0;
        }
    }
    tf
}

/// Cosine similarity of two texts in `[0, 1]`; 0 when either has no terms.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let (ta, tb) = (term_frequencies(a), term_frequencies(b));
    let norm = |tf: &HashMap<String, f64>| tf.values().map(|v| v * v).sum::<f64>().sqrt();
    let (na, nb) = (norm(&ta), norm(&tb));
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    let dot: f64 = ta
        .iter()
        .filter_map(|(term, va)| tb.get(term).map(|vb| va * vb))
        .sum();
    dot / (na * nb)
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

/// Score every scene with both a prompt and a description.
pub fn analyze(metadata: &ArtifactMetadata, timestamp: String) -> SimilarityReport {
    let mut scenes = Vec::new();
    for (i, scene) in metadata.scenes.iter().enumerate() {
        let scene_id = scene.id_or_index(i);
        let (Some(prompt), Some(description)) = (scene.prompt_text(), scene.description_text()) else {
            warn!(scene_id = %scene_id, "Missing prompt or description");
            continue;
        };
        let similarity = text_similarity(prompt, description);
        info!(scene_id = %scene_id, similarity = format!("{similarity:.3}"), "Scene analyzed");
        scenes.push(SceneSimilarity {
            scene_id,
            similarity: round3(similarity),
            prompt_preview: preview(prompt),
            description_preview: preview(description),
        });
    }

    let aggregate = if scenes.is_empty() {
        warn!("No scenes to analyze");
        None
    } else {
        Some(scenes.iter().map(|s| s.similarity).sum::<f64>() / scenes.len() as f64)
    };

    SimilarityReport {
        check_name: CHECK_NAME,
        timestamp,
        scenes,
        aggregate_alignment: aggregate.map(round3).unwrap_or(0.0),
        meets_threshold: aggregate.is_some_and(|a| a >= THRESHOLD),
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
    info!(
        aggregate = report.aggregate_alignment,
        threshold = THRESHOLD,
        status = ?status,
        "Similarity check finished"
    );
    Ok(CheckOutcome {
        check_name: CHECK_NAME.to_string(),
        score: report.aggregate_alignment,
        threshold: THRESHOLD,
        status,
        report_path,
    })
}
