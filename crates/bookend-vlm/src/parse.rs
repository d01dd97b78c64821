//! Parsing model replies into scores.
//!
//! Local VLMs rarely honour "JSON only": replies arrive wrapped in Markdown
//! fences, preceded by prose, or with numbers as strings. Parsing is tolerant
//! of all of that but still requires every sub-score.

use bookend_models::VlmScores;
use serde_json::{Map, Value};

use crate::error::{VlmError, VlmResult};

const SUB_SCORES: [&str; 5] = [
    "prompt_adherence",
    "start_fidelity",
    "end_fidelity",
    "temporal_coherence",
    "artifact_free",
];

/// Remove a surrounding Markdown code fence (```` ``` ```` or ```` ```json ````).
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. "json") up to the first newline
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// The first brace-balanced `{ ... }` in `text`, if any.
///
/// Braces inside JSON strings are ignored, so trailing prose such as
/// `Thanks {user}` does not extend the object.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a model reply into clamped `VlmScores`.
pub fn parse_scores(content: &str) -> VlmResult<VlmScores> {
    let body = strip_code_fences(content);
    let json = extract_json_object(body)
        .ok_or_else(|| VlmError::invalid_response("no JSON object in model reply"))?;
    let value: Value = serde_json::from_str(json)?;
    let Value::Object(obj) = value else {
        return Err(VlmError::invalid_response("model reply is not a JSON object"));
    };

    let mut subs = [0.0f64; 5];
    for (slot, key) in subs.iter_mut().zip(SUB_SCORES) {
        *slot = score_field(&obj, key)
            .ok_or_else(|| VlmError::invalid_response(format!("missing score '{key}'")))?;
    }

    let mut scores = VlmScores {
        prompt_adherence: subs[0],
        start_fidelity: subs[1],
        end_fidelity: subs[2],
        temporal_coherence: subs[3],
        artifact_free: subs[4],
        overall: 0.0,
        issues: string_list(obj.get("issues")),
        summary: obj
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string(),
        model: None,
    };
    scores.overall = score_field(&obj, "overall").unwrap_or_else(|| scores.sub_score_mean());
    scores.overall = clamp(scores.overall);
    Ok(scores)
}

fn score_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    let raw = match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }?;
    Some(clamp(raw))
}

fn clamp(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 100.0)
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|i| match i {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}
