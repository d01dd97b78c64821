//! Scoring rubric and request construction.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::error::{VlmError, VlmResult};
use crate::types::{ChatMessage, ContentPart, ImageUrl, MessageContent};
use crate::ScoringInput;

pub const SYSTEM_PROMPT: &str = "You are a strict video quality reviewer for an AI video generation \
pipeline. You compare generated frames against the keyframes they were conditioned on and score \
them objectively. You always answer with a single JSON object and nothing else.";

const RUBRIC: &str = r#"Score each criterion from 0 to 100:
- prompt_adherence: does the implied motion/content between the frames match the prompt?
- start_fidelity: how closely does GENERATED FIRST FRAME match START KEYFRAME (composition, colors, subjects)?
- end_fidelity: how closely does GENERATED LAST FRAME match END KEYFRAME?
- temporal_coherence: is the change from first to last frame a plausible continuous transition?
- artifact_free: 100 means no visible artifacts (warping, melting, extra limbs, noise, text garbage).
- overall: your overall quality judgement.

Respond with ONLY this JSON object:
{
  "prompt_adherence": 0,
  "start_fidelity": 0,
  "end_fidelity": 0,
  "temporal_coherence": 0,
  "artifact_free": 0,
  "overall": 0,
  "issues": ["short description of each problem"],
  "summary": "one sentence"
}"#;

/// Images are attached in this order, each preceded by its label.
const IMAGE_LABELS: [&str; 4] = [
    "START KEYFRAME",
    "END KEYFRAME",
    "GENERATED FIRST FRAME",
    "GENERATED LAST FRAME",
];

/// Build the system + user messages for one sample.
pub fn build_messages(input: &ScoringInput) -> VlmResult<Vec<ChatMessage>> {
    let images = [
        &input.start_keyframe,
        &input.end_keyframe,
        &input.first_frame,
        &input.last_frame,
    ];

    let mut parts = vec![ContentPart::Text {
        text: format!(
            "PROMPT: {}\n\nThe four images below are, in order: {}.\n\n{}",
            input.prompt,
            IMAGE_LABELS.join(", "),
            RUBRIC
        ),
    }];
    for (label, path) in IMAGE_LABELS.iter().zip(images) {
        parts.push(ContentPart::Text {
            text: (*label).to_string(),
        });
        parts.push(ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: image_data_url(path)?,
            },
        });
    }

    Ok(vec![
        ChatMessage {
            role: "system".into(),
            content: MessageContent::Text(SYSTEM_PROMPT.to_string()),
        },
        ChatMessage {
            role: "user".into(),
            content: MessageContent::Parts(parts),
        },
    ])
}

/// `data:<mime>;base64,<bytes>` for an image file.
pub fn image_data_url(path: &Path) -> VlmResult<String> {
    let bytes = std::fs::read(path).map_err(|source| VlmError::Image {
        path: path.display().to_string(),
        source,
    })?;
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    };
    Ok(format!("data:{mime};base64,{}", BASE64.encode(bytes)))
}
