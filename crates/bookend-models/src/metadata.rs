//! Payloads written by the generation application.

use chrono::{DateTime, SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `artifact-metadata.json` as exported by a story run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ArtifactMetadata {
    #[serde(default)]
    pub scenes: Vec<SceneMetadata>,
}

/// One scene entry; unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct SceneMetadata {
    #[serde(default)]
    pub scene_id: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub generated_description: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl SceneMetadata {
    /// Scene id, falling back to `scene_<index>`.
    pub fn id_or_index(&self, index: usize) -> String {
        self.scene_id
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("scene_{index}"))
    }

    /// Non-empty prompt.
    pub fn prompt_text(&self) -> Option<&str> {
        self.prompt.as_deref().filter(|p| !p.is_empty())
    }

    /// Generated description, falling back to the plain description.
    pub fn description_text(&self) -> Option<&str> {
        self.generated_description
            .as_deref()
            .filter(|d| !d.is_empty())
            .or_else(|| self.description.as_deref().filter(|d| !d.is_empty()))
    }
}

/// Producer-side completion marker (`<prefix>.done`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct DoneMarker {
    /// UTC timestamp, `YYYY-MM-DDTHH:MM:SSZ`
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_count: Option<u32>,
}

impl DoneMarker {
    pub fn now(frame_count: Option<u32>) -> Self {
        Self::at(Utc::now(), frame_count)
    }

    pub fn at(time: DateTime<Utc>, frame_count: Option<u32>) -> Self {
        Self {
            timestamp: time.to_rfc3339_opts(SecondsFormat::Secs, true),
            frame_count,
        }
    }
}
