//! Bookend samples and sample manifests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::{read_json, ModelError, ModelResult};

/// A keyframe pair plus the prompt that should carry one into the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct BookendSample {
    /// Stable identifier, used as the baseline key and as a directory name
    #[validate(length(min = 1, max = 128), custom(function = "validate_id_chars"))]
    pub id: String,

    /// Positive prompt
    #[validate(length(min = 1))]
    pub prompt: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,

    /// Image the generated clip must open on
    pub start_keyframe: PathBuf,

    /// Image the generated clip must land on
    pub end_keyframe: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(default = "default_frame_count")]
    #[validate(range(min = 8, max = 300))]
    pub frame_count: u32,

    #[serde(default = "default_fps")]
    #[validate(range(min = 8, max = 30))]
    pub fps: u32,

    #[serde(default = "default_width")]
    #[validate(range(min = 64, max = 4096))]
    pub width: u32,

    #[serde(default = "default_height")]
    #[validate(range(min = 64, max = 4096))]
    pub height: u32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Ids name result directories, so only `[A-Za-z0-9_-]` is allowed.
fn validate_id_chars(id: &str) -> Result<(), ValidationError> {
    if id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        Ok(())
    } else {
        Err(ValidationError::new("id_chars")
            .with_message("only letters, digits, '-' and '_' are allowed".into()))
    }
}

fn default_frame_count() -> u32 {
    25
}

fn default_fps() -> u32 {
    16
}

fn default_width() -> u32 {
    576
}

fn default_height() -> u32 {
    1024
}

impl BookendSample {
    /// Create a sample with default generation parameters.
    pub fn new(
        id: impl Into<String>,
        prompt: impl Into<String>,
        start_keyframe: impl Into<PathBuf>,
        end_keyframe: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            negative_prompt: None,
            start_keyframe: start_keyframe.into(),
            end_keyframe: end_keyframe.into(),
            seed: None,
            frame_count: default_frame_count(),
            fps: default_fps(),
            width: default_width(),
            height: default_height(),
            tags: Vec::new(),
        }
    }

    /// Resolve relative keyframe paths against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.start_keyframe.is_relative() {
            self.start_keyframe = base.join(&self.start_keyframe);
        }
        if self.end_keyframe.is_relative() {
            self.end_keyframe = base.join(&self.end_keyframe);
        }
    }

    /// Validate field ranges, mapping errors to [`ModelError`].
    pub fn check(&self) -> ModelResult<()> {
        self.validate()
            .map_err(|e| ModelError::validation(format!("sample '{}'", self.id), e.to_string()))
    }
}

/// Validate a list of samples: each must be valid and ids must be unique.
pub(crate) fn check_samples(samples: &[BookendSample]) -> ModelResult<()> {
    let mut seen = HashSet::new();
    for sample in samples {
        sample.check()?;
        if !seen.insert(sample.id.as_str()) {
            return Err(ModelError::DuplicateId(sample.id.clone()));
        }
    }
    Ok(())
}

/// A named set of samples for one regression run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SampleManifest {
    pub name: String,
    pub samples: Vec<BookendSample>,
}

impl SampleManifest {
    /// Load a manifest from JSON, resolving keyframe paths against its directory.
    pub fn load(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let mut manifest: SampleManifest = read_json(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for sample in &mut manifest.samples {
            sample.resolve_paths(base);
        }
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check the manifest is non-empty with valid, uniquely named samples.
    pub fn validate(&self) -> ModelResult<()> {
        if self.samples.is_empty() {
            return Err(ModelError::validation(
                format!("manifest '{}'", self.name),
                "no samples",
            ));
        }
        check_samples(&self.samples)
    }
}
