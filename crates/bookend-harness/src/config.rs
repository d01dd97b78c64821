//! Harness configuration.
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. TOML file (`--config <file>`, or `bookend.toml` when present)
//! 3. `BOOKEND__`-prefixed environment variables, `__` between sections
//!    (`BOOKEND__COMFYUI__URL`, `BOOKEND__THRESHOLDS__VLM_REQUIRED`, ...)

use std::path::{Path, PathBuf};

use bookend_gen::{ComfyClientConfig, FastVideoConfig, WorkflowBindings};
use bookend_models::QualityThresholds;
use bookend_vlm::VlmConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};

pub const DEFAULT_CONFIG_FILE: &str = "bookend.toml";
pub const ENV_PREFIX: &str = "BOOKEND";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Comfyui,
    Fastvideo,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Comfyui => "comfyui",
            BackendKind::Fastvideo => "fastvideo",
        }
    }
}

/// ComfyUI workflow file and the inputs the harness patches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub path: Option<PathBuf>,
    pub bindings: WorkflowBindings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub results_dir: PathBuf,
    pub baseline_path: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            baseline_path: PathBuf::from("baselines/baseline.json"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub backend: BackendKind,
    pub comfyui: ComfyClientConfig,
    pub fastvideo: FastVideoConfig,
    pub vlm: VlmConfig,
    pub workflow: WorkflowConfig,
    pub thresholds: QualityThresholds,
    pub paths: PathsConfig,
}

impl HarnessConfig {
    /// Load the layered configuration.
    ///
    /// An explicit `path` must exist; the default `bookend.toml` is optional.
    pub fn load(path: Option<&Path>) -> HarnessResult<Self> {
        let (file, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if required && !file.exists() {
            return Err(HarnessError::config_error(format!(
                "config file {} not found",
                file.display()
            )));
        }

        let config = Config::builder()
            .add_source(Config::try_from(&HarnessConfig::default())?)
            .add_source(File::from(file.as_path()).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("vlm.models")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: HarnessConfig = config.try_deserialize()?;
        loaded.validate()?;
        debug!("Loaded harness config: {:?}", loaded);
        Ok(loaded)
    }

    pub fn validate(&self) -> HarnessResult<()> {
        self.thresholds.validate()?;
        if self.vlm.enabled && self.vlm.models.is_empty() {
            return Err(HarnessError::config_error(
                "vlm.models must list at least one model when vlm.enabled is true",
            ));
        }
        Ok(())
    }
}
