//! Build generation backends and the VLM scorer from configuration.

use bookend_gen::{
    ComfyBackend, ComfyClient, FastVideoBackend, FastVideoClient, GenerationBackend, Workflow,
};
use bookend_vlm::{FrameScorer, VlmClient};
use tracing::info;

use crate::config::{BackendKind, HarnessConfig};
use crate::error::{HarnessError, HarnessResult};

/// The configured generation backend.
pub enum Backend {
    Comfy(ComfyBackend),
    FastVideo(FastVideoBackend),
}

impl Backend {
    pub fn from_config(config: &HarnessConfig) -> HarnessResult<Self> {
        match config.backend {
            BackendKind::Comfyui => {
                let path = config.workflow.path.as_ref().ok_or_else(|| {
                    HarnessError::config_error("workflow.path is required for the comfyui backend")
                })?;
                let workflow = Workflow::load(path)?;
                let client = ComfyClient::new(config.comfyui.clone())?;
                let backend = ComfyBackend::new(client, workflow, config.workflow.bindings.clone())?;
                info!(url = %config.comfyui.url, workflow = %path.display(), "Using ComfyUI backend");
                Ok(Backend::Comfy(backend))
            }
            BackendKind::Fastvideo => {
                let client = FastVideoClient::new(config.fastvideo.clone())?;
                info!(url = %config.fastvideo.url, "Using FastVideo backend");
                Ok(Backend::FastVideo(FastVideoBackend::new(client)))
            }
        }
    }

    pub fn as_generation(&self) -> &dyn GenerationBackend {
        match self {
            Backend::Comfy(b) => b,
            Backend::FastVideo(b) => b,
        }
    }
}

/// VLM client when enabled in config and not disabled on the command line.
pub fn build_scorer(config: &HarnessConfig, no_vlm: bool) -> HarnessResult<Option<Box<dyn FrameScorer>>> {
    if no_vlm || !config.vlm.enabled {
        info!("VLM scoring disabled");
        return Ok(None);
    }
    let client = VlmClient::new(config.vlm.clone())?;
    info!(url = %config.vlm.url, models = ?config.vlm.models, "Using VLM scorer");
    Ok(Some(Box::new(client)))
}
