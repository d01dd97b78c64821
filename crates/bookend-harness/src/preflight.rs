//! Preflight checks run before a QA run touches the GPU.

use bookend_gen::GenerationBackend;
use bookend_models::{QualityThresholds, Verdict};
use bookend_vlm::FrameScorer;
use serde::Serialize;
use tracing::{info, warn};

use crate::backends::Backend;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreflightCheck {
    pub name: String,
    pub verdict: Verdict,
    pub message: String,
}

impl PreflightCheck {
    fn new(name: &str, verdict: Verdict, message: impl Into<String>) -> Self {
        let check = Self {
            name: name.to_string(),
            verdict,
            message: message.into(),
        };
        match verdict {
            Verdict::Pass => info!(check = name, "{}", check.message),
            _ => warn!(check = name, verdict = verdict.as_str(), "{}", check.message),
        }
        check
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreflightReport {
    pub checks: Vec<PreflightCheck>,
    pub verdict: Verdict,
}

impl PreflightReport {
    fn from_checks(checks: Vec<PreflightCheck>) -> Self {
        let verdict = Verdict::worst(checks.iter().map(|c| c.verdict));
        Self { checks, verdict }
    }
}

/// Backend health, workflow wiring, node availability, FFmpeg and VLM models.
pub async fn run_preflight(
    backend: &Backend,
    scorer: Option<&dyn FrameScorer>,
    thresholds: &QualityThresholds,
) -> PreflightReport {
    let mut checks = Vec::new();
    let generation = backend.as_generation();

    checks.push(match generation.health_check().await {
        Ok(()) => PreflightCheck::new("backend", Verdict::Pass, format!("{} is healthy", generation.name())),
        Err(e) => PreflightCheck::new("backend", Verdict::Fail, e.to_string()),
    });

    if let Backend::Comfy(comfy) = backend {
        let broken = comfy.workflow().verify_connections();
        checks.push(if broken.is_empty() {
            PreflightCheck::new(
                "workflow_links",
                Verdict::Pass,
                format!("{} nodes, all links resolve", comfy.workflow().len()),
            )
        } else {
            let detail: Vec<String> = broken
                .iter()
                .map(|b| format!("{}.{} -> {}", b.node_id, b.input, b.target))
                .collect();
            PreflightCheck::new(
                "workflow_links",
                Verdict::Fail,
                format!("broken links: {}", detail.join(", ")),
            )
        });

        checks.push(match comfy.missing_node_classes().await {
            Ok(missing) if missing.is_empty() => {
                PreflightCheck::new("node_classes", Verdict::Pass, "all node classes available")
            }
            Ok(missing) => PreflightCheck::new(
                "node_classes",
                Verdict::Warn,
                format!(
                    "missing node classes: {}",
                    missing.into_iter().collect::<Vec<_>>().join(", ")
                ),
            ),
            Err(e) => PreflightCheck::new("node_classes", Verdict::Warn, format!("object_info failed: {e}")),
        });
    }

    checks.push(match bookend_media::check_ffmpeg() {
        Ok(path) => PreflightCheck::new("ffmpeg", Verdict::Pass, format!("found at {}", path.display())),
        Err(e) => PreflightCheck::new("ffmpeg", Verdict::Warn, format!("{e}; video outputs cannot be checked")),
    });

    checks.push(vlm_check(scorer, thresholds).await);
    PreflightReport::from_checks(checks)
}

async fn vlm_check(scorer: Option<&dyn FrameScorer>, thresholds: &QualityThresholds) -> PreflightCheck {
    let missing = if thresholds.vlm_required {
        Verdict::Fail
    } else {
        Verdict::Warn
    };
    let Some(scorer) = scorer else {
        return PreflightCheck::new("vlm", missing, "VLM scoring disabled");
    };
    match scorer.available_models().await {
        Ok(models) if !models.is_empty() => {
            PreflightCheck::new("vlm", Verdict::Pass, format!("models available: {}", models.join(", ")))
        }
        Ok(_) => PreflightCheck::new("vlm", missing, "none of the configured models are loaded"),
        Err(e) => PreflightCheck::new("vlm", missing, e.to_string()),
    }
}
