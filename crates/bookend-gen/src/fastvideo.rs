//! FastVideo adapter client and backend.
//!
//! The adapter generates synchronously: `POST /generate` returns once the MP4
//! is written to the requested output directory.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backend::{GenerationBackend, GenerationOutput, GenerationRequest};
use crate::error::{GenError, GenResult};
use crate::retry::{retry_async, RetryConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FastVideoConfig {
    pub url: String,
    /// Generation can take minutes
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for FastVideoConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8055".to_string(),
            timeout_secs: 900,
            max_retries: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FastVideoHealth {
    pub status: String,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub model_loaded: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FastVideoRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyframe_base64: Option<String>,
    pub fps: u32,
    pub num_frames: u32,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub output_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FastVideoResponse {
    pub status: String,
    #[serde(default)]
    pub output_video_path: Option<String>,
    #[serde(default)]
    pub frames: Option<u32>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub struct FastVideoClient {
    http: Client,
    config: FastVideoConfig,
}

impl FastVideoClient {
    pub fn new(config: FastVideoConfig) -> GenResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &FastVideoConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }

    pub async fn health(&self) -> GenResult<FastVideoHealth> {
        let url = self.url("/health");
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(GenError::ServiceUnavailable(format!(
                "FastVideo health returned {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    pub async fn generate(&self, request: &FastVideoRequest) -> GenResult<FastVideoResponse> {
        let url = self.url("/generate");
        let config = RetryConfig::new("fastvideo.generate").with_max_retries(self.config.max_retries);

        retry_async(&config, || async {
            let response = self.http.post(&url).json(request).send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(GenError::Http {
                    status: status.as_u16(),
                    body: detail_of(&body),
                });
            }
            Ok(response.json::<FastVideoResponse>().await?)
        })
        .await
    }
}

/// FastAPI errors carry `{"detail": "..."}`.
fn detail_of(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

pub struct FastVideoBackend {
    client: FastVideoClient,
}

impl FastVideoBackend {
    pub fn new(client: FastVideoClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GenerationBackend for FastVideoBackend {
    fn name(&self) -> &str {
        "fastvideo"
    }

    async fn health_check(&self) -> GenResult<()> {
        let health = self.client.health().await?;
        if health.status == "ok" {
            Ok(())
        } else {
            Err(GenError::ServiceUnavailable(format!(
                "FastVideo status is {}",
                health.status
            )))
        }
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        output_dir: &Path,
    ) -> GenResult<GenerationOutput> {
        let started = Instant::now();
        let keyframe = tokio::fs::read(&request.start_keyframe).await?;
        tokio::fs::create_dir_all(output_dir).await?;

        let body = FastVideoRequest {
            prompt: request.prompt.clone(),
            negative_prompt: request.negative_prompt.clone(),
            keyframe_base64: Some(BASE64.encode(keyframe)),
            fps: request.fps,
            num_frames: request.frame_count,
            width: request.width,
            height: request.height,
            seed: request.seed,
            output_dir: output_dir.to_string_lossy().to_string(),
        };

        let response = self.client.generate(&body).await?;
        for warning in &response.warnings {
            warn!(sample_id = %request.sample_id, "FastVideo: {}", warning);
        }

        if response.status == "error" {
            return Err(GenError::generation_failed(
                response.error.unwrap_or_else(|| "unknown FastVideo error".to_string()),
            ));
        }
        let video = response
            .output_video_path
            .filter(|p| !p.is_empty())
            .ok_or_else(|| GenError::invalid_response("FastVideo returned no outputVideoPath"))?;

        let output = GenerationOutput {
            video_path: Some(PathBuf::from(video)),
            frame_paths: Vec::new(),
            duration_ms: response
                .duration_ms
                .unwrap_or_else(|| started.elapsed().as_millis() as u64),
            seed: response.seed.or(request.seed),
        };
        info!(
            sample_id = %request.sample_id,
            frames = response.frames,
            duration_ms = output.duration_ms,
            "FastVideo generation finished"
        );
        Ok(output)
    }
}
