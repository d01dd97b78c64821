//! Workflow-driven ComfyUI generation backend.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, warn};

use super::client::ComfyClient;
use crate::backend::{classify_outputs, GenerationBackend, GenerationOutput, GenerationRequest};
use crate::error::{GenError, GenResult};
use crate::workflow::{BindingValues, Workflow, WorkflowBindings};

pub struct ComfyBackend {
    client: ComfyClient,
    workflow: Workflow,
    bindings: WorkflowBindings,
}

impl ComfyBackend {
    /// Bindings are checked against the workflow up front.
    pub fn new(client: ComfyClient, workflow: Workflow, bindings: WorkflowBindings) -> GenResult<Self> {
        bindings.validate(&workflow)?;
        Ok(Self {
            client,
            workflow,
            bindings,
        })
    }

    pub fn client(&self) -> &ComfyClient {
        &self.client
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Node classes the workflow uses that the server does not provide.
    pub async fn missing_node_classes(&self) -> GenResult<BTreeSet<String>> {
        let available = self.client.object_info().await?;
        Ok(self
            .workflow
            .class_types()
            .into_iter()
            .filter(|c| !available.contains(c))
            .collect())
    }

    async fn upload_keyframe(&self, path: &Path, sample_id: &str, role: &str) -> GenResult<String> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("png");
        let name = format!("bookend_{sample_id}_{role}.{ext}");
        self.client.upload_image(path, &name).await
    }
}

#[async_trait]
impl GenerationBackend for ComfyBackend {
    fn name(&self) -> &str {
        "comfyui"
    }

    async fn health_check(&self) -> GenResult<()> {
        self.client
            .system_stats()
            .await
            .map(|_| ())
            .map_err(|e| GenError::ServiceUnavailable(format!("ComfyUI at {}: {e}", self.client.config().url)))
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        output_dir: &Path,
    ) -> GenResult<GenerationOutput> {
        let started = Instant::now();

        let start_image = self
            .upload_keyframe(&request.start_keyframe, &request.sample_id, "start")
            .await?;
        let end_image = self
            .upload_keyframe(&request.end_keyframe, &request.sample_id, "end")
            .await?;

        let values = BindingValues {
            prompt: request.prompt.clone(),
            negative_prompt: request.negative_prompt.clone(),
            start_image: Some(start_image),
            end_image: Some(end_image),
            seed: request.seed,
            frame_count: request.frame_count,
            fps: request.fps,
            width: request.width,
            height: request.height,
            filename_prefix: format!("bookend_{}", request.sample_id),
        };
        let mut workflow = self.workflow.clone();
        self.bindings.apply(&mut workflow, &values)?;
        let seed = request.seed.or_else(|| self.bindings.current_seed(&workflow));

        let prompt_id = self.client.queue_prompt(&workflow).await?;
        let entry = self.client.wait_for_completion(&prompt_id).await?;

        let files = entry.output_files();
        if files.is_empty() {
            return Err(GenError::NoOutputs);
        }

        let mut local = Vec::with_capacity(files.len());
        for file in &files {
            match self.client.download_output(file, output_dir).await {
                Ok(path) => local.push(path),
                Err(e) => warn!("Failed to download output {}: {}", file.filename, e),
            }
        }

        let (video_path, frame_paths) = classify_outputs(local);
        let output = GenerationOutput {
            video_path,
            frame_paths,
            duration_ms: started.elapsed().as_millis() as u64,
            seed,
        };
        if output.is_empty() {
            return Err(GenError::NoOutputs);
        }

        info!(
            sample_id = %request.sample_id,
            prompt_id = %prompt_id,
            frames = output.frame_paths.len(),
            has_video = output.video_path.is_some(),
            duration_ms = output.duration_ms,
            "ComfyUI generation finished"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comfy::ComfyClientConfig;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn workflow() -> Workflow {
        Workflow::from_value(json!({
            "2": {"class_type": "LoadImage", "inputs": {"image": "x.png"}},
            "3": {"class_type": "LoadImage", "inputs": {"image": "y.png"}},
            "4": {"class_type": "CLIPTextEncode", "inputs": {"text": ""}},
            "5": {"class_type": "KSampler", "inputs": {"seed": 7}},
            "9": {"class_type": "SaveImage", "inputs": {"filename_prefix": "out", "images": ["5", 0]}}
        }))
        .unwrap()
    }

    fn bindings() -> WorkflowBindings {
        WorkflowBindings {
            prompt: Some("4.text".into()),
            start_image: Some("2.image".into()),
            end_image: Some("3.image".into()),
            seed: Some("5.seed".into()),
            filename_prefix: Some("9.filename_prefix".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_rejects_bad_bindings() {
        let client = ComfyClient::new(ComfyClientConfig::default()).unwrap();
        let bad = WorkflowBindings {
            prompt: Some("42.text".into()),
            ..Default::default()
        };
        assert!(ComfyBackend::new(client, workflow(), bad).is_err());
    }

    #[tokio::test]
    async fn test_generate_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/image"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "k.png", "subfolder": "", "type": "input"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/prompt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"prompt_id": "p", "node_errors": {}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/history/p"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "p": {
                    "outputs": {"9": {"images": [
                        {"filename": "bookend_s1_00002_.png", "subfolder": "", "type": "output"},
                        {"filename": "bookend_s1_00001_.png", "subfolder": "", "type": "output"}
                    ]}},
                    "status": {"status_str": "success", "completed": true}
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/view"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"img".to_vec()))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let start = tmp.path().join("start.png");
        let end = tmp.path().join("end.png");
        std::fs::write(&start, b"s").unwrap();
        std::fs::write(&end, b"e").unwrap();

        let client = ComfyClient::new(ComfyClientConfig {
            url: server.uri(),
            poll_interval_ms: 10,
            ..Default::default()
        })
        .unwrap();
        let backend = ComfyBackend::new(client, workflow(), bindings()).unwrap();

        let request = GenerationRequest::from(&bookend_models::BookendSample::new("s1", "a fox", &start, &end));
        let out_dir = tmp.path().join("out");
        let output = backend.generate(&request, &out_dir).await.unwrap();

        assert!(output.video_path.is_none());
        assert_eq!(output.frame_paths.len(), 2);
        assert!(output.frame_paths[0].ends_with("bookend_s1_00001_.png"));
        assert_eq!(output.seed, Some(7));
    }
}
