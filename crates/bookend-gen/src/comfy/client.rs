//! ComfyUI HTTP client.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use super::types::{HistoryEntry, OutputFile, PromptRequest, PromptResponse, SystemStats, UploadResponse};
use crate::error::{GenError, GenResult};
use crate::retry::{retry_async, RetryConfig};
use crate::workflow::Workflow;

/// Configuration for the ComfyUI client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComfyClientConfig {
    /// Base URL of the ComfyUI server
    pub url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// How long to wait for a queued prompt to finish
    pub completion_timeout_secs: u64,
    /// History polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Retries for transient HTTP failures
    pub max_retries: u32,
}

impl Default for ComfyClientConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8188".to_string(),
            request_timeout_secs: 30,
            completion_timeout_secs: 300,
            poll_interval_ms: 1000,
            max_retries: 2,
        }
    }
}

impl ComfyClientConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }
}

/// Client for a ComfyUI server.
pub struct ComfyClient {
    http: Client,
    config: ComfyClientConfig,
    client_id: String,
}

impl ComfyClient {
    pub fn new(config: ComfyClientConfig) -> GenResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            config,
            client_id: Uuid::new_v4().to_string(),
        })
    }

    pub fn config(&self) -> &ComfyClientConfig {
        &self.config
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }

    fn retry(&self, operation: &str) -> RetryConfig {
        RetryConfig::new(operation).with_max_retries(self.config.max_retries)
    }

    /// `GET /system_stats`; doubles as the health probe.
    pub async fn system_stats(&self) -> GenResult<SystemStats> {
        let url = self.url("/system_stats");
        retry_async(&self.retry("comfyui.system_stats"), || async {
            let response = check_status(self.http.get(&url).send().await?).await?;
            Ok(response.json::<SystemStats>().await?)
        })
        .await
    }

    /// Node class names the server knows about (`GET /object_info`).
    pub async fn object_info(&self) -> GenResult<BTreeSet<String>> {
        let url = self.url("/object_info");
        let info: serde_json::Map<String, Value> =
            retry_async(&self.retry("comfyui.object_info"), || async {
                let response = check_status(self.http.get(&url).send().await?).await?;
                Ok(response.json().await?)
            })
            .await?;
        Ok(info.keys().cloned().collect())
    }

    /// Upload an image into ComfyUI's input folder under `name`.
    ///
    /// Returns the name a `LoadImage` node should reference.
    pub async fn upload_image(&self, path: &Path, name: &str) -> GenResult<String> {
        let bytes = tokio::fs::read(path).await?;
        let mime = mime_for(path);
        let url = self.url("/upload/image");

        let uploaded: UploadResponse = retry_async(&self.retry("comfyui.upload_image"), || async {
            let part = Part::bytes(bytes.clone())
                .file_name(name.to_string())
                .mime_str(mime)?;
            let form = Form::new()
                .part("image", part)
                .text("type", "input")
                .text("overwrite", "true");
            let response = check_status(self.http.post(&url).multipart(form).send().await?).await?;
            Ok(response.json().await?)
        })
        .await?;

        debug!("Uploaded {} as {}", path.display(), uploaded.reference());
        Ok(uploaded.reference())
    }

    /// Queue a workflow and return its prompt id.
    pub async fn queue_prompt(&self, workflow: &Workflow) -> GenResult<String> {
        let url = self.url("/prompt");
        let prompt = workflow.to_value();
        let body = PromptRequest {
            prompt: &prompt,
            client_id: &self.client_id,
        };

        let response = retry_async(&self.retry("comfyui.queue_prompt"), || async {
            let response = self.http.post(&url).json(&body).send().await?;
            // Validation failures come back as 400 with a node_errors body
            if response.status().as_u16() == 400 {
                return Ok(response);
            }
            check_status(response).await
        })
        .await?;

        let status = response.status();
        let text = response.text().await?;
        let parsed: PromptResponse = serde_json::from_str(&text)
            .map_err(|_| GenError::Http { status: status.as_u16(), body: text.clone() })?;

        if let Some(rejection) = parsed.rejection() {
            return Err(GenError::NodeErrors(rejection));
        }

        let prompt_id = parsed
            .prompt_id
            .ok_or_else(|| GenError::invalid_response("missing prompt_id"))?;
        info!(prompt_id = %prompt_id, "Queued ComfyUI prompt");
        Ok(prompt_id)
    }

    /// `GET /history/{prompt_id}`; `None` until the prompt shows up.
    pub async fn history(&self, prompt_id: &str) -> GenResult<Option<HistoryEntry>> {
        let url = self.url(&format!("/history/{prompt_id}"));
        let mut history: serde_json::Map<String, Value> =
            retry_async(&self.retry("comfyui.history"), || async {
                let response = check_status(self.http.get(&url).send().await?).await?;
                Ok(response.json().await?)
            })
            .await?;

        match history.remove(prompt_id) {
            Some(entry) => Ok(Some(serde_json::from_value(entry)?)),
            None => Ok(None),
        }
    }

    /// Poll history until the prompt completes, errors, or times out.
    pub async fn wait_for_completion(&self, prompt_id: &str) -> GenResult<HistoryEntry> {
        let timeout = self.config.completion_timeout();
        let start = Instant::now();

        loop {
            if let Some(entry) = self.history(prompt_id).await? {
                if entry.is_error() {
                    let message = entry
                        .status
                        .as_ref()
                        .map(|s| s.error_message())
                        .unwrap_or_default();
                    return Err(GenError::generation_failed(message));
                }
                if entry.is_complete() {
                    info!(
                        prompt_id,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "ComfyUI prompt completed"
                    );
                    return Ok(entry);
                }
            }

            if start.elapsed() >= timeout {
                return Err(GenError::Timeout(timeout.as_secs()));
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }

    /// Download an output file into `dest_dir`, keeping its file name.
    pub async fn download_output(&self, file: &OutputFile, dest_dir: &Path) -> GenResult<PathBuf> {
        let url = self.url("/view");
        let query = [
            ("filename", file.filename.as_str()),
            ("subfolder", file.subfolder.as_str()),
            ("type", file.kind.as_str()),
        ];

        let bytes = retry_async(&self.retry("comfyui.download_output"), || async {
            let response = check_status(self.http.get(&url).query(&query).send().await?).await?;
            Ok(response.bytes().await?)
        })
        .await?;

        let name = Path::new(&file.filename)
            .file_name()
            .ok_or_else(|| GenError::invalid_response(format!("bad output name {}", file.filename)))?;
        tokio::fs::create_dir_all(dest_dir).await?;
        let dest = dest_dir.join(name);
        tokio::fs::write(&dest, &bytes).await?;
        debug!("Downloaded {} ({} bytes)", dest.display(), bytes.len());
        Ok(dest)
    }
}

async fn check_status(response: Response) -> GenResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GenError::Http {
        status: status.as_u16(),
        body,
    })
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ComfyClient {
        ComfyClient::new(ComfyClientConfig {
            url: server.uri(),
            poll_interval_ms: 10,
            completion_timeout_secs: 2,
            max_retries: 1,
            ..Default::default()
        })
        .unwrap()
    }

    fn workflow() -> Workflow {
        Workflow::from_value(json!({"1": {"class_type": "SaveImage", "inputs": {}}})).unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = ComfyClientConfig::default();
        assert_eq!(config.url, "http://127.0.0.1:8188");
        assert_eq!(config.completion_timeout(), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_system_stats_retries_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/system_stats"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/system_stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "system": {"os": "nt"}, "devices": [{"name": "cuda:0"}]
            })))
            .mount(&server)
            .await;

        let stats = client(&server).system_stats().await.unwrap();
        assert_eq!(stats.devices.len(), 1);
    }

    #[tokio::test]
    async fn test_object_info_names() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/object_info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "KSampler": {"input": {}}, "LoadImage": {"input": {}}
            })))
            .mount(&server)
            .await;

        let names = client(&server).object_info().await.unwrap();
        assert!(names.contains("KSampler"));
        assert_eq!(names.len(), 2);
    }

    #[tokio::test]
    async fn test_queue_prompt_node_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/prompt"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "Prompt outputs failed validation"},
                "node_errors": {"1": {"errors": [{"message": "Required input is missing"}]}}
            })))
            .mount(&server)
            .await;

        let err = client(&server).queue_prompt(&workflow()).await.unwrap_err();
        assert!(matches!(err, GenError::NodeErrors(_)));
    }

    #[tokio::test]
    async fn test_queue_and_wait() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/prompt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "prompt_id": "p-1", "number": 3, "node_errors": {}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/history/p-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/history/p-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "p-1": {
                    "outputs": {"9": {"images": [{"filename": "s1_00001_.png", "subfolder": "", "type": "output"}]}},
                    "status": {"status_str": "success", "completed": true, "messages": []}
                }
            })))
            .mount(&server)
            .await;

        let c = client(&server);
        let id = c.queue_prompt(&workflow()).await.unwrap();
        assert_eq!(id, "p-1");
        let entry = c.wait_for_completion(&id).await.unwrap();
        assert_eq!(entry.output_files().len(), 1);
    }

    #[tokio::test]
    async fn test_wait_reports_execution_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/history/p-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "p-2": {
                    "outputs": {},
                    "status": {"status_str": "error", "completed": false,
                               "messages": [["execution_error", {"exception_message": "boom"}]]}
                }
            })))
            .mount(&server)
            .await;

        let err = client(&server).wait_for_completion("p-2").await.unwrap_err();
        assert!(matches!(err, GenError::GenerationFailed(ref m) if m == "boom"));
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/history/p-3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let c = ComfyClient::new(ComfyClientConfig {
            url: server.uri(),
            poll_interval_ms: 10,
            completion_timeout_secs: 0,
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(c.wait_for_completion("p-3").await, Err(GenError::Timeout(0))));
    }

    #[tokio::test]
    async fn test_upload_and_download() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/image"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "bookend_s1_start.png", "subfolder": "", "type": "input"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/view"))
            .and(query_param("filename", "clip.mp4"))
            .and(query_param("type", "output"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"video-bytes".to_vec()))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let img = tmp.path().join("start.png");
        std::fs::write(&img, b"png").unwrap();

        let c = client(&server);
        let name = c.upload_image(&img, "bookend_s1_start.png").await.unwrap();
        assert_eq!(name, "bookend_s1_start.png");

        let file = OutputFile {
            filename: "clip.mp4".into(),
            subfolder: String::new(),
            kind: "output".into(),
        };
        let dest = c.download_output(&file, &tmp.path().join("out")).await.unwrap();
        assert_eq!(std::fs::read(dest).unwrap(), b"video-bytes");
    }
}
