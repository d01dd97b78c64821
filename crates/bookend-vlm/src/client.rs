//! LM Studio / OpenAI-compatible VLM client.

use std::time::Duration;

use async_trait::async_trait;
use bookend_models::VlmScores;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{VlmError, VlmResult};
use crate::parse::parse_scores;
use crate::prompt::build_messages;
use crate::types::{ChatMessage, ChatRequest, ChatResponse, ModelList};
use crate::{FrameScorer, ScoringInput};

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Exponential backoff before retry `attempt` (0-based), capped.
fn retry_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(RETRY_MAX_DELAY)
}

/// Configuration for the VLM client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VlmConfig {
    /// Skip semantic scoring entirely when false
    pub enabled: bool,
    /// Base URL without the `/v1` suffix
    pub url: String,
    /// Models tried in order until one returns parseable scores
    pub models: Vec<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for VlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "http://127.0.0.1:1234".to_string(),
            models: vec!["qwen2.5-vl-7b-instruct".to_string()],
            api_key: None,
            timeout_secs: 120,
            max_retries: 2,
            temperature: 0.1,
            max_tokens: 700,
        }
    }
}

pub struct VlmClient {
    http: Client,
    config: VlmConfig,
}

impl VlmClient {
    pub fn new(config: VlmConfig) -> VlmResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(VlmError::Network)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &VlmConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// `GET /v1/models`.
    pub async fn list_models(&self) -> VlmResult<Vec<String>> {
        let response = self
            .authorize(self.http.get(self.url("/v1/models")))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(VlmError::ServiceUnavailable(format!(
                "model listing returned {}",
                response.status()
            )));
        }
        let list: ModelList = response.json().await?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    /// Send one chat completion and return the assistant text.
    pub async fn complete(&self, model: &str, messages: &[ChatMessage]) -> VlmResult<String> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };
        let url = self.url("/v1/chat/completions");

        let response = self
            .with_retry(|| async {
                let response = self
                    .authorize(self.http.post(&url))
                    .json(&request)
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(VlmError::Http {
                        status: status.as_u16(),
                        body,
                    });
                }
                Ok(response.json::<ChatResponse>().await?)
            })
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| VlmError::invalid_response("empty completion"))
    }

    /// Score a sample, trying each configured model in order.
    pub async fn score_sample(&self, input: &ScoringInput) -> VlmResult<VlmScores> {
        if self.config.models.is_empty() {
            return Err(VlmError::NoModels);
        }
        let messages = build_messages(input)?;

        let mut last_error = None;
        for model in &self.config.models {
            debug!("Scoring with VLM model {}", model);
            let attempt = async {
                let content = self.complete(model, &messages).await?;
                parse_scores(&content)
            };
            match attempt.await {
                Ok(mut scores) => {
                    scores.model = Some(model.clone());
                    info!(model = %model, overall = scores.overall, "VLM scored sample");
                    return Ok(scores);
                }
                Err(e) => {
                    warn!("VLM model {} failed: {}", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(VlmError::NoModels))
    }

    async fn with_retry<F, Fut, T>(&self, operation: F) -> VlmResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = VlmResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = retry_delay(attempt);
                    warn!(
                        "VLM request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl FrameScorer for VlmClient {
    /// Configured models that the server currently lists.
    async fn available_models(&self) -> VlmResult<Vec<String>> {
        let loaded = self.list_models().await?;
        Ok(self
            .config
            .models
            .iter()
            .filter(|m| loaded.contains(m))
            .cloned()
            .collect())
    }

    async fn score(&self, input: &ScoringInput) -> VlmResult<VlmScores> {
        self.score_sample(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_retry_delay_is_capped() {
        assert_eq!(retry_delay(0), Duration::from_millis(500));
        assert_eq!(retry_delay(2), Duration::from_secs(2));
        assert_eq!(retry_delay(6), RETRY_MAX_DELAY);
        assert_eq!(retry_delay(64), RETRY_MAX_DELAY);
        assert_eq!(retry_delay(u32::MAX), RETRY_MAX_DELAY);
    }

    fn client(server: &MockServer, models: &[&str]) -> VlmClient {
        VlmClient::new(VlmConfig {
            url: server.uri(),
            models: models.iter().map(|m| m.to_string()).collect(),
            max_retries: 1,
            ..Default::default()
        })
        .unwrap()
    }

    fn input(tmp: &TempDir) -> ScoringInput {
        let p = tmp.path().join("f.png");
        std::fs::write(&p, b"img").unwrap();
        ScoringInput {
            prompt: "waves crash".into(),
            start_keyframe: p.clone(),
            end_keyframe: p.clone(),
            first_frame: p.clone(),
            last_frame: p,
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
    }

    const SCORES: &str = r#"```json
{"prompt_adherence": 70, "start_fidelity": 80, "end_fidelity": 75, "temporal_coherence": 60, "artifact_free": 90, "overall": 72, "issues": [], "summary": "ok"}
```"#;

    #[test]
    fn test_config_defaults() {
        let config = VlmConfig::default();
        assert!((config.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.max_tokens, 700);
    }

    #[tokio::test]
    async fn test_score_sample() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"model": "m1", "max_tokens": 700, "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(SCORES)))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let scores = client(&server, &["m1"]).score_sample(&input(&tmp)).await.unwrap();
        assert_eq!(scores.overall, 72.0);
        assert_eq!(scores.model.as_deref(), Some("m1"));
    }

    #[tokio::test]
    async fn test_falls_back_to_next_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"model": "bad"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("I can't do that.")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"model": "good"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(SCORES)))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let scores = client(&server, &["bad", "good"])
            .score_sample(&input(&tmp))
            .await
            .unwrap();
        assert_eq!(scores.model.as_deref(), Some("good"));
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let err = client(&server, &["m1"]).score_sample(&input(&tmp)).await.unwrap_err();
        assert!(matches!(err, VlmError::Http { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_list_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "qwen2.5-vl-7b-instruct", "object": "model"}]
            })))
            .mount(&server)
            .await;

        let models = client(&server, &[]).list_models().await.unwrap();
        assert_eq!(models, vec!["qwen2.5-vl-7b-instruct"]);
    }

    #[tokio::test]
    async fn test_available_models_filters_configured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "llava"}, {"id": "qwen2.5-vl-7b-instruct"}]
            })))
            .mount(&server)
            .await;

        let scorer = client(&server, &["qwen2.5-vl-7b-instruct", "missing-model"]);
        let models = FrameScorer::available_models(&scorer).await.unwrap();
        assert_eq!(models, vec!["qwen2.5-vl-7b-instruct"]);
    }

    #[tokio::test]
    async fn test_no_models() {
        let server = MockServer::start().await;
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            client(&server, &[]).score_sample(&input(&tmp)).await,
            Err(VlmError::NoModels)
        ));
    }
}
