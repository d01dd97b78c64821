//! Router tests against a temporary results store.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use bookend_api::{create_router, ApiConfig, AppState};
use bookend_harness::baseline_from_report;
use bookend_models::{
    ContinuityCheck, FrameScores, NarrativeRun, NarrativeSummary, QualityThresholds, RunReport,
    RunSummary, SampleResult, Verdict,
};
use chrono::Utc;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

fn sample(id: &str, avg: f64) -> SampleResult {
    let mut s = SampleResult::new(id, "prompt");
    s.frames = Some(FrameScores::new(avg, avg));
    s
}

fn report(run_id: &str, avgs: &[(&str, f64)]) -> RunReport {
    let samples: Vec<_> = avgs.iter().map(|(id, avg)| sample(id, *avg)).collect();
    RunReport {
        run_id: run_id.to_string(),
        manifest: "smoke".to_string(),
        backend: "comfyui".to_string(),
        started_at: Utc::now(),
        finished_at: Utc::now(),
        thresholds: QualityThresholds::default(),
        summary: RunSummary::from_results(&samples),
        samples,
    }
}

struct TestApp {
    _tmp: TempDir,
    state: AppState,
}

impl TestApp {
    async fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let config = ApiConfig {
            results_dir: tmp.path().join("results"),
            baseline_path: tmp.path().join("baseline.json"),
            cors_origins: vec!["http://localhost:3000".to_string()],
            ..ApiConfig::default()
        };
        let state = AppState::new(config);
        tokio::fs::create_dir_all(state.store.root()).await.unwrap();
        Self { _tmp: tmp, state }
    }

    fn router(&self) -> Router {
        create_router(self.state.clone(), None)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let response = self
            .router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}

#[tokio::test]
async fn test_health_and_ready() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.get("/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_runs_and_samples() {
    let app = TestApp::new().await;
    app.state.store.save_report(&report("run-a", &[("s1", 80.0), ("s2", 90.0)])).await.unwrap();

    let (status, body) = app.get("/api/runs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["run_id"], "run-a");

    let (status, body) = app.get("/api/runs/run-a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["samples"].as_array().unwrap().len(), 2);

    let (status, body) = app.get("/api/runs/run-a/samples/s2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["frames"]["average"], 90.0);

    let (status, body) = app.get("/api/runs/run-a/samples/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_missing_and_invalid_runs() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/api/runs/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].is_string());

    let (status, _) = app.get("/api/runs/bad.id").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_compare() {
    let app = TestApp::new().await;
    app.state.store.save_report(&report("run-a", &[("s1", 80.0)])).await.unwrap();
    app.state.store.save_report(&report("run-b", &[("s1", 86.0)])).await.unwrap();

    let (status, body) = app.get("/api/compare?a=run-a&b=run-b").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["b_wins"], 1);
    assert_eq!(body["samples"][0]["winner"], "b");

    let (status, body) = app.get("/api/compare?a=run-a").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_baseline() {
    let app = TestApp::new().await;
    let (status, _) = app.get("/api/baseline").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let baseline = baseline_from_report(&report("run-a", &[("s1", 80.0)]), false);
    tokio_test::assert_ok!(app.state.store.save_baseline(&baseline).await);

    let (status, body) = app.get("/api/baseline").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source_run"], "run-a");
    assert_eq!(body["samples"]["s1"]["average"], 80.0);
}

#[tokio::test]
async fn test_narratives() {
    let app = TestApp::new().await;
    let shots = vec![sample("a", 80.0), sample("b", 82.0)];
    let continuity = vec![ContinuityCheck {
        from_shot: "a".to_string(),
        to_shot: "b".to_string(),
        similarity: Some(70.0),
        verdict: Verdict::Pass,
        message: String::new(),
    }];
    let run = NarrativeRun {
        run_id: "story-1".to_string(),
        script_id: "story".to_string(),
        title: "Story".to_string(),
        backend: "fastvideo".to_string(),
        started_at: Utc::now(),
        finished_at: Utc::now(),
        summary: NarrativeSummary::from_parts(&shots, &continuity),
        shots,
        continuity,
    };
    app.state.store.save_narrative(&run).await.unwrap();

    let (status, body) = app.get("/api/narratives").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["script_id"], "story");

    let (status, body) = app.get("/api/narratives/story-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["continuity"][0]["similarity"], 70.0);
}

#[tokio::test]
async fn test_headers() {
    let app = TestApp::new().await;
    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("X-Request-ID", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers.get("x-request-id").unwrap(), "req-123");
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = TestApp::new().await;
    let response = app
        .router()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/runs")
                .header("Origin", "http://localhost:3000")
                .header("Access-Control-Request-Method", "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "http://localhost:3000"
    );
}
