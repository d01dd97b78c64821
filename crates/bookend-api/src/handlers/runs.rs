//! Regression run handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use bookend_harness::compare_reports;
use bookend_models::{AbComparison, Baseline, RunReport, SampleResult};
use bookend_storage::RunListing;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Run history, newest first.
pub async fn list_runs(State(state): State<AppState>) -> ApiResult<Json<Vec<RunListing>>> {
    let runs = state.store.list_runs().await?;
    debug!(count = runs.len(), "Listed runs");
    Ok(Json(runs))
}

pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<RunReport>> {
    Ok(Json(state.store.load_report(&run_id).await?))
}

pub async fn get_sample(
    State(state): State<AppState>,
    Path((run_id, sample_id)): Path<(String, String)>,
) -> ApiResult<Json<SampleResult>> {
    let report = state.store.load_report(&run_id).await?;
    report
        .samples
        .into_iter()
        .find(|s| s.sample_id == sample_id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("sample {sample_id} in run {run_id}")))
}

#[derive(Debug, Deserialize)]
pub struct CompareParams {
    pub a: Option<String>,
    pub b: Option<String>,
}

/// `GET /api/compare?a=<run>&b=<run>`
pub async fn compare_runs(
    State(state): State<AppState>,
    Query(params): Query<CompareParams>,
) -> ApiResult<Json<AbComparison>> {
    let (Some(a), Some(b)) = (params.a, params.b) else {
        return Err(ApiError::bad_request("query parameters 'a' and 'b' are required"));
    };
    let report_a = state.store.load_report(&a).await?;
    let report_b = state.store.load_report(&b).await?;
    Ok(Json(compare_reports(&report_a, &report_b)))
}

pub async fn get_baseline(State(state): State<AppState>) -> ApiResult<Json<Baseline>> {
    state
        .store
        .load_baseline()
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("no baseline recorded"))
}
