//! Narrative run handlers.

use axum::extract::{Path, State};
use axum::Json;
use bookend_models::NarrativeRun;
use bookend_storage::NarrativeListing;

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_narratives(State(state): State<AppState>) -> ApiResult<Json<Vec<NarrativeListing>>> {
    Ok(Json(state.store.list_narratives().await?))
}

pub async fn get_narrative(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<NarrativeRun>> {
    Ok(Json(state.store.load_narrative(&run_id).await?))
}
