use axum::{
    extract::{Path, State},
    Json,
};
use printforge_core::{JobPriority, JobStore, PrintJob, TrackingCode};
use printforge_queue::TrackingStatus;
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiError, ApiResult, AppState};

/// Public tracking endpoint: anyone holding a tracking code can see job
/// progress, nothing else.
pub async fn track(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<TrackingStatus>> {
    let code = TrackingCode::parse(&code)
        .ok_or_else(|| ApiError::BadRequest("malformed tracking code".into()))?;
    let status = state
        .queue
        .track(&code)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("tracking code {}", code)))?;
    Ok(Json(status))
}

// -------- Admin queue management --------

pub async fn list_jobs(State(state): State<AppState>) -> ApiResult<Json<Vec<PrintJob>>> {
    Ok(Json(state.store.list_jobs().await?))
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PrintJob>> {
    Ok(Json(state.queue.cancel(id).await?))
}

#[derive(Deserialize)]
pub struct SetPriorityRequest {
    pub priority: JobPriority,
}

pub async fn set_job_priority(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetPriorityRequest>,
) -> ApiResult<Json<PrintJob>> {
    Ok(Json(state.queue.reprioritize(id, request.priority).await?))
}
