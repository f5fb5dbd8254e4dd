use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub queue_pending: usize,
    pub printers_total: usize,
    pub printers_idle: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let summary = state.queue.summary().await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: option_env!("CARGO_PKG_VERSION")
            .unwrap_or("0.1.0")
            .to_string(),
        queue_pending: summary.pending,
        printers_total: summary.printers_total,
        printers_idle: summary.printers_idle,
    })
}

pub async fn metrics_handler() -> (StatusCode, String) {
    (StatusCode::OK, printforge_monitor::render_metrics())
}
