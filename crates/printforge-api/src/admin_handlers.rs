use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use printforge_monitor::{metrics, AlertSeverity, PerfAlert};
use printforge_queue::QueueSummary;
use printforge_quote::CacheStats;
use serde::{Deserialize, Serialize};

use crate::{ApiResult, AppState};

/// One payload feeding every widget on the admin dashboard.
#[derive(Serialize)]
pub struct DashboardResponse {
    pub queue: QueueSummary,
    pub quote_cache: CacheStats,
    pub quote_cache_hit_rate: f64,
    pub recent_alerts: Vec<PerfAlert>,
    pub requests_total: f64,
    pub orders_placed_total: f64,
}

pub async fn dashboard(State(state): State<AppState>) -> ApiResult<Json<DashboardResponse>> {
    let cache_stats = state.quoter.cache_stats();
    let mut recent_alerts = state.alerts.history(None, None);
    recent_alerts.truncate(10);

    Ok(Json(DashboardResponse {
        queue: state.queue.summary().await,
        quote_cache_hit_rate: cache_stats.hit_rate(),
        quote_cache: cache_stats,
        recent_alerts,
        requests_total: metrics::HTTP_REQUESTS_TOTAL.get(),
        orders_placed_total: metrics::ORDERS_PLACED_TOTAL.get(),
    }))
}

#[derive(Deserialize)]
pub struct AlertHistoryQuery {
    pub severity: Option<AlertSeverity>,
    pub since: Option<DateTime<Utc>>,
}

pub async fn alert_history(
    State(state): State<AppState>,
    Query(params): Query<AlertHistoryQuery>,
) -> ApiResult<Json<Vec<PerfAlert>>> {
    Ok(Json(state.alerts.history(params.severity, params.since)))
}

pub async fn export_alerts(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.alerts.export_json())
}
