use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use printforge_monitor::{metrics, ThresholdKind};
use std::time::Instant;

use crate::AppState;

/// Baseline security headers on every response.
pub async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::X_FRAME_OPTIONS,
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    response
}

/// Counts requests, records latency, and feeds the alert engine so slow
/// requests surface on the admin dashboard.
pub async fn track_metrics_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed = start.elapsed();

    metrics::HTTP_REQUESTS_TOTAL.inc();
    metrics::HTTP_REQUEST_DURATION_SECONDS.observe(elapsed.as_secs_f64());
    state
        .alerts
        .observe(ThresholdKind::RequestLatencyMs, elapsed.as_secs_f64() * 1000.0);

    response
}
