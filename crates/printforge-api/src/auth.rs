use axum::{
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::Response,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use printforge_core::AuthContext;
use std::{collections::HashMap, num::NonZeroU32, sync::Arc};

use crate::{ApiError, AppState};

const CSRF_HEADER: &str = "x-csrf-token";

/// Per-tier request throttles. Direct (unkeyed) limiters are shared by all
/// clients in a tier.
pub struct RateLimitManager {
    limiters: HashMap<&'static str, Arc<DefaultDirectRateLimiter>>,
}

impl RateLimitManager {
    pub fn new() -> Self {
        let mut limiters = HashMap::new();
        limiters.insert(
            "user",
            Arc::new(RateLimiter::direct(Quota::per_hour(
                NonZeroU32::new(2000).unwrap(),
            ))),
        );
        limiters.insert(
            "admin",
            Arc::new(RateLimiter::direct(Quota::per_hour(
                NonZeroU32::new(10000).unwrap(),
            ))),
        );
        Self { limiters }
    }

    pub fn check(&self, tier: &str) -> Result<(), ApiError> {
        let limiter = self
            .limiters
            .get(tier)
            .or_else(|| self.limiters.get("user"))
            .expect("default tier configured");
        if limiter.check().is_err() {
            return Err(ApiError::RateLimited);
        }
        Ok(())
    }
}

impl Default for RateLimitManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Bearer-token authentication. Verifies the JWT, throttles by tier,
/// enforces the CSRF token on state-changing requests, and attaches the
/// `AuthContext` for handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?;

    let ctx = state
        .jwt
        .verify(token)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    let tier = if ctx.is_admin() { "admin" } else { "user" };
    state.rate_limits.check(tier)?;

    if state_changing(req.method()) {
        let presented = req
            .headers()
            .get(CSRF_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Forbidden("missing CSRF token".into()))?;
        if !state.csrf.verify(&ctx.session_id, presented) {
            return Err(ApiError::Forbidden("invalid CSRF token".into()));
        }
    }

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

/// Must run inside `require_auth`; rejects non-admin identities.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let ctx = req
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| ApiError::Unauthorized("authentication required".into()))?;
    if !ctx.is_admin() {
        return Err(ApiError::Forbidden("admin role required".into()));
    }
    Ok(next.run(req).await)
}

fn state_changing(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}
