use axum::{extract::State, Json};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use printforge_quote::Quote;
use serde::Deserialize;

use crate::{ApiError, ApiResult, AppState};

#[derive(Deserialize)]
pub struct QuoteRequest {
    /// STL model bytes, base64-encoded.
    pub model_base64: String,
    pub material: String,
}

pub async fn create_quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> ApiResult<Json<Quote>> {
    // Cheap pre-check before decoding: 4 base64 chars per 3 bytes.
    let max_encoded = state.config.server.max_upload_bytes / 3 * 4 + 4;
    if request.model_base64.len() > max_encoded {
        return Err(ApiError::Validation(format!(
            "model exceeds the {} byte upload limit",
            state.config.server.max_upload_bytes
        )));
    }

    let model_bytes = STANDARD
        .decode(request.model_base64.as_bytes())
        .map_err(|_| ApiError::Validation("model_base64 is not valid base64".into()))?;
    if model_bytes.len() > state.config.server.max_upload_bytes {
        return Err(ApiError::Validation(format!(
            "model exceeds the {} byte upload limit",
            state.config.server.max_upload_bytes
        )));
    }

    let quote = state.quoter.quote(&model_bytes, &request.material)?;
    Ok(Json(quote))
}

pub async fn list_materials(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.quoter.materials().names())
}
