use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use printforge_core::PrintForgeError;
use printforge_queue::QueueError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Core(#[from] PrintForgeError),

    #[error("{0}")]
    Queue(#[from] QueueError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::Core(ref err) => match err {
                PrintForgeError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
                PrintForgeError::Validation(_) | PrintForgeError::Analysis(_) => {
                    (StatusCode::BAD_REQUEST, self.to_string())
                }
                PrintForgeError::InvalidOperation(_) => (StatusCode::CONFLICT, self.to_string()),
                PrintForgeError::Auth(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            },
            ApiError::Queue(ref err) => match err {
                QueueError::JobNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
                QueueError::IllegalTransition { .. }
                | QueueError::NotPending(_)
                | QueueError::AssignmentInFlight(_) => (StatusCode::CONFLICT, self.to_string()),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            },
            ApiError::Validation(_) | ApiError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
