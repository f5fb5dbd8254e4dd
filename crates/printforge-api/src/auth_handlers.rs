use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use printforge_core::{
    hash_password, verify_password, AuthContext, Role, User, UserStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiError, ApiResult, AppState};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// What the API exposes about a user. Never the password hash.
#[derive(Serialize)]
pub struct UserDto {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub csrf_token: String,
    pub user: UserDto,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Json<UserDto>> {
    let email = request.email.trim().to_string();
    if !email.contains('@') || email.len() < 3 {
        return Err(ApiError::Validation("invalid email address".into()));
    }
    if request.password.len() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters".into(),
        ));
    }
    if request.display_name.trim().is_empty() {
        return Err(ApiError::Validation("display name is required".into()));
    }

    let role = if state
        .config
        .auth
        .admin_emails
        .iter()
        .any(|admin| admin.eq_ignore_ascii_case(&email))
    {
        Role::Admin
    } else {
        Role::Customer
    };

    let user = User {
        id: Uuid::new_v4(),
        email,
        password_hash: hash_password(&request.password)?,
        display_name: request.display_name.trim().to_string(),
        role,
        created_at: Utc::now(),
    };
    state.store.create_user(user.clone()).await?;
    Ok(Json(user.into()))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let user = state
        .store
        .get_user_by_email(request.email.trim())
        .await?
        .ok_or_else(|| ApiError::Unauthorized("unknown email or wrong password".into()))?;

    if !verify_password(&request.password, &user.password_hash)? {
        return Err(ApiError::Unauthorized(
            "unknown email or wrong password".into(),
        ));
    }

    let (token, session_id) = state.jwt.issue(&user)?;
    let csrf_token = state.csrf.token_for(&session_id);
    Ok(Json(SessionResponse {
        token,
        csrf_token,
        user: user.into(),
    }))
}

/// Sessions are stateless; logout exists so clients have a uniform place to
/// drop their token.
pub async fn logout(Extension(ctx): Extension<AuthContext>) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: format!("session {} ended, discard the token", ctx.session_id),
    })
}

pub async fn me(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<UserDto>> {
    let user = state
        .store
        .get_user(ctx.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user no longer exists".into()))?;
    Ok(Json(user.into()))
}
