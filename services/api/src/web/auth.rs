//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for registration, login, and token refresh.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use chrono::{DateTime, Utc};
use nexus_chat_core::domain::{IssuedToken, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::extract::FormBody;
use crate::web::middleware::AuthUser;
use crate::web::state::AppState;

pub const TOKEN_TYPE: &str = "bearer";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// The public projection of a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: UserProfile,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
}

fn auth_response(token: IssuedToken, user: User) -> AuthResponse {
    AuthResponse {
        access_token: token.token,
        token_type: TOKEN_TYPE.to_string(),
        user: user.into(),
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/auth/register - Create a new user account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body(content = RegisterForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 201, description = "User created and signed in", body = AuthResponse),
        (status = 400, description = "Invalid username, email or password"),
        (status = 409, description = "Email already registered")
    ),
    tag = "auth"
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    FormBody(form): FormBody<RegisterForm>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .credentials
        .register(&form.username, &form.email, &form.password)
        .await?;
    let token = state.tokens.issue(&user)?;

    Ok((StatusCode::CREATED, Json(auth_response(token, user))))
}

/// POST /api/auth/login - Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid email or password")
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    FormBody(form): FormBody<LoginForm>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = state.credentials.verify(&form.email, &form.password).await?;
    let token = state.tokens.issue(&user)?;
    info!(user_id = %user.id, "User logged in");

    Ok(Json(auth_response(token, user)))
}

/// POST /api/auth/refresh - Re-issue a still-valid token with a fresh expiry
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    responses(
        (status = 200, description = "New token issued", body = RefreshResponse),
        (status = 401, description = "Missing, invalid or expired token")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let token = state.tokens.refresh(&auth.token)?;

    Ok(Json(RefreshResponse {
        access_token: token.token,
        token_type: TOKEN_TYPE.to_string(),
    }))
}
