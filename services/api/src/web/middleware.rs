//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use nexus_chat_core::errors::AuthError;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

/// The caller of a protected route, as established by `require_auth`.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    /// The bearer token the request was made with.
    pub token: String,
}

/// Middleware that validates the `Authorization: Bearer` token.
///
/// If valid, inserts an `AuthUser` into the request extensions for handlers to use.
/// If missing, malformed, forged or expired, the request is rejected with 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())
        .ok_or(ApiError::Auth(AuthError::InvalidToken))?
        .to_string();

    let user_id = state.tokens.validate(&token)?;

    req.extensions_mut().insert(AuthUser { user_id, token });
    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
