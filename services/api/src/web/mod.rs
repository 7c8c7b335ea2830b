//! services/api/src/web/mod.rs
//!
//! The HTTP surface: handlers, the auth middleware and the router that ties them together.

pub mod auth;
pub mod chat;
pub mod content;
pub mod extract;
pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::web::state::AppState;

pub use middleware::{require_auth, AuthUser};
pub use rest::ApiDoc;

/// Multipart framing on top of the file itself.
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

/// Builds the complete application router, Swagger UI included.
pub fn router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/api/health", get(rest::health_handler))
        .route("/api/auth/register", post(auth::register_handler))
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/chat/general", post(chat::general_chat_handler));

    let upload_limit = usize::try_from(state.config.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(UPLOAD_OVERHEAD_BYTES);

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/auth/refresh", post(auth::refresh_handler))
        .route("/api/chat/rag", post(chat::rag_chat_handler))
        .route(
            "/api/upload",
            post(content::upload_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/content/url", post(content::add_url_handler))
        .route("/api/content/list", get(content::list_content_handler))
        .route(
            "/api/content/{content_id}",
            delete(content::delete_content_handler),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors_layer(&state.config.cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    match origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin).allow_credentials(true),
        Err(_) => {
            warn!("Ignoring unparsable CORS origin '{origin}'");
            cors
        }
    }
}
