//! services/api/src/web/rest.rs
//!
//! The health probe and the master definition for the OpenAPI specification.

use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

use crate::web::{auth, chat, content};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        auth::register_handler,
        auth::login_handler,
        auth::refresh_handler,
        chat::general_chat_handler,
        chat::rag_chat_handler,
        content::upload_handler,
        content::add_url_handler,
        content::list_content_handler,
        content::delete_content_handler,
    ),
    components(
        schemas(
            HealthResponse,
            auth::RegisterForm,
            auth::LoginForm,
            auth::UserProfile,
            auth::AuthResponse,
            auth::RefreshResponse,
            chat::ChatForm,
            chat::GeneralChatResponse,
            chat::SourceInfo,
            chat::RagChatResponse,
            content::UrlForm,
            content::ContentMetadataDto,
            content::IngestResponse,
            content::ContentSummary,
            content::ContentListResponse,
            content::DeleteResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Liveness probe."),
        (name = "auth", description = "Registration, login and token refresh."),
        (name = "chat", description = "General and document-grounded chat."),
        (name = "content", description = "Upload, list and delete searchable content.")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

//=========================================================================================
// Health
//=========================================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /api/health - Liveness probe
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "The service is up", body = HealthResponse)),
    tag = "health"
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
