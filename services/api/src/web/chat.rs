//! services/api/src/web/chat.rs
//!
//! The two chat endpoints: plain LLM chat and chat grounded in the caller's content.

use axum::{extract::State, Extension, Json};
use nexus_chat_core::domain::{ChatReply, SourceRef};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::extract::FormBody;
use crate::web::middleware::AuthUser;
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct ChatForm {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct GeneralChatResponse {
    pub response: String,
    /// Always `general`.
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SourceInfo {
    /// File name or URL of the cited content item.
    pub source: String,
    /// `file` or `url`.
    pub content_type: String,
    pub relevance_score: f32,
}

impl From<SourceRef> for SourceInfo {
    fn from(source: SourceRef) -> Self {
        Self {
            source: source.source,
            content_type: source.content_type.to_string(),
            relevance_score: source.relevance_score,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RagChatResponse {
    pub response: String,
    /// `documents` when the answer is grounded, `general` when nothing relevant was found.
    pub source: String,
    pub sources: Vec<SourceInfo>,
}

impl From<ChatReply> for RagChatResponse {
    fn from(reply: ChatReply) -> Self {
        Self {
            response: reply.response,
            source: reply.source.as_str().to_string(),
            sources: reply.sources.into_iter().map(SourceInfo::from).collect(),
        }
    }
}

fn require_message(form: &ChatForm) -> Result<&str, ApiError> {
    let message = form.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }
    Ok(message)
}

/// POST /api/chat/general - Chat with the language model, no authentication
#[utoipa::path(
    post,
    path = "/api/chat/general",
    request_body(content = ChatForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Model answer", body = GeneralChatResponse),
        (status = 400, description = "Empty message"),
        (status = 502, description = "The language model is unavailable")
    ),
    tag = "chat"
)]
pub async fn general_chat_handler(
    State(state): State<Arc<AppState>>,
    FormBody(form): FormBody<ChatForm>,
) -> Result<Json<GeneralChatResponse>, ApiError> {
    let message = require_message(&form)?;
    let reply = state.retrieval.general_chat(message).await?;

    Ok(Json(GeneralChatResponse {
        response: reply.response,
        source: reply.source.as_str().to_string(),
    }))
}

/// POST /api/chat/rag - Chat grounded in the caller's uploaded files and URLs
#[utoipa::path(
    post,
    path = "/api/chat/rag",
    request_body(content = ChatForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Answer with cited sources", body = RagChatResponse),
        (status = 400, description = "Empty message"),
        (status = 401, description = "Missing, invalid or expired token"),
        (status = 502, description = "The language model is unavailable")
    ),
    security(("bearer" = [])),
    tag = "chat"
)]
pub async fn rag_chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    FormBody(form): FormBody<ChatForm>,
) -> Result<Json<RagChatResponse>, ApiError> {
    let message = require_message(&form)?;
    let reply = state.retrieval.document_chat(auth.user_id, message).await?;

    Ok(Json(reply.into()))
}
