//! services/api/src/web/content.rs
//!
//! Endpoints for adding, listing and deleting a user's searchable content.

use axum::{
    extract::{multipart::MultipartError, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use nexus_chat_core::domain::{ContentItem, ContentMetadata, FileUpload};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::extract::{ContentId, FormBody, MultipartBody};
use crate::web::middleware::AuthUser;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct UrlForm {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ContentMetadataDto {
    pub filename: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub size_bytes: u64,
    pub text_length: usize,
    pub chunk_count: usize,
}

impl From<ContentMetadata> for ContentMetadataDto {
    fn from(metadata: ContentMetadata) -> Self {
        Self {
            filename: metadata.filename,
            url: metadata.url,
            title: metadata.title,
            size_bytes: metadata.size_bytes,
            text_length: metadata.text_length,
            chunk_count: metadata.chunk_count,
        }
    }
}

/// Returned after a file or URL has been indexed.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct IngestResponse {
    pub content_id: Uuid,
    /// `file` or `url`.
    pub content_type: String,
    pub metadata: ContentMetadataDto,
}

impl From<ContentItem> for IngestResponse {
    fn from(item: ContentItem) -> Self {
        Self {
            content_id: item.id,
            content_type: item.kind.to_string(),
            metadata: item.metadata.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ContentSummary {
    pub content_id: Uuid,
    pub content_type: String,
    pub metadata: ContentMetadataDto,
    pub created_at: DateTime<Utc>,
}

impl From<ContentItem> for ContentSummary {
    fn from(item: ContentItem) -> Self {
        Self {
            content_id: item.id,
            content_type: item.kind.to_string(),
            metadata: item.metadata.into(),
            created_at: item.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ContentListResponse {
    pub content: Vec<ContentSummary>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct DeleteResponse {
    pub status: String,
    pub content_id: Uuid,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/upload - Upload a document and index its text
///
/// Accepts a multipart/form-data request with a single part named `file`.
#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(
        content_type = "multipart/form-data",
        description = "The document to upload, in a part named `file`."
    ),
    responses(
        (status = 201, description = "Document indexed", body = IngestResponse),
        (status = 400, description = "Missing file part or unsupported file type"),
        (status = 401, description = "Missing, invalid or expired token"),
        (status = 413, description = "File exceeds the upload limit"),
        (status = 422, description = "No text could be extracted")
    ),
    security(("bearer" = [])),
    tag = "content"
)]
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    MultipartBody(mut multipart): MultipartBody,
) -> Result<impl IntoResponse, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| {
                ApiError::BadRequest("the file part must carry a filename".to_string())
            })?;
        let data = field.bytes().await.map_err(multipart_error)?;
        upload = Some(FileUpload { filename, data });
        break;
    }

    let upload = upload.ok_or_else(|| {
        ApiError::BadRequest("multipart body must include a 'file' part".to_string())
    })?;

    let item = state.ingestion.ingest_file(auth.user_id, upload).await?;
    info!(user_id = %auth.user_id, content_id = %item.id, "File ingested");

    Ok((StatusCode::CREATED, Json(IngestResponse::from(item))))
}

/// POST /api/content/url - Fetch a web page and index its main text
#[utoipa::path(
    post,
    path = "/api/content/url",
    request_body(content = UrlForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 201, description = "Page indexed", body = IngestResponse),
        (status = 400, description = "The URL could not be fetched"),
        (status = 401, description = "Missing, invalid or expired token"),
        (status = 422, description = "The page has too little readable content")
    ),
    security(("bearer" = [])),
    tag = "content"
)]
pub async fn add_url_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    FormBody(form): FormBody<UrlForm>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state.ingestion.ingest_url(auth.user_id, &form.url).await?;
    info!(user_id = %auth.user_id, content_id = %item.id, "URL ingested");

    Ok((StatusCode::CREATED, Json(IngestResponse::from(item))))
}

/// GET /api/content/list - List the caller's content, oldest first
#[utoipa::path(
    get,
    path = "/api/content/list",
    responses(
        (status = 200, description = "The caller's content items", body = ContentListResponse),
        (status = 401, description = "Missing, invalid or expired token")
    ),
    security(("bearer" = [])),
    tag = "content"
)]
pub async fn list_content_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ContentListResponse>, ApiError> {
    let items = state.ingestion.list_content(auth.user_id).await?;

    Ok(Json(ContentListResponse {
        content: items.into_iter().map(ContentSummary::from).collect(),
    }))
}

/// DELETE /api/content/{content_id} - Delete an item and its index entries
#[utoipa::path(
    delete,
    path = "/api/content/{content_id}",
    params(("content_id" = Uuid, Path, description = "The content item to delete")),
    responses(
        (status = 200, description = "Item deleted", body = DeleteResponse),
        (status = 401, description = "Missing, invalid or expired token"),
        (status = 403, description = "The item belongs to another user"),
        (status = 404, description = "No such item")
    ),
    security(("bearer" = [])),
    tag = "content"
)]
pub async fn delete_content_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    ContentId(content_id): ContentId,
) -> Result<Json<DeleteResponse>, ApiError> {
    state
        .ingestion
        .delete_content(auth.user_id, content_id)
        .await?;

    Ok(Json(DeleteResponse {
        status: "deleted".to_string(),
        content_id,
    }))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}
