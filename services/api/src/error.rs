//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how each
//! failure is rendered as an HTTP response.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use nexus_chat_core::errors::{
    AuthError, ContentAccessError, IngestionError, NotFoundError, RetrievalError, TokenError,
};
use nexus_chat_core::ports::PortError;
use serde_json::json;
use tracing::{error, warn};

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A request that is malformed before it reaches a core service.
    #[error("Invalid input: {0}")]
    BadRequest(String),

    /// A content id that cannot refer to any stored item.
    #[error("Content {0} not found")]
    UnknownContent(String),

    /// The request body exceeded the transport limit.
    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        ApiError::Auth(err.into())
    }
}

impl ApiError {
    /// The HTTP status and the reason name reported in the `error` field.
    pub fn status_and_reason(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Auth(err) => match err {
                AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "InvalidCredentials"),
                AuthError::DuplicateEmail => (StatusCode::CONFLICT, "DuplicateEmail"),
                AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "InvalidToken"),
                AuthError::Expired => (StatusCode::UNAUTHORIZED, "Expired"),
                AuthError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "InvalidInput"),
                AuthError::Port(port) => port_status(port),
            },
            ApiError::Ingestion(err) => match err {
                IngestionError::UnsupportedType(_) => (StatusCode::BAD_REQUEST, "UnsupportedType"),
                IngestionError::TooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "TooLarge"),
                IngestionError::ExtractionFailed(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "ExtractionFailed")
                }
                IngestionError::FetchFailed(_) => (StatusCode::BAD_REQUEST, "FetchFailed"),
                IngestionError::UnsupportedContent(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "UnsupportedContent")
                }
                IngestionError::NotFound(NotFoundError::ContentNotFound(_)) => {
                    (StatusCode::NOT_FOUND, "ContentNotFound")
                }
                IngestionError::Access(ContentAccessError::NotOwner(_)) => {
                    (StatusCode::FORBIDDEN, "NotOwner")
                }
                IngestionError::Port(port) => port_status(port),
            },
            ApiError::Retrieval(err) => match err {
                RetrievalError::UpstreamUnavailable(_) => {
                    (StatusCode::BAD_GATEWAY, "UpstreamUnavailable")
                }
                RetrievalError::Port(port) => port_status(port),
            },
            ApiError::Port(port) => port_status(port),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "InvalidInput"),
            ApiError::UnknownContent(_) => (StatusCode::NOT_FOUND, "ContentNotFound"),
            ApiError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "TooLarge"),
            ApiError::Config(_)
            | ApiError::Database(_)
            | ApiError::Migration(_)
            | ApiError::Io(_)
            | ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal"),
        }
    }
}

fn port_status(err: &PortError) -> (StatusCode, &'static str) {
    match err {
        PortError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
        PortError::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
        PortError::Unavailable(_) => (StatusCode::BAD_GATEWAY, "UpstreamUnavailable"),
        PortError::Unsupported(_) => (StatusCode::BAD_REQUEST, "Unsupported"),
        PortError::Unexpected(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, reason) = self.status_and_reason();

        // Internal details stay in the log.
        let message = if status.is_server_error() && status != StatusCode::BAD_GATEWAY {
            error!("{reason}: {self}");
            "An internal error occurred".to_string()
        } else {
            warn!("{reason}: {self}");
            self.to_string()
        };

        let body = Json(json!({ "error": reason, "message": message }));
        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}
