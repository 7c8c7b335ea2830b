//! crates/nexus_chat_core/src/errors.rs
//!
//! The error taxonomy of the core services. Adapter failures arrive as
//! `PortError` and are folded into these at the service boundary.

use crate::ports::PortError;
use uuid::Uuid;

/// Failures of registration, login and bearer-token handling.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("A user with this email already exists")]
    DuplicateEmail,
    #[error("Invalid authentication token")]
    InvalidToken,
    #[error("Authentication token has expired")]
    Expired,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Port(#[from] PortError),
}

/// Why a presented token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token signature does not verify")]
    BadSignature,
    #[error("malformed token: {0}")]
    Malformed(String),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::Expired,
            TokenError::BadSignature | TokenError::Malformed(_) => AuthError::InvalidToken,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotFoundError {
    #[error("Content {0} not found")]
    ContentNotFound(Uuid),
}

#[derive(Debug, thiserror::Error)]
pub enum ContentAccessError {
    #[error("Content {0} belongs to another user")]
    NotOwner(Uuid),
}

/// Failures of the content ingestion gateway.
#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },
    #[error("Failed to extract text: {0}")]
    ExtractionFailed(String),
    #[error("Failed to fetch URL: {0}")]
    FetchFailed(String),
    #[error("Unsupported content: {0}")]
    UnsupportedContent(String),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    Access(#[from] ContentAccessError),
    #[error(transparent)]
    Port(#[from] PortError),
}

/// Failures of the retrieval coordinator.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("The language model is unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error(transparent)]
    Port(#[from] PortError),
}
