//! crates/nexus_chat_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ContentChunk, ContentItem, IssuedToken, ScoredPassage, ScrapedPage, User, UserCredentials,
};
use crate::errors::TokenError;
use crate::formats::DocumentFormat;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Upstream service unavailable: {0}")]
    Unavailable(String),
    #[error("Unsupported input: {0}")]
    Unsupported(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Ports
//=========================================================================================

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a new user. Fails with `PortError::Conflict` if the email is taken.
    async fn insert_user(&self, credentials: UserCredentials) -> PortResult<User>;

    async fn find_user_by_email(&self, email: &str) -> PortResult<Option<UserCredentials>>;
}

/// Content metadata and its similarity index, kept behind one contract so that
/// an item and its chunks are always written and removed together.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Stores the item and all of its chunks atomically.
    async fn insert_content(&self, item: ContentItem, chunks: Vec<ContentChunk>) -> PortResult<()>;

    async fn get_content(&self, content_id: Uuid) -> PortResult<Option<ContentItem>>;

    /// All items of one owner, oldest first.
    async fn list_content(&self, owner_id: Uuid) -> PortResult<Vec<ContentItem>>;

    /// Removes the item and every chunk tagged with its id atomically.
    /// Returns the number of chunks removed, or `NotFound` if the item does not exist.
    async fn delete_content(&self, content_id: Uuid) -> PortResult<usize>;

    /// Number of index entries currently tagged with `content_id`.
    async fn count_chunks(&self, content_id: Uuid) -> PortResult<usize>;

    /// Scores every chunk owned by `owner_id` against `query` (cosine similarity)
    /// and returns at most `limit` candidates. Callers must not rely on the order.
    async fn search_chunks(
        &self,
        owner_id: Uuid,
        query: &[f32],
        limit: usize,
    ) -> PortResult<Vec<ScoredPassage>>;
}

//=========================================================================================
// External Service Ports
//=========================================================================================

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embeds each input text, preserving order.
    async fn embed(&self, texts: &[String]) -> PortResult<Vec<Vec<f32>>>;
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Produces a completion for a single prompt.
    async fn generate(&self, prompt: &str) -> PortResult<String>;
}

#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Extracts plain text from the raw bytes of a document of the given format.
    async fn extract(&self, format: DocumentFormat, data: bytes::Bytes) -> PortResult<String>;
}

#[async_trait]
pub trait WebScraper: Send + Sync {
    /// Fetches `url` and returns its main textual content.
    /// `Unavailable` means the fetch failed; `Unsupported` means nothing usable was found.
    async fn scrape(&self, url: &str) -> PortResult<ScrapedPage>;
}

//=========================================================================================
// Security Ports
//=========================================================================================

pub trait PasswordHasher: Send + Sync {
    /// Produces a salted, self-describing hash of `password`.
    fn hash(&self, password: &str) -> PortResult<String>;

    /// Checks `password` against a stored hash in constant time.
    fn verify(&self, password: &str, password_hash: &str) -> PortResult<bool>;
}

pub trait TokenService: Send + Sync {
    fn issue_at(&self, user_id: Uuid, now: DateTime<Utc>) -> PortResult<IssuedToken>;

    fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Uuid, TokenError>;

    fn issue(&self, user_id: Uuid) -> PortResult<IssuedToken> {
        self.issue_at(user_id, Utc::now())
    }

    fn validate(&self, token: &str) -> Result<Uuid, TokenError> {
        self.validate_at(token, Utc::now())
    }
}
