//! crates/nexus_chat_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

//=========================================================================================
// Users
//=========================================================================================

/// Represents a registered user - used throughout the app.
/// Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

// Only used internally for registration/login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

//=========================================================================================
// Session tokens
//=========================================================================================

/// A signed bearer credential handed to the client after login, register or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub subject: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// Content
//=========================================================================================

/// Where a content item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    File,
    Url,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::File => "file",
            ContentKind::Url => "url",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "file" => Some(ContentKind::File),
            "url" => Some(ContentKind::Url),
            _ => None,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive metadata recorded for a content item at ingestion time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentMetadata {
    /// Original file name for uploads.
    pub filename: Option<String>,
    /// Source address for scraped pages.
    pub url: Option<String>,
    pub title: Option<String>,
    pub size_bytes: u64,
    pub text_length: usize,
    pub chunk_count: usize,
}

/// One unit of ingested material (a file or a URL), owned by a single user.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentItem {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: ContentKind,
    pub metadata: ContentMetadata,
    pub created_at: DateTime<Utc>,
}

impl ContentItem {
    /// The identifier shown to users when this item is cited as a source.
    pub fn source_label(&self) -> String {
        match self.kind {
            ContentKind::File => self
                .metadata
                .filename
                .clone()
                .unwrap_or_else(|| self.id.to_string()),
            ContentKind::Url => self
                .metadata
                .url
                .clone()
                .unwrap_or_else(|| self.id.to_string()),
        }
    }
}

/// One vector-index entry: a window of a content item's text plus its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentChunk {
    pub content_id: Uuid,
    pub owner_id: Uuid,
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A chunk returned by a similarity query, with everything needed to rank and cite it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPassage {
    pub content_id: Uuid,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
    pub source: String,
    pub kind: ContentKind,
    pub ingested_at: DateTime<Utc>,
}

/// A file as received from an upload, before validation.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub data: bytes::Bytes,
}

/// The main textual content of a fetched web page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScrapedPage {
    pub url: String,
    pub title: String,
    pub text: String,
}

//=========================================================================================
// Chat replies
//=========================================================================================

/// Which path produced a chat reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    General,
    Documents,
}

impl ReplySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplySource::General => "general",
            ReplySource::Documents => "documents",
        }
    }
}

/// A citation attached to a document-grounded reply.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRef {
    pub source: String,
    pub content_type: ContentKind,
    pub relevance_score: f32,
}

/// The result of one chat request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub response: String,
    pub source: ReplySource,
    pub sources: Vec<SourceRef>,
}

impl ChatReply {
    pub fn general(response: String) -> Self {
        Self {
            response,
            source: ReplySource::General,
            sources: Vec::new(),
        }
    }
}
