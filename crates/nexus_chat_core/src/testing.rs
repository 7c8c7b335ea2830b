//! In-memory fakes of the core ports, shared by the unit tests of this crate.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    ContentChunk, ContentItem, IssuedToken, ScoredPassage, ScrapedPage, User, UserCredentials,
};
use crate::errors::TokenError;
use crate::formats::DocumentFormat;
use crate::ports::{
    ContentRepository, DocumentExtractor, EmbeddingService, GenerativeModel, PasswordHasher,
    PortError, PortResult, TokenService, UserRepository, WebScraper,
};

//=========================================================================================
// Accounts
//=========================================================================================

#[derive(Default)]
pub struct InMemoryUsers {
    users: Mutex<Vec<UserCredentials>>,
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn insert_user(&self, credentials: UserCredentials) -> PortResult<User> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.user.email == credentials.user.email) {
            return Err(PortError::Conflict(credentials.user.email));
        }
        let user = credentials.user.clone();
        users.push(credentials);
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> PortResult<Option<UserCredentials>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.user.email == email).cloned())
    }
}

pub struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash(&self, password: &str) -> PortResult<String> {
        Ok(format!("plain${password}"))
    }

    fn verify(&self, password: &str, password_hash: &str) -> PortResult<bool> {
        Ok(password_hash.strip_prefix("plain$") == Some(password))
    }
}

/// Tokens of the form `tok:<user id>:<expiry timestamp>`, valid for one hour.
pub struct FakeTokens;

impl TokenService for FakeTokens {
    fn issue_at(&self, user_id: Uuid, now: DateTime<Utc>) -> PortResult<IssuedToken> {
        let expires_at = now + chrono::Duration::hours(1);
        Ok(IssuedToken {
            token: format!("tok:{user_id}:{}", expires_at.timestamp()),
            subject: user_id,
            issued_at: now,
            expires_at,
        })
    }

    fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Uuid, TokenError> {
        let mut parts = token.split(':');
        let (Some("tok"), Some(id), Some(exp), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed(token.to_string()));
        };
        let id = Uuid::parse_str(id).map_err(|e| TokenError::Malformed(e.to_string()))?;
        let exp: i64 = exp.parse().map_err(|_| TokenError::BadSignature)?;
        if now.timestamp() >= exp {
            return Err(TokenError::Expired);
        }
        Ok(id)
    }
}

//=========================================================================================
// Content
//=========================================================================================

#[derive(Default)]
struct ContentState {
    items: Vec<ContentItem>,
    chunks: Vec<ContentChunk>,
}

#[derive(Default)]
pub struct InMemoryContent {
    state: Mutex<ContentState>,
}

#[async_trait]
impl ContentRepository for InMemoryContent {
    async fn insert_content(&self, item: ContentItem, chunks: Vec<ContentChunk>) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        state.items.push(item);
        state.chunks.extend(chunks);
        Ok(())
    }

    async fn get_content(&self, content_id: Uuid) -> PortResult<Option<ContentItem>> {
        let state = self.state.lock().unwrap();
        Ok(state.items.iter().find(|i| i.id == content_id).cloned())
    }

    async fn list_content(&self, owner_id: Uuid) -> PortResult<Vec<ContentItem>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .items
            .iter()
            .filter(|i| i.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn delete_content(&self, content_id: Uuid) -> PortResult<usize> {
        let mut state = self.state.lock().unwrap();
        let before = state.items.len();
        state.items.retain(|i| i.id != content_id);
        if state.items.len() == before {
            return Err(PortError::NotFound(content_id.to_string()));
        }
        let chunks_before = state.chunks.len();
        state.chunks.retain(|c| c.content_id != content_id);
        Ok(chunks_before - state.chunks.len())
    }

    async fn count_chunks(&self, content_id: Uuid) -> PortResult<usize> {
        let state = self.state.lock().unwrap();
        Ok(state
            .chunks
            .iter()
            .filter(|c| c.content_id == content_id)
            .count())
    }

    async fn search_chunks(
        &self,
        owner_id: Uuid,
        query: &[f32],
        limit: usize,
    ) -> PortResult<Vec<ScoredPassage>> {
        let state = self.state.lock().unwrap();
        let mut scored: Vec<ScoredPassage> = state
            .chunks
            .iter()
            .filter(|c| c.owner_id == owner_id)
            .filter_map(|c| {
                let item = state.items.iter().find(|i| i.id == c.content_id)?;
                Some(ScoredPassage {
                    content_id: c.content_id,
                    chunk_index: c.chunk_index,
                    text: c.text.clone(),
                    score: cosine(query, &c.embedding),
                    source: item.source_label(),
                    kind: item.kind,
                    ingested_at: item.created_at,
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        // Hand candidates back in reverse so callers cannot lean on the order.
        scored.reverse();
        Ok(scored)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// Bag-of-words embedder: every distinct lowercase word gets its own dimension,
/// so similarity is exactly word overlap.
#[derive(Default)]
pub struct WordEmbedder {
    vocabulary: Mutex<HashMap<String, usize>>,
}

const WORD_DIMENSIONS: usize = 512;

#[async_trait]
impl EmbeddingService for WordEmbedder {
    async fn embed(&self, texts: &[String]) -> PortResult<Vec<Vec<f32>>> {
        let mut vocabulary = self.vocabulary.lock().unwrap();
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0; WORD_DIMENSIONS];
                for word in text
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                {
                    let next = vocabulary.len();
                    let slot = *vocabulary.entry(word.to_lowercase()).or_insert(next);
                    vector[slot % WORD_DIMENSIONS] += 1.0;
                }
                vector
            })
            .collect())
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingService for FailingEmbedder {
    async fn embed(&self, _texts: &[String]) -> PortResult<Vec<Vec<f32>>> {
        Err(PortError::Unavailable("embedding service is down".to_string()))
    }
}

/// Treats every document as UTF-8 text.
pub struct FakeExtractor;

#[async_trait]
impl DocumentExtractor for FakeExtractor {
    async fn extract(&self, _format: DocumentFormat, data: bytes::Bytes) -> PortResult<String> {
        Ok(String::from_utf8_lossy(&data).into_owned())
    }
}

pub struct FakeScraper {
    outcome: PortResult<String>,
}

impl Default for FakeScraper {
    fn default() -> Self {
        Self::failing()
    }
}

impl FakeScraper {
    pub fn failing() -> Self {
        Self {
            outcome: Err(PortError::Unavailable("connection refused".to_string())),
        }
    }

    pub fn with_text(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_string()),
        }
    }
}

#[async_trait]
impl WebScraper for FakeScraper {
    async fn scrape(&self, url: &str) -> PortResult<ScrapedPage> {
        let text = self.outcome.clone()?;
        Ok(ScrapedPage {
            url: url.to_string(),
            title: "Fake page".to_string(),
            text,
        })
    }
}

//=========================================================================================
// Model
//=========================================================================================

/// Replies with a fixed answer (or fails) and records every prompt it was given.
pub struct ScriptedModel {
    reply: PortResult<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: Err(PortError::Unavailable("request timed out".to_string())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(&self, prompt: &str) -> PortResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone()
    }
}

pub fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).single().unwrap()
}
