//! services/api/src/adapters/memory.rs
//!
//! A process-local store implementing the user and content repositories.
//! Used when no database is configured and by the integration tests.

use async_trait::async_trait;
use nexus_chat_core::domain::{ContentChunk, ContentItem, ScoredPassage, User, UserCredentials};
use nexus_chat_core::ports::{ContentRepository, PortError, PortResult, UserRepository};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::vector::{cosine_similarity, top_k};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, UserCredentials>,
    /// Content items in insertion order.
    items: Vec<ContentItem>,
    chunks: HashMap<Uuid, Vec<ContentChunk>>,
}

/// Metadata and chunks share one lock, so an item and its index entries are
/// always visible together.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert_user(&self, credentials: UserCredentials) -> PortResult<User> {
        let mut inner = self.inner.write().await;
        if inner
            .users
            .values()
            .any(|existing| existing.user.email == credentials.user.email)
        {
            return Err(PortError::Conflict(format!(
                "email {} is already registered",
                credentials.user.email
            )));
        }
        let user = credentials.user.clone();
        inner.users.insert(user.id, credentials);
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> PortResult<Option<UserCredentials>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|credentials| credentials.user.email == email)
            .cloned())
    }
}

#[async_trait]
impl ContentRepository for MemoryStore {
    async fn insert_content(&self, item: ContentItem, chunks: Vec<ContentChunk>) -> PortResult<()> {
        let mut inner = self.inner.write().await;
        if inner.items.iter().any(|existing| existing.id == item.id) {
            return Err(PortError::Conflict(format!("content {} already exists", item.id)));
        }
        inner.chunks.insert(item.id, chunks);
        inner.items.push(item);
        Ok(())
    }

    async fn get_content(&self, content_id: Uuid) -> PortResult<Option<ContentItem>> {
        let inner = self.inner.read().await;
        Ok(inner.items.iter().find(|item| item.id == content_id).cloned())
    }

    async fn list_content(&self, owner_id: Uuid) -> PortResult<Vec<ContentItem>> {
        let inner = self.inner.read().await;
        Ok(inner
            .items
            .iter()
            .filter(|item| item.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn delete_content(&self, content_id: Uuid) -> PortResult<usize> {
        let mut inner = self.inner.write().await;
        let position = inner
            .items
            .iter()
            .position(|item| item.id == content_id)
            .ok_or_else(|| PortError::NotFound(format!("content {content_id}")))?;
        inner.items.remove(position);
        Ok(inner
            .chunks
            .remove(&content_id)
            .map(|chunks| chunks.len())
            .unwrap_or(0))
    }

    async fn count_chunks(&self, content_id: Uuid) -> PortResult<usize> {
        let inner = self.inner.read().await;
        Ok(inner.chunks.get(&content_id).map(Vec::len).unwrap_or(0))
    }

    async fn search_chunks(
        &self,
        owner_id: Uuid,
        query: &[f32],
        limit: usize,
    ) -> PortResult<Vec<ScoredPassage>> {
        let inner = self.inner.read().await;
        let passages = inner
            .items
            .iter()
            .filter(|item| item.owner_id == owner_id)
            .flat_map(|item| {
                inner
                    .chunks
                    .get(&item.id)
                    .into_iter()
                    .flatten()
                    .map(move |chunk| ScoredPassage {
                        content_id: item.id,
                        chunk_index: chunk.chunk_index,
                        text: chunk.text.clone(),
                        score: cosine_similarity(query, &chunk.embedding),
                        source: item.source_label(),
                        kind: item.kind,
                        ingested_at: item.created_at,
                    })
            })
            .collect();
        Ok(top_k(passages, limit))
    }
}
