//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the PostgreSQL implementation of
//! the `UserRepository` and `ContentRepository` ports from the `core` crate.
//! Embeddings are stored as `REAL[]` and scored in process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nexus_chat_core::domain::{
    ContentChunk, ContentItem, ContentKind, ContentMetadata, ScoredPassage, User, UserCredentials,
};
use nexus_chat_core::ports::{ContentRepository, PortError, PortResult, UserRepository};
use sqlx::{FromRow, PgPool};
use tracing::error;
use uuid::Uuid;

use super::vector::{cosine_similarity, top_k};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    error!("Database error: {e}");
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl UserRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user: User {
                id: self.id,
                username: self.username,
                email: self.email,
                created_at: self.created_at,
            },
            password_hash: self.password_hash,
        }
    }
}

#[derive(FromRow)]
struct ContentRecord {
    id: Uuid,
    owner_id: Uuid,
    content_type: String,
    filename: Option<String>,
    url: Option<String>,
    title: Option<String>,
    size_bytes: i64,
    text_length: i64,
    chunk_count: i64,
    created_at: DateTime<Utc>,
}

impl ContentRecord {
    fn to_domain(self) -> PortResult<ContentItem> {
        let kind = ContentKind::parse(&self.content_type).ok_or_else(|| {
            PortError::Unexpected(format!("unknown content type '{}'", self.content_type))
        })?;
        Ok(ContentItem {
            id: self.id,
            owner_id: self.owner_id,
            kind,
            metadata: ContentMetadata {
                filename: self.filename,
                url: self.url,
                title: self.title,
                size_bytes: self.size_bytes.max(0) as u64,
                text_length: self.text_length.max(0) as usize,
                chunk_count: self.chunk_count.max(0) as usize,
            },
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct ChunkRecord {
    content_id: Uuid,
    chunk_index: i32,
    text: String,
    embedding: Vec<f32>,
}

const CONTENT_COLUMNS: &str = "id, owner_id, content_type, filename, url, title, \
     size_bytes, text_length, chunk_count, created_at";

//=========================================================================================
// `UserRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl UserRepository for DbAdapter {
    async fn insert_user(&self, credentials: UserCredentials) -> PortResult<User> {
        let user = &credentials.user;
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&credentials.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::Conflict(format!("email {} is already registered", user.email))
            }
            other => unexpected(other),
        })?;

        Ok(credentials.user)
    }

    async fn find_user_by_email(&self, email: &str) -> PortResult<Option<UserCredentials>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(UserRecord::to_domain))
    }
}

//=========================================================================================
// `ContentRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentRepository for DbAdapter {
    async fn insert_content(&self, item: ContentItem, chunks: Vec<ContentChunk>) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query(
            "INSERT INTO content_items (id, owner_id, content_type, filename, url, title, \
             size_bytes, text_length, chunk_count, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(item.id)
        .bind(item.owner_id)
        .bind(item.kind.as_str())
        .bind(&item.metadata.filename)
        .bind(&item.metadata.url)
        .bind(&item.metadata.title)
        .bind(item.metadata.size_bytes as i64)
        .bind(item.metadata.text_length as i64)
        .bind(item.metadata.chunk_count as i64)
        .bind(item.created_at)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        for chunk in &chunks {
            sqlx::query(
                "INSERT INTO content_chunks (content_id, owner_id, chunk_index, text, embedding) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(chunk.content_id)
            .bind(chunk.owner_id)
            .bind(chunk.chunk_index as i32)
            .bind(&chunk.text)
            .bind(&chunk.embedding)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)
    }

    async fn get_content(&self, content_id: Uuid) -> PortResult<Option<ContentItem>> {
        let record = sqlx::query_as::<_, ContentRecord>(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content_items WHERE id = $1"
        ))
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        record.map(ContentRecord::to_domain).transpose()
    }

    async fn list_content(&self, owner_id: Uuid) -> PortResult<Vec<ContentItem>> {
        let records = sqlx::query_as::<_, ContentRecord>(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content_items WHERE owner_id = $1 \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(ContentRecord::to_domain).collect()
    }

    async fn delete_content(&self, content_id: Uuid) -> PortResult<usize> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let removed = sqlx::query("DELETE FROM content_chunks WHERE content_id = $1")
            .bind(content_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?
            .rows_affected();

        let deleted = sqlx::query("DELETE FROM content_items WHERE id = $1")
            .bind(content_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await.map_err(unexpected)?;
            return Err(PortError::NotFound(format!("content {content_id}")));
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(removed as usize)
    }

    async fn count_chunks(&self, content_id: Uuid) -> PortResult<usize> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM content_chunks WHERE content_id = $1")
                .bind(content_id)
                .fetch_one(&self.pool)
                .await
                .map_err(unexpected)?;
        Ok(count as usize)
    }

    async fn search_chunks(
        &self,
        owner_id: Uuid,
        query: &[f32],
        limit: usize,
    ) -> PortResult<Vec<ScoredPassage>> {
        let items = self.list_content(owner_id).await?;
        let chunks = sqlx::query_as::<_, ChunkRecord>(
            "SELECT content_id, chunk_index, text, embedding FROM content_chunks \
             WHERE owner_id = $1",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let passages = chunks
            .into_iter()
            .filter_map(|chunk| {
                let item = items.iter().find(|item| item.id == chunk.content_id)?;
                Some(ScoredPassage {
                    content_id: chunk.content_id,
                    chunk_index: chunk.chunk_index.max(0) as usize,
                    score: cosine_similarity(query, &chunk.embedding),
                    text: chunk.text,
                    source: item.source_label(),
                    kind: item.kind,
                    ingested_at: item.created_at,
                })
            })
            .collect();

        Ok(top_k(passages, limit))
    }
}
