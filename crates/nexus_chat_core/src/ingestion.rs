//! crates/nexus_chat_core/src/ingestion.rs
//!
//! The content ingestion gateway: validates uploads and URLs, delegates text
//! extraction, then chunks, embeds and indexes the result under a fresh content id.

use chrono::Utc;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::chunking::{chunk_text, ChunkingOptions};
use crate::domain::{ContentChunk, ContentItem, ContentKind, ContentMetadata, FileUpload};
use crate::errors::{ContentAccessError, IngestionError, NotFoundError};
use crate::formats::{check_size, DocumentFormat, MAX_UPLOAD_BYTES};
use crate::ports::{ContentRepository, DocumentExtractor, EmbeddingService, PortError, WebScraper};

/// How many chunks are sent to the embedding service per request.
const EMBED_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct IngestionSettings {
    pub max_upload_bytes: u64,
    pub chunking: ChunkingOptions,
    /// Extracted text with fewer non-whitespace characters is rejected.
    pub min_text_chars: usize,
    /// Scraped pages with less text than this are rejected.
    pub min_page_chars: usize,
    /// Scraped text is cut to this many characters.
    pub max_page_chars: usize,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: MAX_UPLOAD_BYTES,
            chunking: ChunkingOptions::default(),
            min_text_chars: 10,
            min_page_chars: 100,
            max_page_chars: 10_000,
        }
    }
}

#[derive(Clone)]
pub struct IngestionGateway {
    content: Arc<dyn ContentRepository>,
    embedder: Arc<dyn EmbeddingService>,
    extractor: Arc<dyn DocumentExtractor>,
    scraper: Arc<dyn WebScraper>,
    settings: IngestionSettings,
}

impl IngestionGateway {
    pub fn new(
        content: Arc<dyn ContentRepository>,
        embedder: Arc<dyn EmbeddingService>,
        extractor: Arc<dyn DocumentExtractor>,
        scraper: Arc<dyn WebScraper>,
        settings: IngestionSettings,
    ) -> Self {
        Self {
            content,
            embedder,
            extractor,
            scraper,
            settings,
        }
    }

    #[instrument(skip(self, upload), fields(filename = %upload.filename, size = upload.data.len()))]
    pub async fn ingest_file(
        &self,
        owner_id: Uuid,
        upload: FileUpload,
    ) -> Result<ContentItem, IngestionError> {
        let format = DocumentFormat::from_filename(&upload.filename)?;
        let size_bytes = upload.data.len() as u64;
        check_size(size_bytes, self.settings.max_upload_bytes)?;

        let text = self
            .extractor
            .extract(format, upload.data)
            .await
            .map_err(|e| IngestionError::ExtractionFailed(port_message(e)))?;

        let title = upload
            .filename
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or_else(|| upload.filename.clone());

        let metadata = ContentMetadata {
            filename: Some(upload.filename),
            url: None,
            title: Some(title),
            size_bytes,
            ..ContentMetadata::default()
        };

        self.index(owner_id, ContentKind::File, metadata, &text).await
    }

    #[instrument(skip(self))]
    pub async fn ingest_url(
        &self,
        owner_id: Uuid,
        url: &str,
    ) -> Result<ContentItem, IngestionError> {
        let url = url.trim();
        validate_url(url)?;

        let page = self.scraper.scrape(url).await.map_err(|e| match e {
            PortError::Unsupported(reason) => IngestionError::UnsupportedContent(reason),
            other => IngestionError::FetchFailed(port_message(other)),
        })?;

        let text: String = page.text.chars().take(self.settings.max_page_chars).collect();
        if text.trim().chars().count() < self.settings.min_page_chars {
            warn!("Insufficient content extracted from {url}");
            return Err(IngestionError::UnsupportedContent(
                "insufficient content extracted from URL".to_string(),
            ));
        }

        let metadata = ContentMetadata {
            filename: None,
            url: Some(url.to_string()),
            title: Some(page.title),
            size_bytes: text.len() as u64,
            ..ContentMetadata::default()
        };

        self.index(owner_id, ContentKind::Url, metadata, &text).await
    }

    /// Removes an item and all of its index entries.
    #[instrument(skip(self))]
    pub async fn delete_content(
        &self,
        owner_id: Uuid,
        content_id: Uuid,
    ) -> Result<(), IngestionError> {
        let item = self
            .content
            .get_content(content_id)
            .await?
            .ok_or(NotFoundError::ContentNotFound(content_id))?;

        if item.owner_id != owner_id {
            warn!("User {owner_id} tried to delete content owned by {}", item.owner_id);
            return Err(ContentAccessError::NotOwner(content_id).into());
        }

        let removed = self
            .content
            .delete_content(content_id)
            .await
            .map_err(|e| match e {
                PortError::NotFound(_) => NotFoundError::ContentNotFound(content_id).into(),
                other => IngestionError::Port(other),
            })?;

        info!("Deleted content {content_id} and {removed} index entries");
        Ok(())
    }

    pub async fn list_content(&self, owner_id: Uuid) -> Result<Vec<ContentItem>, IngestionError> {
        Ok(self.content.list_content(owner_id).await?)
    }

    async fn index(
        &self,
        owner_id: Uuid,
        kind: ContentKind,
        mut metadata: ContentMetadata,
        text: &str,
    ) -> Result<ContentItem, IngestionError> {
        let meaningful = text.chars().filter(|c| !c.is_whitespace()).count();
        if meaningful < self.settings.min_text_chars {
            return Err(IngestionError::ExtractionFailed(
                "content is too short or empty".to_string(),
            ));
        }

        let pieces = chunk_text(text, self.settings.chunking);
        let embeddings = self.embed_all(&pieces).await?;
        if embeddings.len() != pieces.len() {
            return Err(IngestionError::Port(PortError::Unexpected(format!(
                "embedding service returned {} vectors for {} chunks",
                embeddings.len(),
                pieces.len()
            ))));
        }

        let content_id = Uuid::new_v4();
        metadata.text_length = text.chars().count();
        metadata.chunk_count = pieces.len();

        let chunks = pieces
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(chunk_index, (text, embedding))| ContentChunk {
                content_id,
                owner_id,
                chunk_index,
                text,
                embedding,
            })
            .collect();

        let item = ContentItem {
            id: content_id,
            owner_id,
            kind,
            metadata,
            created_at: Utc::now(),
        };

        self.content.insert_content(item.clone(), chunks).await?;
        info!(
            "Indexed {} '{}' as {} ({} chunks)",
            kind,
            item.source_label(),
            content_id,
            item.metadata.chunk_count
        );
        Ok(item)
    }

    async fn embed_all(&self, pieces: &[String]) -> Result<Vec<Vec<f32>>, IngestionError> {
        let batches = pieces
            .chunks(EMBED_BATCH_SIZE)
            .map(|batch| self.embedder.embed(batch));
        let embedded = try_join_all(batches).await?;
        Ok(embedded.into_iter().flatten().collect())
    }
}

fn validate_url(raw: &str) -> Result<(), IngestionError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| IngestionError::FetchFailed(format!("invalid URL '{raw}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(IngestionError::FetchFailed(format!(
            "invalid URL '{raw}': only absolute http(s) URLs are supported"
        )));
    }
    Ok(())
}

fn port_message(err: PortError) -> String {
    match err {
        PortError::NotFound(m)
        | PortError::Conflict(m)
        | PortError::Unavailable(m)
        | PortError::Unsupported(m)
        | PortError::Unexpected(m) => m,
    }
}
