//! crates/nexus_chat_core/src/retrieval.rs
//!
//! The retrieval coordinator answers chat messages, either directly from the
//! language model or grounded in the caller's indexed content.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::domain::{ChatReply, ReplySource, ScoredPassage, SourceRef};
use crate::errors::RetrievalError;
use crate::ports::{ContentRepository, EmbeddingService, GenerativeModel, PortError};

#[derive(Debug, Clone, Copy)]
pub struct RetrievalSettings {
    pub top_k: usize,
    /// Passages scoring below this are never used as context.
    pub relevance_threshold: f32,
    /// Upper bound on the characters of passage text placed in a prompt.
    pub max_context_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            relevance_threshold: 0.2,
            max_context_chars: 2000,
        }
    }
}

#[derive(Clone)]
pub struct RetrievalCoordinator {
    content: Arc<dyn ContentRepository>,
    embedder: Arc<dyn EmbeddingService>,
    model: Arc<dyn GenerativeModel>,
    settings: RetrievalSettings,
}

impl RetrievalCoordinator {
    pub fn new(
        content: Arc<dyn ContentRepository>,
        embedder: Arc<dyn EmbeddingService>,
        model: Arc<dyn GenerativeModel>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            content,
            embedder,
            model,
            settings,
        }
    }

    #[instrument(skip(self, message))]
    pub async fn general_chat(&self, message: &str) -> Result<ChatReply, RetrievalError> {
        let prompt = general_prompt(message);
        let response = self.ask(&prompt).await?;
        Ok(ChatReply::general(response))
    }

    /// Answers from the owner's content when something relevant is indexed,
    /// otherwise falls back to a general answer.
    #[instrument(skip(self, message))]
    pub async fn document_chat(
        &self,
        owner_id: Uuid,
        message: &str,
    ) -> Result<ChatReply, RetrievalError> {
        let passages = self.top_passages(owner_id, message).await?;
        if passages.is_empty() {
            info!("No relevant passages for user {owner_id}, answering without documents");
            return self.general_chat(message).await;
        }

        let context = select_context(&passages, self.settings.max_context_chars);
        let prompt = grounded_prompt(context, message);
        let response = self.ask(&prompt).await?;

        Ok(ChatReply {
            response,
            source: ReplySource::Documents,
            sources: cite_sources(context),
        })
    }

    /// The relevant passages for `query`, best first, at most `top_k` of them.
    pub async fn top_passages(
        &self,
        owner_id: Uuid,
        query: &str,
    ) -> Result<Vec<ScoredPassage>, RetrievalError> {
        let mut vectors = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .map_err(upstream)?;
        let query_vector = vectors.pop().ok_or_else(|| {
            RetrievalError::Port(PortError::Unexpected(
                "embedding service returned no vector".to_string(),
            ))
        })?;

        let candidates = self
            .content
            .search_chunks(owner_id, &query_vector, self.settings.top_k)
            .await?;

        let mut ranked: Vec<ScoredPassage> = candidates
            .into_iter()
            .filter(|p| p.score >= self.settings.relevance_threshold)
            .collect();
        rank_passages(&mut ranked);
        ranked.truncate(self.settings.top_k);
        Ok(ranked)
    }

    async fn ask(&self, prompt: &str) -> Result<String, RetrievalError> {
        self.model.generate(prompt).await.map_err(|e| {
            error!("Language model call failed: {e}");
            RetrievalError::UpstreamUnavailable(e.to_string())
        })
    }
}

fn upstream(err: PortError) -> RetrievalError {
    match err {
        PortError::Unavailable(reason) => RetrievalError::UpstreamUnavailable(reason),
        other => RetrievalError::Port(other),
    }
}

/// Sorts by score descending; ties go to the earliest ingested item, then
/// content id, then chunk index.
pub fn rank_passages(passages: &mut [ScoredPassage]) {
    passages.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.ingested_at.cmp(&b.ingested_at))
            .then_with(|| a.content_id.cmp(&b.content_id))
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
    });
}

/// The leading passages whose combined text fits in `budget` characters.
/// The best passage is always included.
fn select_context(passages: &[ScoredPassage], budget: usize) -> &[ScoredPassage] {
    let mut used = 0;
    let mut count = 0;
    for passage in passages {
        let len = passage.text.chars().count();
        if count > 0 && used + len > budget {
            break;
        }
        used += len;
        count += 1;
    }
    &passages[..count]
}

fn cite_sources(passages: &[ScoredPassage]) -> Vec<SourceRef> {
    let mut seen = HashSet::new();
    passages
        .iter()
        .filter(|p| seen.insert(p.content_id))
        .map(|p| SourceRef {
            source: p.source.clone(),
            content_type: p.kind,
            relevance_score: p.score,
        })
        .collect()
}

fn general_prompt(message: &str) -> String {
    format!(
        "You are a helpful assistant. Answer the user's message clearly and concisely.\n\n\
         User: {message}"
    )
}

fn grounded_prompt(passages: &[ScoredPassage], message: &str) -> String {
    let context = passages
        .iter()
        .map(|p| format!("[Source: {}]\n{}", p.source, p.text))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "You are a helpful assistant that answers questions using the provided context \
         from the user's documents. If the context does not contain the answer, say so \
         and answer from general knowledge.\n\n\
         Context:\n{context}\n\n\
         Question: {message}\n\nAnswer:"
    )
}
