//! services/api/src/adapters/embeddings.rs
//!
//! Implementations of the `EmbeddingService` port: the hosted embeddings
//! endpoint, and a local feature-hashing embedder that needs no credentials.

use async_openai::{
    config::OpenAIConfig,
    types::embeddings::{CreateEmbeddingRequestArgs, EmbeddingInput},
    Client,
};
use async_trait::async_trait;
use nexus_chat_core::ports::{EmbeddingService, PortError, PortResult};
use tracing::{debug, error};

use super::llm::map_openai_error;

//=========================================================================================
// Hosted embeddings
//=========================================================================================

#[derive(Clone)]
pub struct OpenAiEmbeddingAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbeddingAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl EmbeddingService for OpenAiEmbeddingAdapter {
    async fn embed(&self, texts: &[String]) -> PortResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::StringArray(texts.to_vec()))
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self.client.embeddings().create(request).await.map_err(|e| {
            error!("Embedding request failed: {e}");
            map_openai_error(e)
        })?;

        let mut data = response.data;
        if data.len() != texts.len() {
            return Err(PortError::Unexpected(format!(
                "expected {} embeddings, received {}",
                texts.len(),
                data.len()
            )));
        }
        data.sort_by_key(|embedding| embedding.index);
        debug!("Embedded {} texts with {}", texts.len(), self.model);
        Ok(data.into_iter().map(|embedding| embedding.embedding).collect())
    }
}

//=========================================================================================
// Feature hashing
//=========================================================================================

pub const DEFAULT_HASHING_DIMENSIONS: usize = 384;

/// Maps each lowercase word onto one of `dimensions` buckets through its MD5
/// digest and L2-normalises the counts. Texts sharing words score higher.
#[derive(Clone, Debug)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMENSIONS)
    }
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            let digest = md5::compute(word.to_lowercase().as_bytes());
            let bucket = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize
                % self.dimensions;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingService for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> PortResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::llm::openai_client;
    use crate::adapters::vector::cosine_similarity;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn hashing_is_deterministic_normalised_and_case_insensitive() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed_one("The sky is blue");
        let b = embedder.embed_one("the SKY is BLUE!");
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_HASHING_DIMENSIONS);

        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(embedder.embed_one("   ").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn shared_words_make_texts_similar() {
        let embedder = HashingEmbedder::default();
        let doc = embedder.embed_one("The sky is blue");
        let query = embedder.embed_one("what color is the sky?");
        assert!(cosine_similarity(&doc, &query) > 0.5);
    }

    #[tokio::test]
    async fn hosted_embeddings_are_returned_in_input_order() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/embeddings");
                then.status(200).json_body(json!({
                    "object": "list",
                    "model": "text-embedding-004",
                    "data": [
                        { "index": 1, "object": "embedding", "embedding": [0.0, 1.0] },
                        { "index": 0, "object": "embedding", "embedding": [1.0, 0.0] }
                    ],
                    "usage": { "prompt_tokens": 4, "total_tokens": 4 }
                }));
            })
            .await;

        let client = openai_client("k", Some(&server.url("/v1")), Duration::from_secs(5)).unwrap();
        let adapter = OpenAiEmbeddingAdapter::new(client, "text-embedding-004".to_string());
        let vectors = adapter
            .embed(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }
}
