//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use nexus_chat_core::ingestion::IngestionSettings;
use nexus_chat_core::ports::{
    ContentRepository, DocumentExtractor, EmbeddingService, GenerativeModel, PasswordHasher,
    TokenService, UserRepository, WebScraper,
};
use nexus_chat_core::retrieval::RetrievalSettings;
use nexus_chat_core::{CredentialStore, IngestionGateway, RetrievalCoordinator, SessionTokenIssuer};
use std::sync::Arc;

//=========================================================================================
// Ports (the concrete adapters chosen at startup)
//=========================================================================================

/// Every outbound adapter the services need.
#[derive(Clone)]
pub struct Ports {
    pub users: Arc<dyn UserRepository>,
    pub content: Arc<dyn ContentRepository>,
    pub embedder: Arc<dyn EmbeddingService>,
    pub model: Arc<dyn GenerativeModel>,
    pub extractor: Arc<dyn DocumentExtractor>,
    pub scraper: Arc<dyn WebScraper>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub tokens: Arc<dyn TokenService>,
}

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub credentials: CredentialStore,
    pub tokens: SessionTokenIssuer,
    pub ingestion: IngestionGateway,
    pub retrieval: RetrievalCoordinator,
}

impl AppState {
    pub fn new(config: Arc<Config>, ports: Ports) -> Self {
        let ingestion_settings = IngestionSettings {
            max_upload_bytes: config.max_upload_bytes,
            ..IngestionSettings::default()
        };
        let retrieval_settings = RetrievalSettings {
            top_k: config.retrieval_top_k,
            relevance_threshold: config.relevance_threshold,
            max_context_chars: config.max_context_chars,
        };

        Self {
            credentials: CredentialStore::new(ports.users, ports.hasher),
            tokens: SessionTokenIssuer::new(ports.tokens),
            ingestion: IngestionGateway::new(
                ports.content.clone(),
                ports.embedder.clone(),
                ports.extractor,
                ports.scraper,
                ingestion_settings,
            ),
            retrieval: RetrievalCoordinator::new(
                ports.content,
                ports.embedder,
                ports.model,
                retrieval_settings,
            ),
            config,
        }
    }
}
