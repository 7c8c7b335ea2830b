//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        openai_client, Argon2Hasher, DbAdapter, FileTextExtractor, HashingEmbedder, HttpScraper,
        JwtTokens, MemoryStore, OpenAiChatAdapter, OpenAiEmbeddingAdapter,
    },
    config::{Config, ConfigError, EmbeddingBackend},
    error::ApiError,
    web::{
        self,
        state::{AppState, Ports},
    },
};
use nexus_chat_core::ports::{ContentRepository, EmbeddingService, UserRepository};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Choose the Store & Run Migrations ---
    let (users, content): (Arc<dyn UserRepository>, Arc<dyn ContentRepository>) =
        match &config.database_url {
            Some(database_url) => {
                info!("Connecting to database...");
                let db_pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(database_url)
                    .await?;
                let db_adapter = Arc::new(DbAdapter::new(db_pool));
                info!("Running database migrations...");
                db_adapter.run_migrations().await?;
                info!("Database migrations complete.");
                let users: Arc<dyn UserRepository> = db_adapter.clone();
                (users, db_adapter as Arc<dyn ContentRepository>)
            }
            None => {
                info!("DATABASE_URL not set, keeping all data in memory");
                let store = Arc::new(MemoryStore::new());
                let users: Arc<dyn UserRepository> = store.clone();
                (users, store as Arc<dyn ContentRepository>)
            }
        };

    // --- 3. Initialize Service Adapters ---
    let api_key = config
        .llm_api_key
        .as_deref()
        .ok_or_else(|| ConfigError::MissingVar("LLM_API_KEY".to_string()))?;
    let llm_client = openai_client(api_key, config.llm_api_base.as_deref(), config.llm_timeout)?;

    let model = Arc::new(OpenAiChatAdapter::new(
        llm_client.clone(),
        config.chat_model.clone(),
    ));
    let embedder: Arc<dyn EmbeddingService> = match config.embedding_backend {
        EmbeddingBackend::Api => Arc::new(OpenAiEmbeddingAdapter::new(
            llm_client,
            config.embedding_model.clone(),
        )),
        EmbeddingBackend::Hashing => Arc::new(HashingEmbedder::default()),
    };
    info!(
        "Chat model '{}', embedding backend {:?}",
        config.chat_model, config.embedding_backend
    );

    let token_ttl = chrono::Duration::from_std(config.token_ttl)
        .map_err(|e| ApiError::Internal(format!("Invalid token lifetime: {e}")))?;

    let ports = Ports {
        users,
        content,
        embedder,
        model,
        extractor: Arc::new(FileTextExtractor),
        scraper: Arc::new(HttpScraper::new(config.scrape_timeout)?),
        hasher: Arc::new(Argon2Hasher),
        tokens: Arc::new(JwtTokens::new(&config.jwt_secret, token_ttl)),
    };

    // --- 4. Build the Shared AppState & Router ---
    let app_state = Arc::new(AppState::new(config.clone(), ports));
    let app = web::router(app_state);

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
