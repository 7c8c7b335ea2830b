//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which implementation backs the embedding port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// The OpenAI-compatible embeddings endpoint.
    Api,
    /// Local feature hashing; needs no credentials.
    Hashing,
}

impl FromStr for EmbeddingBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "api" => Ok(EmbeddingBackend::Api),
            "hashing" => Ok(EmbeddingBackend::Hashing),
            other => Err(format!("'{other}' is not one of: api, hashing")),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// When absent the service keeps everything in memory.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub llm_api_key: Option<String>,
    pub llm_api_base: Option<String>,
    pub chat_model: String,
    pub embedding_backend: EmbeddingBackend,
    pub embedding_model: String,
    pub retrieval_top_k: usize,
    pub relevance_threshold: f32,
    pub max_context_chars: usize,
    pub max_upload_bytes: u64,
    pub llm_timeout: Duration,
    pub scrape_timeout: Duration,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Server and Database Settings ---
        let bind_address = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:8000".parse().ok())?;
        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Token Settings ---
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingVar("JWT_SECRET".to_string()))?;
        let ttl_hours: u64 = parse_or(&lookup, "TOKEN_TTL_HOURS", Some(24))?;

        // --- Language Model Settings (the first key present wins) ---
        let llm_api_key = ["LLM_API_KEY", "GEMINI_API_KEY", "OPENAI_API_KEY"]
            .into_iter()
            .find_map(|key| lookup(key).filter(|v| !v.is_empty()));
        let llm_api_base = lookup("LLM_API_BASE").filter(|v| !v.is_empty());
        let chat_model = lookup("CHAT_MODEL").unwrap_or_else(|| "gemini-1.5-flash".to_string());
        let embedding_backend = parse_or(
            &lookup,
            "EMBEDDING_BACKEND",
            Some(if llm_api_key.is_some() {
                EmbeddingBackend::Api
            } else {
                EmbeddingBackend::Hashing
            }),
        )?;
        let embedding_model =
            lookup("EMBEDDING_MODEL").unwrap_or_else(|| "text-embedding-004".to_string());

        // --- Retrieval and Ingestion Settings ---
        let retrieval_top_k = parse_or(&lookup, "RETRIEVAL_TOP_K", Some(5))?;
        let relevance_threshold = parse_or(&lookup, "RELEVANCE_THRESHOLD", Some(0.2))?;
        let max_context_chars = parse_or(&lookup, "MAX_CONTEXT_CHARS", Some(2000))?;
        let max_upload_bytes = parse_or(&lookup, "MAX_UPLOAD_BYTES", Some(10 * 1024 * 1024))?;
        let llm_timeout_secs: u64 = parse_or(&lookup, "LLM_TIMEOUT_SECS", Some(60))?;
        let scrape_timeout_secs: u64 = parse_or(&lookup, "SCRAPE_TIMEOUT_SECS", Some(30))?;
        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        if retrieval_top_k == 0 {
            return Err(ConfigError::InvalidValue(
                "RETRIEVAL_TOP_K".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        if embedding_backend == EmbeddingBackend::Api && llm_api_key.is_none() {
            return Err(ConfigError::MissingVar("LLM_API_KEY".to_string()));
        }

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            jwt_secret,
            token_ttl: Duration::from_secs(ttl_hours * 3600),
            llm_api_key,
            llm_api_base,
            chat_model,
            embedding_backend,
            embedding_model,
            retrieval_top_k,
            relevance_threshold,
            max_context_chars,
            max_upload_bytes,
            llm_timeout: Duration::from_secs(llm_timeout_secs),
            scrape_timeout: Duration::from_secs(scrape_timeout_secs),
            cors_origin,
        })
    }
}

/// Parses `key` if set, otherwise falls back to `default` (`None` means required).
fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Option<T>,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => default.ok_or_else(|| ConfigError::MissingVar(key.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_secret_is_set() {
        let config = load(&[("JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.bind_address.port(), 8000);
        assert!(config.database_url.is_none());
        assert_eq!(config.token_ttl, Duration::from_secs(24 * 3600));
        assert_eq!(config.embedding_backend, EmbeddingBackend::Hashing);
        assert_eq!(config.retrieval_top_k, 5);
        assert_eq!(config.relevance_threshold, 0.2);
        assert_eq!(config.max_context_chars, 2000);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.chat_model, "gemini-1.5-flash");
    }

    #[test]
    fn secret_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(var)) if var == "JWT_SECRET"));
    }

    #[test]
    fn invalid_numbers_are_reported_by_name() {
        let err = load(&[("JWT_SECRET", "x"), ("RETRIEVAL_TOP_K", "many")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "RETRIEVAL_TOP_K"));
    }

    #[test]
    fn api_key_fallbacks_and_backend_choice() {
        let config = load(&[("JWT_SECRET", "x"), ("GEMINI_API_KEY", "g-key")]).unwrap();
        assert_eq!(config.llm_api_key.as_deref(), Some("g-key"));
        assert_eq!(config.embedding_backend, EmbeddingBackend::Api);

        let err = load(&[("JWT_SECRET", "x"), ("EMBEDDING_BACKEND", "api")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(var) if var == "LLM_API_KEY"));
    }
}
