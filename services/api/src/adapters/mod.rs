pub mod db;
pub mod embeddings;
pub mod extract;
pub mod jwt;
pub mod llm;
pub mod memory;
pub mod password;
pub mod scraper;
pub mod vector;

pub use db::DbAdapter;
pub use embeddings::{HashingEmbedder, OpenAiEmbeddingAdapter};
pub use extract::FileTextExtractor;
pub use jwt::JwtTokens;
pub use llm::{openai_client, OpenAiChatAdapter};
pub use memory::MemoryStore;
pub use password::Argon2Hasher;
pub use scraper::HttpScraper;
