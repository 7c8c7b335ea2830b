//! services/api/src/client/mod.rs
//!
//! The HTTP client side of the chat API: a typed `ApiClient` that also backs the
//! core `ChatSession`, and the JSON file that keeps a login across restarts.

pub mod http;
pub mod storage;

pub use http::{ApiClient, ClientError};
pub use storage::FileSessionStorage;
