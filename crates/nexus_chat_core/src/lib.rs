pub mod accounts;
pub mod chunking;
pub mod domain;
pub mod errors;
pub mod formats;
pub mod ingestion;
pub mod ports;
pub mod retrieval;
pub mod session;

#[cfg(test)]
mod testing;

pub use accounts::{CredentialStore, SessionTokenIssuer};
pub use domain::{
    ChatReply, ContentChunk, ContentItem, ContentKind, ContentMetadata, FileUpload, IssuedToken,
    ReplySource, ScoredPassage, ScrapedPage, SourceRef, User, UserCredentials,
};
pub use errors::{
    AuthError, ContentAccessError, IngestionError, NotFoundError, RetrievalError, TokenError,
};
pub use formats::DocumentFormat;
pub use ingestion::{IngestionGateway, IngestionSettings};
pub use ports::{
    ContentRepository, DocumentExtractor, EmbeddingService, GenerativeModel, PasswordHasher,
    PortError, PortResult, TokenService, UserRepository, WebScraper,
};
pub use retrieval::{RetrievalCoordinator, RetrievalSettings};
pub use session::{
    AuthEvent, AuthState, ChatBackend, ChatMessage, ChatMode, ChatSession, Role, SendState,
    SessionError, SessionStorage, SessionUser, StoredSession,
};
