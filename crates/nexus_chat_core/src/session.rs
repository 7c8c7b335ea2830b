//! crates/nexus_chat_core/src/session.rs
//!
//! Client-side chat session controller. Two explicit state machines live here:
//! the send cycle of a conversation (`Idle -> Sending -> AwaitingResponse -> Idle`)
//! and the authentication state (`Anonymous <-> Authenticated`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::task::Poll;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{ChatReply, SourceRef};
use crate::ports::{PortError, PortResult};

//=========================================================================================
// Client Ports
//=========================================================================================

/// The chat endpoints of the backend, as seen by a client.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn general(&self, message: &str) -> PortResult<ChatReply>;

    async fn documents(&self, token: &str, message: &str) -> PortResult<ChatReply>;
}

/// Durable storage for the signed-in user and their token.
pub trait SessionStorage: Send + Sync {
    fn load(&self) -> PortResult<Option<StoredSession>>;
    fn save(&self, session: &StoredSession) -> PortResult<()>;
    fn clear(&self) -> PortResult<()>;
}

//=========================================================================================
// Auth State Machine
//=========================================================================================

/// The user profile a client keeps while signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub token: String,
    pub user: SessionUser,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Anonymous,
    Authenticated { token: String, user: SessionUser },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    LoggedIn { token: String, user: SessionUser },
    Refreshed { token: String },
    LoggedOut,
}

impl AuthState {
    /// Applies `event`, rejecting transitions that make no sense from the current state.
    pub fn apply(self, event: AuthEvent) -> Result<AuthState, SessionError> {
        match (self, event) {
            (AuthState::Anonymous, AuthEvent::LoggedIn { token, user }) => {
                Ok(AuthState::Authenticated { token, user })
            }
            (AuthState::Authenticated { user, .. }, AuthEvent::Refreshed { token }) => {
                Ok(AuthState::Authenticated { token, user })
            }
            (AuthState::Authenticated { .. }, AuthEvent::LoggedOut) => Ok(AuthState::Anonymous),
            (state, event) => Err(SessionError::InvalidTransition {
                state: state.name(),
                event: event.name(),
            }),
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            AuthState::Authenticated { token, .. } => Some(token),
            AuthState::Anonymous => None,
        }
    }

    pub fn user(&self) -> Option<&SessionUser> {
        match self {
            AuthState::Authenticated { user, .. } => Some(user),
            AuthState::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated { .. })
    }

    fn name(&self) -> &'static str {
        match self {
            AuthState::Anonymous => "Anonymous",
            AuthState::Authenticated { .. } => "Authenticated",
        }
    }
}

impl AuthEvent {
    fn name(&self) -> &'static str {
        match self {
            AuthEvent::LoggedIn { .. } => "LoggedIn",
            AuthEvent::Refreshed { .. } => "Refreshed",
            AuthEvent::LoggedOut => "LoggedOut",
        }
    }
}

//=========================================================================================
// Conversation
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatMode {
    #[default]
    General,
    Documents,
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatMode::General => f.write_str("general"),
            ChatMode::Documents => f.write_str("documents"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Idle,
    Sending,
    AwaitingResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub sources: Vec<SourceRef>,
    pub timestamp: DateTime<Utc>,
    pub is_error: bool,
}

impl ChatMessage {
    fn new(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            sources: Vec::new(),
            timestamp: Utc::now(),
            is_error: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("A message is already being sent")]
    Busy,
    #[error("Message is empty")]
    EmptyMessage,
    #[error("You must be logged in to chat with your documents")]
    NotAuthenticated,
    #[error("Cannot apply {event} while {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
    #[error("Session storage failed: {0}")]
    Storage(#[from] PortError),
}

/// One conversation with the backend.
///
/// `submit` takes `&mut self` for the whole request, so replies are always
/// applied in the order the messages were sent.
pub struct ChatSession {
    backend: Arc<dyn ChatBackend>,
    storage: Arc<dyn SessionStorage>,
    auth: AuthState,
    mode: ChatMode,
    state: SendState,
    messages: Vec<ChatMessage>,
    notifications: Vec<String>,
}

impl ChatSession {
    /// Creates a session, restoring a previously stored login if there is one.
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<Self, SessionError> {
        let auth = match storage.load()? {
            Some(stored) => AuthState::Authenticated {
                token: stored.token,
                user: stored.user,
            },
            None => AuthState::Anonymous,
        };
        Ok(Self {
            backend,
            storage,
            auth,
            mode: ChatMode::General,
            state: SendState::Idle,
            messages: Vec::new(),
            notifications: Vec::new(),
        })
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn state(&self) -> SendState {
        self.state
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Drains the transient notifications raised since the last call.
    pub fn take_notifications(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notifications)
    }

    pub fn login(&mut self, token: String, user: SessionUser) -> Result<(), SessionError> {
        let stored = StoredSession {
            token: token.clone(),
            user: user.clone(),
        };
        self.transition(AuthEvent::LoggedIn { token, user })?;
        self.storage.save(&stored)?;
        info!("Logged in as {}", stored.user.username);
        Ok(())
    }

    pub fn refresh(&mut self, token: String) -> Result<(), SessionError> {
        self.transition(AuthEvent::Refreshed { token })?;
        if let AuthState::Authenticated { token, user } = &self.auth {
            self.storage.save(&StoredSession {
                token: token.clone(),
                user: user.clone(),
            })?;
        }
        Ok(())
    }

    /// Signs out, forgets the stored token and forces general mode.
    pub fn logout(&mut self) -> Result<(), SessionError> {
        self.transition(AuthEvent::LoggedOut)?;
        self.mode = ChatMode::General;
        self.storage.clear()?;
        Ok(())
    }

    pub fn set_mode(&mut self, mode: ChatMode) -> Result<(), SessionError> {
        if mode == ChatMode::Documents && !self.auth.is_authenticated() {
            return Err(SessionError::NotAuthenticated);
        }
        self.mode = mode;
        Ok(())
    }

    /// Sends `text` in the current mode and appends the reply (or the error) to the
    /// transcript. Backend failures do not fail the call; they become an error message.
    pub async fn submit(&mut self, text: &str) -> Result<&ChatMessage, SessionError> {
        if self.state != SendState::Idle {
            return Err(SessionError::Busy);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        let token = match self.mode {
            ChatMode::General => None,
            ChatMode::Documents => Some(
                self.auth
                    .token()
                    .ok_or(SessionError::NotAuthenticated)?
                    .to_string(),
            ),
        };

        self.messages
            .push(ChatMessage::new(Role::User, text.to_string()));
        self.state = SendState::Sending;

        let backend = Arc::clone(&self.backend);
        let mut request = std::pin::pin!(async {
            match &token {
                Some(token) => backend.documents(token, text).await,
                None => backend.general(text).await,
            }
        });
        // The first poll dispatches the request.
        let outcome = match futures::poll!(request.as_mut()) {
            Poll::Ready(outcome) => outcome,
            Poll::Pending => {
                self.state = SendState::AwaitingResponse;
                request.await
            }
        };

        let message = match outcome {
            Ok(reply) => {
                let mut message = ChatMessage::new(Role::Assistant, reply.response);
                message.sources = reply.sources;
                message
            }
            Err(e) => {
                warn!("Chat request failed: {e}");
                let mut message = ChatMessage::new(Role::Assistant, e.to_string());
                message.is_error = true;
                self.notifications.push(e.to_string());
                message
            }
        };
        self.messages.push(message);
        self.state = SendState::Idle;

        Ok(&self.messages[self.messages.len() - 1])
    }

    /// Returns to `Idle` after a `submit` future was dropped before completing.
    pub fn abort_pending(&mut self) {
        if self.state != SendState::Idle {
            warn!("Abandoning an unfinished chat request");
            self.state = SendState::Idle;
        }
    }

    fn transition(&mut self, event: AuthEvent) -> Result<(), SessionError> {
        let current = std::mem::take(&mut self.auth);
        match current.clone().apply(event) {
            Ok(next) => {
                self.auth = next;
                Ok(())
            }
            Err(e) => {
                self.auth = current;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContentKind, ReplySource};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBackend {
        calls: Mutex<Vec<(Option<String>, String)>>,
        fail: bool,
        stall: bool,
    }

    #[async_trait]
    impl ChatBackend for RecordingBackend {
        async fn general(&self, message: &str) -> PortResult<ChatReply> {
            self.calls
                .lock()
                .unwrap()
                .push((None, message.to_string()));
            if self.stall {
                futures::future::pending::<()>().await;
            }
            if self.fail {
                return Err(PortError::Unavailable("model timed out".to_string()));
            }
            Ok(ChatReply::general(format!("echo: {message}")))
        }

        async fn documents(&self, token: &str, message: &str) -> PortResult<ChatReply> {
            self.calls
                .lock()
                .unwrap()
                .push((Some(token.to_string()), message.to_string()));
            Ok(ChatReply {
                response: "from docs".to_string(),
                source: ReplySource::Documents,
                sources: vec![SourceRef {
                    source: "notes.txt".to_string(),
                    content_type: ContentKind::File,
                    relevance_score: 0.8,
                }],
            })
        }
    }

    #[derive(Default)]
    struct MemoryStorage {
        session: Mutex<Option<StoredSession>>,
    }

    impl SessionStorage for MemoryStorage {
        fn load(&self) -> PortResult<Option<StoredSession>> {
            Ok(self.session.lock().unwrap().clone())
        }

        fn save(&self, session: &StoredSession) -> PortResult<()> {
            *self.session.lock().unwrap() = Some(session.clone());
            Ok(())
        }

        fn clear(&self) -> PortResult<()> {
            *self.session.lock().unwrap() = None;
            Ok(())
        }
    }

    fn alice() -> SessionUser {
        SessionUser {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
        }
    }

    #[test]
    fn auth_transitions() {
        let user = alice();
        let state = AuthState::Anonymous
            .apply(AuthEvent::LoggedIn {
                token: "t1".to_string(),
                user: user.clone(),
            })
            .unwrap();
        let state = state
            .apply(AuthEvent::Refreshed {
                token: "t2".to_string(),
            })
            .unwrap();
        assert_eq!(state.token(), Some("t2"));
        assert_eq!(state.user(), Some(&user));

        assert!(matches!(
            state.clone().apply(AuthEvent::LoggedIn {
                token: "t3".to_string(),
                user,
            }),
            Err(SessionError::InvalidTransition { .. })
        ));

        let state = state.apply(AuthEvent::LoggedOut).unwrap();
        assert_eq!(state, AuthState::Anonymous);
        assert!(matches!(
            state.apply(AuthEvent::Refreshed {
                token: "t4".to_string()
            }),
            Err(SessionError::InvalidTransition {
                state: "Anonymous",
                event: "Refreshed"
            })
        ));
    }

    #[tokio::test]
    async fn general_submit_appends_user_and_ai_messages() {
        let backend = Arc::new(RecordingBackend::default());
        let mut session =
            ChatSession::new(backend.clone(), Arc::new(MemoryStorage::default())).unwrap();

        let reply = session.submit("  What is 2+2?  ").await.unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.content, "echo: What is 2+2?");
        assert!(!reply.is_error);

        assert_eq!(session.state(), SendState::Idle);
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[0].role, Role::User);
        assert_eq!(
            *backend.calls.lock().unwrap(),
            vec![(None, "What is 2+2?".to_string())]
        );
    }

    #[tokio::test]
    async fn failed_send_becomes_error_message_and_notification() {
        let backend = Arc::new(RecordingBackend {
            fail: true,
            ..RecordingBackend::default()
        });
        let mut session = ChatSession::new(backend, Arc::new(MemoryStorage::default())).unwrap();

        let reply = session.submit("hello").await.unwrap();
        assert!(reply.is_error);
        assert!(reply.content.contains("model timed out"));
        assert_eq!(session.state(), SendState::Idle);
        assert_eq!(session.take_notifications().len(), 1);
        assert!(session.take_notifications().is_empty());
    }

    #[tokio::test]
    async fn documents_mode_requires_login_and_logout_forces_general() {
        let backend = Arc::new(RecordingBackend::default());
        let storage = Arc::new(MemoryStorage::default());
        let mut session = ChatSession::new(backend.clone(), storage.clone()).unwrap();

        assert!(matches!(
            session.set_mode(ChatMode::Documents),
            Err(SessionError::NotAuthenticated)
        ));

        session.login("token-1".to_string(), alice()).unwrap();
        assert!(storage.load().unwrap().is_some());
        session.set_mode(ChatMode::Documents).unwrap();

        let reply = session.submit("what color is the sky?").await.unwrap();
        assert_eq!(reply.sources.len(), 1);
        assert_eq!(
            backend.calls.lock().unwrap()[0].0.as_deref(),
            Some("token-1")
        );

        session.logout().unwrap();
        assert_eq!(session.mode(), ChatMode::General);
        assert!(storage.load().unwrap().is_none());
        assert!(matches!(session.logout(), Err(SessionError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn stored_login_is_restored() {
        let storage = Arc::new(MemoryStorage::default());
        storage
            .save(&StoredSession {
                token: "persisted".to_string(),
                user: alice(),
            })
            .unwrap();

        let mut session =
            ChatSession::new(Arc::new(RecordingBackend::default()), storage.clone()).unwrap();
        assert_eq!(session.auth().token(), Some("persisted"));

        session.refresh("fresh".to_string()).unwrap();
        assert_eq!(storage.load().unwrap().unwrap().token, "fresh");
    }

    #[tokio::test]
    async fn busy_and_empty_messages_are_rejected() {
        let mut session = ChatSession::new(
            Arc::new(RecordingBackend::default()),
            Arc::new(MemoryStorage::default()),
        )
        .unwrap();

        assert!(matches!(session.submit("   ").await, Err(SessionError::EmptyMessage)));

        session.state = SendState::AwaitingResponse;
        assert!(matches!(session.submit("hi").await, Err(SessionError::Busy)));
        session.abort_pending();
        assert!(session.submit("hi").await.is_ok());
    }

    #[tokio::test]
    async fn dropped_send_waits_for_the_reply_until_aborted() {
        let backend = Arc::new(RecordingBackend {
            stall: true,
            ..RecordingBackend::default()
        });
        let mut session =
            ChatSession::new(backend.clone(), Arc::new(MemoryStorage::default())).unwrap();

        {
            let mut send = std::pin::pin!(session.submit("hello"));
            assert!(futures::poll!(send.as_mut()).is_pending());
        }

        assert_eq!(session.state(), SendState::AwaitingResponse);
        assert_eq!(backend.calls.lock().unwrap().len(), 1);
        assert_eq!(session.messages().len(), 1);
        assert!(matches!(session.submit("again").await, Err(SessionError::Busy)));

        session.abort_pending();
        assert_eq!(session.state(), SendState::Idle);
    }
}
