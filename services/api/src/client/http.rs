//! services/api/src/client/http.rs
//!
//! Talks to the REST API with `reqwest`. Responses are parsed into exactly the
//! shapes the server emits; anything else is a decode error.

use async_trait::async_trait;
use bytes::Bytes;
use nexus_chat_core::domain::{ChatReply, ContentKind, ReplySource, SourceRef};
use nexus_chat_core::ports::{PortError, PortResult};
use nexus_chat_core::session::{ChatBackend, SessionUser};
use reqwest::{multipart, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::web::auth::{AuthResponse, RefreshResponse, UserProfile};
use crate::web::chat::{GeneralChatResponse, RagChatResponse, SourceInfo};
use crate::web::content::{ContentListResponse, DeleteResponse, IngestResponse};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered with an error body.
    #[error("{reason}: {message}")]
    Api {
        status: StatusCode,
        reason: String,
        message: String,
    },
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl From<ClientError> for PortError {
    fn from(err: ClientError) -> Self {
        match &err {
            ClientError::Api { status, .. } => match *status {
                StatusCode::NOT_FOUND => PortError::NotFound(err.to_string()),
                StatusCode::CONFLICT => PortError::Conflict(err.to_string()),
                s if s.is_server_error() => PortError::Unavailable(err.to_string()),
                _ => PortError::Unsupported(err.to_string()),
            },
            ClientError::Transport(_) => PortError::Unavailable(err.to_string()),
            ClientError::Decode(_) => PortError::Unexpected(err.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl From<UserProfile> for SessionUser {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.id,
            username: profile.username,
            email: profile.email,
        }
    }
}

/// A typed client for the `/api` routes.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        debug!(%status, bytes = body.len(), "API response");

        if !status.is_success() {
            let (reason, message) = match serde_json::from_slice::<ErrorBody>(&body) {
                Ok(err) => (err.error, err.message),
                Err(_) => (
                    status.canonical_reason().unwrap_or("Error").to_string(),
                    String::from_utf8_lossy(&body).into_owned(),
                ),
            };
            warn!(%status, %reason, "API request failed");
            return Err(ClientError::Api {
                status,
                reason,
                message,
            });
        }

        serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(String, SessionUser), ClientError> {
        let request = self.http.post(self.url("/api/auth/register")).form(&[
            ("username", username),
            ("email", email),
            ("password", password),
        ]);
        let auth: AuthResponse = self.send(request).await?;
        Ok((auth.access_token, auth.user.into()))
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(String, SessionUser), ClientError> {
        let request = self
            .http
            .post(self.url("/api/auth/login"))
            .form(&[("email", email), ("password", password)]);
        let auth: AuthResponse = self.send(request).await?;
        Ok((auth.access_token, auth.user.into()))
    }

    pub async fn refresh(&self, token: &str) -> Result<String, ClientError> {
        let request = self.http.post(self.url("/api/auth/refresh")).bearer_auth(token);
        let refreshed: RefreshResponse = self.send(request).await?;
        Ok(refreshed.access_token)
    }

    pub async fn upload(
        &self,
        token: &str,
        filename: &str,
        data: Bytes,
    ) -> Result<IngestResponse, ClientError> {
        let part = multipart::Part::bytes(data.to_vec()).file_name(filename.to_string());
        let form = multipart::Form::new().part("file", part);
        let request = self
            .http
            .post(self.url("/api/upload"))
            .bearer_auth(token)
            .multipart(form);
        self.send(request).await
    }

    pub async fn add_url(&self, token: &str, url: &str) -> Result<IngestResponse, ClientError> {
        let request = self
            .http
            .post(self.url("/api/content/url"))
            .bearer_auth(token)
            .form(&[("url", url)]);
        self.send(request).await
    }

    pub async fn list_content(&self, token: &str) -> Result<ContentListResponse, ClientError> {
        let request = self.http.get(self.url("/api/content/list")).bearer_auth(token);
        self.send(request).await
    }

    pub async fn delete_content(
        &self,
        token: &str,
        content_id: Uuid,
    ) -> Result<DeleteResponse, ClientError> {
        let request = self
            .http
            .delete(self.url(&format!("/api/content/{content_id}")))
            .bearer_auth(token);
        self.send(request).await
    }
}

fn reply_source(value: &str) -> Result<ReplySource, ClientError> {
    match value {
        "general" => Ok(ReplySource::General),
        "documents" => Ok(ReplySource::Documents),
        other => Err(ClientError::Decode(format!("unknown reply source '{other}'"))),
    }
}

fn source_ref(info: SourceInfo) -> Result<SourceRef, ClientError> {
    let content_type = ContentKind::parse(&info.content_type).ok_or_else(|| {
        ClientError::Decode(format!("unknown content type '{}'", info.content_type))
    })?;
    Ok(SourceRef {
        source: info.source,
        content_type,
        relevance_score: info.relevance_score,
    })
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn general(&self, message: &str) -> PortResult<ChatReply> {
        let request = self
            .http
            .post(self.url("/api/chat/general"))
            .form(&[("message", message)]);
        let reply: GeneralChatResponse = self.send(request).await?;

        Ok(ChatReply {
            response: reply.response,
            source: reply_source(&reply.source)?,
            sources: Vec::new(),
        })
    }

    async fn documents(&self, token: &str, message: &str) -> PortResult<ChatReply> {
        let request = self
            .http
            .post(self.url("/api/chat/rag"))
            .bearer_auth(token)
            .form(&[("message", message)]);
        let reply: RagChatResponse = self.send(request).await?;

        let sources = reply
            .sources
            .into_iter()
            .map(source_ref)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ChatReply {
            response: reply.response,
            source: reply_source(&reply.source)?,
            sources,
        })
    }
}
