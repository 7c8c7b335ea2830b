//! # Common Test Utilities
//!
//! Builds the full router on top of the in-memory store, the local hashing
//! embedder and stubbed language-model and scraper ports, and offers small
//! helpers for driving it with `tower::ServiceExt::oneshot`.

// Not every test file uses every helper.
#![allow(unused)]

use api_lib::{
    adapters::{Argon2Hasher, FileTextExtractor, HashingEmbedder, JwtTokens, MemoryStore},
    config::Config,
    web::{
        self,
        state::{AppState, Ports},
    },
};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use nexus_chat_core::domain::ScrapedPage;
use nexus_chat_core::ports::{GenerativeModel, PortError, PortResult, WebScraper};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const SKY_PAGE_URL: &str = "https://example.com/sky";

/// Answers arithmetic and otherwise echoes a fixed sentence; records every prompt.
#[derive(Default)]
pub struct StubModel {
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl GenerativeModel for StubModel {
    async fn generate(&self, prompt: &str) -> PortResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.contains("2+2") {
            Ok("2+2 equals 4.".to_string())
        } else {
            Ok("Here is what I found.".to_string())
        }
    }
}

/// Serves one known page; every other address fails to fetch.
pub struct StubScraper;

#[async_trait]
impl WebScraper for StubScraper {
    async fn scrape(&self, url: &str) -> PortResult<ScrapedPage> {
        if url != SKY_PAGE_URL {
            return Err(PortError::Unavailable(format!("could not reach {url}")));
        }
        Ok(ScrapedPage {
            url: url.to_string(),
            title: "Why the sky is blue".to_string(),
            text: "Sunlight is scattered by the gases of the atmosphere. Blue light is \
                   scattered more than red light because it travels as shorter waves, \
                   which is why the sky looks blue during the day."
                .to_string(),
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub model: Arc<StubModel>,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .compact()
            .try_init();

        let config = Config::from_lookup(|key| match key {
            "JWT_SECRET" => Some(JWT_SECRET.to_string()),
            "MAX_UPLOAD_BYTES" => Some("65536".to_string()),
            _ => None,
        })
        .unwrap();

        let store = Arc::new(MemoryStore::new());
        let model = Arc::new(StubModel::default());
        let ports = Ports {
            users: store.clone(),
            content: store.clone(),
            embedder: Arc::new(HashingEmbedder::default()),
            model: model.clone(),
            extractor: Arc::new(FileTextExtractor),
            scraper: Arc::new(StubScraper),
            hasher: Arc::new(Argon2Hasher),
            tokens: Arc::new(JwtTokens::new(JWT_SECRET, chrono::Duration::hours(24))),
        };

        let state = Arc::new(AppState::new(Arc::new(config), ports));
        Self {
            router: web::router(state),
            model,
            store,
        }
    }

    /// Sends `request` and returns the status and the JSON body (`Null` if empty).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> (StatusCode, Value) {
        let body = format!("username={username}&email={email}&password={password}");
        self.send(form_request("/api/auth/register", None, &body)).await
    }

    /// Registers a user and returns their bearer token.
    pub async fn token_for(&self, username: &str) -> String {
        let (status, body) = self
            .register(username, &format!("{username}@example.com"), "password123")
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    pub async fn upload(&self, token: &str, filename: &str, data: &[u8]) -> (StatusCode, Value) {
        self.send(multipart_request("/api/upload", token, filename, data))
            .await
    }
}

pub fn form_request(uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn authed_request(method: Method, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

pub fn multipart_request(uri: &str, token: &str, filename: &str, data: &[u8]) -> Request<Body> {
    const BOUNDARY: &str = "nexus-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body))
        .unwrap()
}
