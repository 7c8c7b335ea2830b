//! # Content Endpoint Tests
//!
//! Upload validation, URL ingestion, listing and ownership-checked deletion.

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{authed_request, form_request, TestApp, SKY_PAGE_URL};
use nexus_chat_core::ports::ContentRepository;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::test]
async fn upload_reports_metadata() {
    let app = TestApp::new();
    let token = app.token_for("alice").await;

    let (status, body) = app
        .upload(&token, "notes.txt", b"The sky is blue and the grass is green.")
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["content_type"], "file");
    assert_eq!(body["metadata"]["filename"], "notes.txt");
    assert_eq!(body["metadata"]["title"], "notes");
    assert_eq!(body["metadata"]["chunk_count"], 1);
    assert!(body["content_id"].as_str().is_some());
}

#[tokio::test]
async fn executable_upload_is_an_unsupported_type() {
    let app = TestApp::new();
    let token = app.token_for("alice").await;

    let (status, body) = app.upload(&token, "setup.exe", b"MZ\x90\x00binary").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "UnsupportedType");
}

#[tokio::test]
async fn oversized_upload_is_too_large() {
    let app = TestApp::new();
    let token = app.token_for("alice").await;
    let data = vec![b'a'; 70_000];

    let (status, body) = app.upload(&token, "big.txt", &data).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "TooLarge");
}

#[tokio::test]
async fn upload_without_readable_text_fails_extraction() {
    let app = TestApp::new();
    let token = app.token_for("alice").await;

    let (status, body) = app.upload(&token, "broken.pdf", b"not really a pdf").await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "ExtractionFailed");
}

#[tokio::test]
async fn url_ingestion_indexes_the_page() {
    let app = TestApp::new();
    let token = app.token_for("alice").await;

    let (status, body) = app
        .send(form_request(
            "/api/content/url",
            Some(&token),
            &format!("url={SKY_PAGE_URL}"),
        ))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["content_type"], "url");
    assert_eq!(body["metadata"]["url"], SKY_PAGE_URL);
    assert_eq!(body["metadata"]["title"], "Why the sky is blue");
}

#[tokio::test]
async fn unreachable_or_invalid_urls_fail_to_fetch() {
    let app = TestApp::new();
    let token = app.token_for("alice").await;

    for url in ["https://unreachable.example.org/page", "ftp://example.com/file"] {
        let (status, body) = app
            .send(form_request(
                "/api/content/url",
                Some(&token),
                &format!("url={url}"),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{url}");
        assert_eq!(body["error"], "FetchFailed", "{url}");
    }
}

#[tokio::test]
async fn list_shows_only_the_callers_content() {
    let app = TestApp::new();
    let alice = app.token_for("alice").await;
    let bob = app.token_for("bob").await;
    app.upload(&alice, "notes.txt", b"The sky is blue").await;
    app.upload(&bob, "bob.md", b"# Bob\nSome notes of my own").await;

    let (status, body) = app
        .send(authed_request(Method::GET, "/api/content/list", &alice))
        .await;

    assert_eq!(status, StatusCode::OK);
    let items = body["content"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["metadata"]["filename"], "notes.txt");
    assert!(items[0]["created_at"].as_str().is_some());
}

#[tokio::test]
async fn deleting_twice_reports_not_found() {
    let app = TestApp::new();
    let token = app.token_for("alice").await;
    let (_, uploaded) = app.upload(&token, "notes.txt", b"The sky is blue").await;
    let id = uploaded["content_id"].as_str().unwrap();
    let uri = format!("/api/content/{id}");

    let (first, body) = app.send(authed_request(Method::DELETE, &uri, &token)).await;
    let (second, error) = app.send(authed_request(Method::DELETE, &uri, &token)).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(body["status"], "deleted");
    assert_eq!(body["content_id"], id);
    assert_eq!(second, StatusCode::NOT_FOUND);
    assert_eq!(error["error"], "ContentNotFound");

    let (_, listing) = app
        .send(authed_request(Method::GET, "/api/content/list", &token))
        .await;
    assert!(listing["content"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn only_the_owner_may_delete() {
    let app = TestApp::new();
    let alice = app.token_for("alice").await;
    let bob = app.token_for("bob").await;
    let (_, uploaded) = app.upload(&alice, "notes.txt", b"The sky is blue").await;
    let uri = format!("/api/content/{}", uploaded["content_id"].as_str().unwrap());

    let (status, body) = app.send(authed_request(Method::DELETE, &uri, &bob)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "NotOwner");

    let (_, listing) = app
        .send(authed_request(Method::GET, "/api/content/list", &alice))
        .await;
    assert_eq!(listing["content"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn deleting_a_malformed_id_reports_not_found() {
    let app = TestApp::new();
    let token = app.token_for("alice").await;

    let (status, body) = app
        .send(authed_request(Method::DELETE, "/api/content/notes.txt", &token))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "ContentNotFound");
    assert!(body["message"].as_str().unwrap().contains("notes.txt"));
}

#[tokio::test]
async fn upload_without_a_multipart_body_is_a_json_bad_request() {
    let app = TestApp::new();
    let token = app.token_for("alice").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/upload")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(r#"{"file":"notes.txt"}"#))
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidInput");
    assert!(body["message"].is_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_uploads_keep_each_item_intact() {
    const UPLOADS: usize = 8;
    let app = Arc::new(TestApp::new());
    let token = app.token_for("alice").await;

    let tasks: Vec<_> = (0..UPLOADS)
        .map(|i| {
            let app = Arc::clone(&app);
            let token = token.clone();
            tokio::spawn(async move {
                let text = format!("Entry number {i} records the codeword zeta{i}.");
                app.upload(&token, &format!("doc{i}.txt"), text.as_bytes())
                    .await
            })
        })
        .collect();

    let mut uploaded = Vec::new();
    for task in tasks {
        let (status, body) = task.await.unwrap();
        assert_eq!(status, StatusCode::CREATED, "{body}");
        uploaded.push(body);
    }

    let (_, listing) = app
        .send(authed_request(Method::GET, "/api/content/list", &token))
        .await;
    let items = listing["content"].as_array().unwrap();
    assert_eq!(items.len(), UPLOADS);

    for item in &uploaded {
        let id: Uuid = item["content_id"].as_str().unwrap().parse().unwrap();
        let expected = item["metadata"]["chunk_count"].as_u64().unwrap() as usize;
        assert_eq!(app.store.count_chunks(id).await.unwrap(), expected);
    }

    for i in 0..UPLOADS {
        let (status, body) = app
            .send(form_request(
                "/api/chat/rag",
                Some(&token),
                &format!("message=zeta{i}"),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "documents", "zeta{i}");
        assert_eq!(body["sources"][0]["source"], format!("doc{i}.txt"));
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::new();

    let request = axum::http::Request::builder()
        .uri("/api/health")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
