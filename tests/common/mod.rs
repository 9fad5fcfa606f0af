//! Shared helpers for the HTTP-level tests

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use lending_server::{api, config::AppConfig, repository::Repository, AppState};

/// Router backed by a fresh in-memory store
pub fn app() -> Router {
    api::create_router(AppState::new(AppConfig::default(), Repository::in_memory()))
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Register a staff user and return its bearer token
pub async fn token(app: &Router) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({"email": "staff@example.com", "password": "secret"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["access_token"].as_str().unwrap().to_string()
}

pub async fn create_book(app: &Router, token: &str, isbn: &str, copies: i32) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/books",
        Some(token),
        Some(json!({
            "title": format!("Book {}", isbn),
            "author": "Author",
            "publication_year": 2020,
            "isbn": isbn,
            "copies": copies
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_i64().unwrap()
}

pub async fn create_reader(app: &Router, token: &str, email: &str) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/readers",
        Some(token),
        Some(json!({"name": "Reader", "email": email})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_i64().unwrap()
}

pub async fn borrow(app: &Router, token: &str, book_id: i64, reader_id: i64) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/v1/borrow",
        Some(token),
        Some(json!({"book_id": book_id, "reader_id": reader_id})),
    )
    .await
}

pub async fn copies(app: &Router, token: &str, book_id: i64) -> i64 {
    let (_, body) = send(
        app,
        Method::GET,
        &format!("/api/v1/books/{}", book_id),
        Some(token),
        None,
    )
    .await;
    body["copies"].as_i64().unwrap()
}
