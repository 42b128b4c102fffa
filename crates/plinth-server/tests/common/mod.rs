#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use plinth_db::DbPool;
use plinth_server::config::{Config, Environment};
use plinth_server::{app, open_database, AppState};
use serde_json::Value;
use tower::ServiceExt;

/// Builds the router over a fresh, migrated in-memory database.
pub fn setup_app() -> (Router, DbPool) {
    let config = Config::for_environment(Environment::Testing);
    setup_app_with(&config)
}

pub fn setup_app_with(config: &Config) -> (Router, DbPool) {
    let pool = open_database(config).expect("failed to open test database");
    (app(AppState::new(pool.clone(), config)), pool)
}

/// Sends one request and decodes the JSON response body.
pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Sends a request with a raw body and explicit content type.
pub async fn send_raw(
    app: &Router,
    method: Method,
    uri: &str,
    content_type: &str,
    body: &str,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", content_type)
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Creates a user through the API and returns its id.
pub async fn create_user(app: &Router, username: &str) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/users",
        Some(serde_json::json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "password123"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "unexpected body: {body}");
    body["user"]["id"].as_i64().unwrap()
}

/// Creates a post through the API and returns its id.
pub async fn create_post(app: &Router, slug: &str, author_id: i64) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/posts",
        Some(serde_json::json!({
            "title": "Test Post",
            "content": "This is a test post content.",
            "slug": slug,
            "author_id": author_id
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "unexpected body: {body}");
    body["post"]["id"].as_i64().unwrap()
}
