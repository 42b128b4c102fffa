mod common;

use axum::http::{Method, StatusCode};
use common::{send, setup_app, setup_app_with};
use plinth_server::config::{Config, Environment};

#[tokio::test]
async fn index_route_welcomes() {
    let (app, _pool) = setup_app();

    let (status, body) = send(&app, Method::GET, "/", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Welcome to Plinth API");
    assert_eq!(body["status"], "running");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn index_uses_configured_app_identity() {
    let mut config = Config::for_environment(Environment::Testing);
    config.app.name = "Blog".to_string();
    config.app.version = "2.3.4".to_string();
    let (app, _pool) = setup_app_with(&config);

    let (_, body) = send(&app, Method::GET, "/", None).await;

    assert_eq!(body["message"], "Welcome to Blog API");
    assert_eq!(body["version"], "2.3.4");
}

#[tokio::test]
async fn health_check_reports_healthy() {
    let (app, _pool) = setup_app();

    let (status, body) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "ok");
    let timestamp = body["timestamp"].as_str().expect("timestamp should be a string");
    assert!(
        chrono::DateTime::parse_from_rfc3339(timestamp).is_ok(),
        "timestamp should be RFC 3339: {timestamp}"
    );
}

#[tokio::test]
async fn docs_list_every_endpoint() {
    let (app, _pool) = setup_app();

    let (status, body) = send(&app, Method::GET, "/docs", None).await;

    assert_eq!(status, StatusCode::OK);
    let endpoints = body["endpoints"].as_object().expect("endpoints should be an object");
    assert_eq!(endpoints.len(), 13);
    assert_eq!(endpoints["GET /health"], "Health check");
    assert_eq!(endpoints["DELETE /api/posts/<id>"], "Delete post");
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let (app, _pool) = setup_app();

    let (status, body) = send(&app, Method::GET, "/api/comments", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}
