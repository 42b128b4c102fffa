//! Service-level routes: welcome, health and endpoint listing.

use crate::error::ApiError;
use crate::{with_conn, AppState};
use axum::{extract::Extension, response::Json};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

/// Every route the server exposes, with a one-line description.
const ENDPOINTS: &[(&str, &str)] = &[
    ("GET /", "Welcome message"),
    ("GET /health", "Health check"),
    ("GET /docs", "API documentation"),
    ("GET /api/users", "Get all users"),
    ("POST /api/users", "Create new user"),
    ("GET /api/users/<id>", "Get user by ID"),
    ("PUT /api/users/<id>", "Update user"),
    ("DELETE /api/users/<id>", "Delete user"),
    ("GET /api/posts", "Get all posts"),
    ("POST /api/posts", "Create new post"),
    ("GET /api/posts/<id>", "Get post by ID"),
    ("PUT /api/posts/<id>", "Update post"),
    ("DELETE /api/posts/<id>", "Delete post"),
];

/// GET /
pub async fn index(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "message": format!("Welcome to {} API", state.app_name),
        "version": state.app_version,
        "status": "running"
    }))
}

/// GET /health
///
/// Always `200 OK`; a failing database check reports `degraded`.
pub async fn health(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let db_ok = with_conn(&state.pool, "health", |conn| {
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| {
                tracing::warn!(error = %e, "health check query failed");
                ApiError::internal()
            })
    })
    .await
    .is_ok();

    Json(json!({
        "status": if db_ok { "healthy" } else { "degraded" },
        "database": if db_ok { "ok" } else { "unavailable" },
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    }))
}

/// GET /docs
pub async fn docs() -> Json<Value> {
    let endpoints: serde_json::Map<String, Value> = ENDPOINTS
        .iter()
        .map(|(route, description)| (route.to_string(), Value::from(*description)))
        .collect();

    Json(json!({ "endpoints": endpoints }))
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}
