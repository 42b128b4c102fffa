//! Plinth server library logic.

pub mod api;
pub mod api_posts;
pub mod api_users;
pub mod config;
pub mod error;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::get,
    Extension, Router,
};
use config::{Config, LoggingConfig};
use error::ApiError;
use plinth_db::{DbPool, DbRuntimeSettings, MigrationError, PoolError};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Display name used in the welcome message.
    pub app_name: String,
    /// Version reported by the index route.
    pub app_version: String,
    /// Origins allowed by the CORS layer.
    pub cors_origins: Vec<String>,
}

impl AppState {
    /// Builds request state from a pool and the loaded configuration.
    pub fn new(pool: DbPool, config: &Config) -> Self {
        Self {
            pool,
            app_name: config.app.name.clone(),
            app_version: config.app.version.clone(),
            cors_origins: config.cors.origins.clone(),
        }
    }
}

/// Maximum request body size (1 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_origins);

    Router::new()
        .route("/", get(api::index))
        .route("/health", get(api::health))
        .route("/docs", get(api::docs))
        .route(
            "/api/users",
            get(api_users::list_users_handler).post(api_users::create_user_handler),
        )
        .route(
            "/api/users/{id}",
            get(api_users::get_user_handler)
                .put(api_users::update_user_handler)
                .delete(api_users::delete_user_handler),
        )
        .route(
            "/api/posts",
            get(api_posts::list_posts_handler).post(api_posts::create_post_handler),
        )
        .route(
            "/api/posts/{id}",
            get(api_posts::get_post_handler)
                .put(api_posts::update_post_handler)
                .delete(api_posts::delete_post_handler),
        )
        .fallback(api::not_found)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}

/// Builds the CORS layer for the configured origins.
///
/// A `*` entry allows any origin; unparsable origins are skipped.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.iter().any(|o| o.trim() == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "skipping invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(allowed))
}

/// Runs `op` on a pooled connection inside `spawn_blocking`.
///
/// `what` names the operation in error logs.
pub(crate) async fn with_conn<T, F>(pool: &DbPool, what: &'static str, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T, ApiError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            tracing::error!(error = %e, operation = what, "failed to get db connection");
            ApiError::internal()
        })?;
        op(&conn)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, operation = what, "blocking task join error");
        ApiError::internal()
    })?
}

/// Errors that can occur while opening the database at startup.
#[derive(Debug, Error)]
pub enum DatabaseInitError {
    /// The URL could not be resolved or the pool could not be built.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// No connection could be checked out for migrations.
    #[error("failed to get database connection for migrations: {0}")]
    Connection(#[from] r2d2::Error),

    /// A migration failed.
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// Resolves the configured database, builds the pool and applies pending migrations.
pub fn open_database(config: &Config) -> Result<DbPool, DatabaseInitError> {
    let path = plinth_db::resolve_database_path(config.database_url())?;
    let pool = plinth_db::create_pool(
        &path,
        DbRuntimeSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )?;

    let conn = pool.get()?;
    let applied = plinth_db::run_migrations(&conn)?;
    if applied > 0 {
        tracing::info!(count = applied, path = %path, "applied database migrations");
    }
    drop(conn);

    Ok(pool)
}

/// Installs the global tracing subscriber.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
