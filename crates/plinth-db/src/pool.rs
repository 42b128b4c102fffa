//! SQLite pool construction and `DATABASE_URL` handling.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

use crate::IN_MEMORY;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Per-connection and pool sizing knobs, taken from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a connection waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Upper bound on open connections. Ignored for `:memory:`.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        DbRuntimeSettings {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("could not build database pool: {0}")]
    PoolInit(#[from] r2d2::Error),

    /// The database URL names a scheme other than SQLite.
    #[error("unsupported database url '{0}': only sqlite urls and file paths are supported")]
    UnsupportedUrl(String),
}

/// Resolves a `DATABASE_URL` value to a SQLite path.
///
/// Accepted forms:
/// - `sqlite:///app.db` (relative path `app.db`)
/// - `sqlite:////var/lib/app.db` (absolute path `/var/lib/app.db`)
/// - `sqlite://:memory:`, `sqlite::memory:` and `:memory:`
/// - `sqlite:app.db` or a bare file path
///
/// # Errors
///
/// Returns `PoolError::UnsupportedUrl` for any other URL scheme
/// (e.g. `postgres://`).
pub fn resolve_database_path(url: &str) -> Result<String, PoolError> {
    let url = url.trim();

    if let Some(rest) = url.strip_prefix("sqlite://") {
        let path = rest.strip_prefix('/').unwrap_or(rest);
        return non_empty(path, url);
    }
    if let Some(rest) = url.strip_prefix("sqlite:") {
        return non_empty(rest, url);
    }
    if url.contains("://") {
        return Err(PoolError::UnsupportedUrl(url.to_string()));
    }

    non_empty(url, url)
}

fn non_empty(path: &str, url: &str) -> Result<String, PoolError> {
    if path.is_empty() {
        Err(PoolError::UnsupportedUrl(url.to_string()))
    } else {
        Ok(path.to_string())
    }
}

/// Opens a pool over `db_path`, preparing every new connection with
/// [`prepare_connection`].
///
/// Each `:memory:` connection is a separate database, so an in-memory pool
/// keeps exactly one connection alive for its whole life. Callers must not
/// hold that connection while asking the pool for another.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let busy_timeout = Duration::from_millis(settings.busy_timeout_ms);
    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .with_init(move |conn| prepare_connection(conn, busy_timeout));

    let builder = Pool::builder();
    let pool = if db_path == IN_MEMORY {
        if settings.pool_max_size != 1 {
            tracing::debug!(
                requested = settings.pool_max_size,
                "in-memory database pinned to a single connection"
            );
        }
        builder
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(manager)?
    } else {
        builder.max_size(settings.pool_max_size).build(manager)?
    };

    Ok(pool)
}

/// Switches to WAL, turns on foreign keys and sets the busy timeout.
///
/// In-memory databases cannot use WAL and stay in `memory` journal mode.
fn prepare_connection(conn: &mut Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") && !mode.eq_ignore_ascii_case("memory") {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("journal_mode stayed '{mode}' instead of WAL")),
        ));
    }
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(busy_timeout)
}
