//! Database layer for Plinth.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! `DATABASE_URL` resolution and embedded SQL migrations. Every table is
//! created through versioned migrations managed by this crate.
//! Migrations are compiled into the binary via `include_str!`.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, resolve_database_path, DbPool, DbRuntimeSettings, PoolError};

/// Path that selects a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";
