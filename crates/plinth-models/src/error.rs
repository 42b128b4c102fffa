//! Error types for model operations.

use rusqlite::ffi;
use thiserror::Error;

/// Errors that can occur during user and post operations.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A database operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No row exists with the requested id.
    #[error("{entity} not found")]
    NotFound {
        /// Entity name as shown to clients ("User", "Post").
        entity: &'static str,
        /// The id that was looked up.
        id: i64,
    },

    /// A unique column already holds the submitted value.
    #[error("{0}")]
    Duplicate(String),

    /// A foreign key points at a row that does not exist.
    #[error("{0}")]
    InvalidReference(String),

    /// Submitted field values violate a length or format rule.
    #[error("{0}")]
    Validation(String),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

/// Returns the `table.column` named by a UNIQUE constraint violation.
pub(crate) fn unique_violation(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(code, Some(msg))
            if code.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            msg.strip_prefix("UNIQUE constraint failed: ")
        }
        _ => None,
    }
}

/// Whether the error is a FOREIGN KEY constraint violation.
pub(crate) fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _)
            if code.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

/// Fails with [`ModelError::Validation`] when `value` is longer than `max` chars.
pub(crate) fn check_len(field: &str, value: &str, max: usize) -> Result<(), ModelError> {
    if value.chars().count() > max {
        return Err(ModelError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}
