//! User and post models for Plinth.
//!
//! Each entity exposes plain functions over a `rusqlite::Connection`:
//! create, get, list, update and delete. Mutations run inside a single
//! transaction; dropping the transaction on an early return rolls it back.
//!
//! Uniqueness (usernames, emails, post slugs) is checked before insert to
//! produce readable errors, and the database constraints remain the source
//! of truth: a constraint violation raised by SQLite maps to the same
//! [`ModelError::Duplicate`] variant.

mod error;
mod password;
mod post;
mod user;

pub use error::ModelError;
pub use password::{hash_password, verify_password};
pub use post::{
    create_post, delete_post, get_post, list_posts, post_exists, update_post, NewPost, Post,
    PostChanges, MAX_SLUG_LEN, MAX_TITLE_LEN,
};
pub use user::{
    create_user, delete_user, find_user_by_username, get_user, list_users, update_user,
    user_exists, NewUser, User, UserChanges, MAX_EMAIL_LEN, MAX_NAME_LEN, MAX_USERNAME_LEN,
};

/// SQL expression producing the current UTC time as ISO 8601 with milliseconds.
pub(crate) const NOW_SQL: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";
