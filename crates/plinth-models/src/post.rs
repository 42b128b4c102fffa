//! Posts written by users.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::{check_len, is_foreign_key_violation, unique_violation};
use crate::user::user_exists;
use crate::{ModelError, NOW_SQL};

/// Maximum length for a post title.
pub const MAX_TITLE_LEN: usize = 200;
/// Maximum length for a post slug.
pub const MAX_SLUG_LEN: usize = 200;

const SLUG_TAKEN: &str = "Post with this slug already exists";
const AUTHOR_NOT_FOUND: &str = "Author not found";

const SELECT_POST: &str = "SELECT
        p.id, p.title, p.content, p.slug, p.is_published, p.author_id,
        u.username, p.created_at, p.updated_at
    FROM posts p
    LEFT JOIN users u ON u.id = p.author_id";

/// A post, joined with its author's username.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub slug: String,
    pub is_published: bool,
    pub author_id: i64,
    /// Username of the author.
    pub author: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Parameters for creating a post.
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub slug: String,
    pub author_id: i64,
    pub is_published: bool,
}

impl NewPost {
    fn validate(&self) -> Result<(), ModelError> {
        check_len("title", &self.title, MAX_TITLE_LEN)?;
        check_len("slug", &self.slug, MAX_SLUG_LEN)
    }
}

/// Partial update for a post. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub slug: Option<String>,
    pub is_published: Option<bool>,
}

impl PostChanges {
    fn validate(&self) -> Result<(), ModelError> {
        if let Some(title) = &self.title {
            check_len("title", title, MAX_TITLE_LEN)?;
        }
        if let Some(slug) = &self.slug {
            check_len("slug", slug, MAX_SLUG_LEN)?;
        }
        Ok(())
    }
}

/// Creates a post and returns the stored row.
///
/// Fails with [`ModelError::Duplicate`] for a taken slug and
/// [`ModelError::InvalidReference`] for an unknown author.
pub fn create_post(conn: &Connection, new: &NewPost) -> Result<Post, ModelError> {
    new.validate()?;

    let tx = conn.unchecked_transaction()?;

    if slug_taken(&tx, &new.slug, None)? {
        return Err(ModelError::Duplicate(SLUG_TAKEN.to_string()));
    }
    if !user_exists(&tx, new.author_id)? {
        return Err(ModelError::InvalidReference(AUTHOR_NOT_FOUND.to_string()));
    }

    tx.execute(
        "INSERT INTO posts (title, content, slug, author_id, is_published)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            new.title,
            new.content,
            new.slug,
            new.author_id,
            new.is_published,
        ],
    )
    .map_err(map_write_error)?;

    let post = get_post(&tx, tx.last_insert_rowid())?;
    tx.commit()?;

    tracing::debug!(post_id = post.id, slug = %post.slug, "post created");
    Ok(post)
}

/// Retrieves a post by id.
pub fn get_post(conn: &Connection, id: i64) -> Result<Post, ModelError> {
    conn.query_row(
        &format!("{SELECT_POST} WHERE p.id = ?1"),
        [id],
        map_row_to_post,
    )
    .optional()?
    .ok_or(ModelError::NotFound { entity: "Post", id })
}

/// Whether a post row with `id` exists.
pub fn post_exists(conn: &Connection, id: i64) -> Result<bool, ModelError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Lists all posts ordered by id.
pub fn list_posts(conn: &Connection) -> Result<Vec<Post>, ModelError> {
    let mut stmt = conn.prepare(&format!("{SELECT_POST} ORDER BY p.id ASC"))?;
    let rows = stmt.query_map([], map_row_to_post)?;
    let mut posts = Vec::new();
    for row in rows {
        posts.push(row?);
    }
    Ok(posts)
}

/// Applies a partial update in a single UPDATE statement and returns the new row.
///
/// An unknown `id` fails with [`ModelError::NotFound`] before the changes
/// are validated.
pub fn update_post(conn: &Connection, id: i64, changes: &PostChanges) -> Result<Post, ModelError> {
    let tx = conn.unchecked_transaction()?;

    if !post_exists(&tx, id)? {
        return Err(ModelError::NotFound { entity: "Post", id });
    }
    changes.validate()?;

    if let Some(slug) = &changes.slug {
        if slug_taken(&tx, slug, Some(id))? {
            return Err(ModelError::Duplicate(SLUG_TAKEN.to_string()));
        }
    }

    let mut set_parts: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(title) = &changes.title {
        values.push(Box::new(title.clone()));
        set_parts.push(format!("title = ?{}", values.len()));
    }
    if let Some(content) = &changes.content {
        values.push(Box::new(content.clone()));
        set_parts.push(format!("content = ?{}", values.len()));
    }
    if let Some(slug) = &changes.slug {
        values.push(Box::new(slug.clone()));
        set_parts.push(format!("slug = ?{}", values.len()));
    }
    if let Some(published) = changes.is_published {
        values.push(Box::new(published));
        set_parts.push(format!("is_published = ?{}", values.len()));
    }
    set_parts.push(format!("updated_at = {NOW_SQL}"));

    values.push(Box::new(id));
    let sql = format!(
        "UPDATE posts SET {} WHERE id = ?{}",
        set_parts.join(", "),
        values.len()
    );

    let params: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let count = tx
        .execute(&sql, params.as_slice())
        .map_err(map_write_error)?;
    if count == 0 {
        return Err(ModelError::NotFound { entity: "Post", id });
    }

    let post = get_post(&tx, id)?;
    tx.commit()?;
    Ok(post)
}

/// Deletes a post.
pub fn delete_post(conn: &Connection, id: i64) -> Result<(), ModelError> {
    let count = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
    if count == 0 {
        return Err(ModelError::NotFound { entity: "Post", id });
    }
    tracing::debug!(post_id = id, "post deleted");
    Ok(())
}

fn slug_taken(conn: &Connection, slug: &str, except: Option<i64>) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM posts WHERE slug = ?1 AND id IS NOT ?2)",
        params![slug, except],
        |row| row.get(0),
    )
}

fn map_write_error(err: rusqlite::Error) -> ModelError {
    if unique_violation(&err) == Some("posts.slug") {
        return ModelError::Duplicate(SLUG_TAKEN.to_string());
    }
    if is_foreign_key_violation(&err) {
        return ModelError::InvalidReference(AUTHOR_NOT_FOUND.to_string());
    }
    ModelError::Database(err)
}

fn map_row_to_post(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        slug: row.get(3)?,
        is_published: row.get(4)?,
        author_id: row.get(5)?,
        author: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_db;
    use crate::{create_user, delete_user, NewUser};

    fn seed_author(conn: &Connection, username: &str) -> i64 {
        create_user(
            conn,
            &NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password: "password123".to_string(),
                ..NewUser::default()
            },
        )
        .expect("should create author")
        .id
    }

    fn new_post(slug: &str, author_id: i64) -> NewPost {
        NewPost {
            title: "Test Post".to_string(),
            content: "This is a test post content.".to_string(),
            slug: slug.to_string(),
            author_id,
            is_published: false,
        }
    }

    #[test]
    fn create_post_carries_author_username() {
        let conn = test_db();
        let author = seed_author(&conn, "ada");

        let post = create_post(
            &conn,
            &NewPost {
                is_published: true,
                ..new_post("test-post", author)
            },
        )
        .expect("create should succeed");

        assert_eq!(post.title, "Test Post");
        assert_eq!(post.author_id, author);
        assert_eq!(post.author.as_deref(), Some("ada"));
        assert!(post.is_published);
        assert_eq!(get_post(&conn, post.id).unwrap(), post);
    }

    #[test]
    fn is_published_defaults_to_false() {
        let conn = test_db();
        let author = seed_author(&conn, "ada");
        let post = create_post(&conn, &new_post("draft", author)).unwrap();
        assert!(!post.is_published);
    }

    #[test]
    fn duplicate_slug_is_rejected() {
        let conn = test_db();
        let author = seed_author(&conn, "ada");
        create_post(&conn, &new_post("same-slug", author)).unwrap();

        let err = create_post(&conn, &new_post("same-slug", author)).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Duplicate(ref m) if m == "Post with this slug already exists"
        ));
    }

    #[test]
    fn unknown_author_is_rejected() {
        let conn = test_db();
        let err = create_post(&conn, &new_post("orphan", 99)).unwrap_err();
        assert!(matches!(err, ModelError::InvalidReference(_)));
        assert!(list_posts(&conn).unwrap().is_empty());
    }

    #[test]
    fn title_length_is_enforced() {
        let conn = test_db();
        let author = seed_author(&conn, "ada");
        let err = create_post(
            &conn,
            &NewPost {
                title: "t".repeat(MAX_TITLE_LEN + 1),
                ..new_post("long", author)
            },
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::Validation(_)));
    }

    #[test]
    fn update_post_fields() {
        let conn = test_db();
        let author = seed_author(&conn, "ada");
        let post = create_post(&conn, &new_post("first", author)).unwrap();

        let updated = update_post(
            &conn,
            post.id,
            &PostChanges {
                title: Some("Updated".to_string()),
                is_published: Some(true),
                ..PostChanges::default()
            },
        )
        .expect("update should succeed");

        assert_eq!(updated.title, "Updated");
        assert!(updated.is_published);
        assert_eq!(updated.content, post.content);
        assert_eq!(updated.slug, "first");
    }

    #[test]
    fn update_refreshes_updated_at() {
        let conn = test_db();
        let author = seed_author(&conn, "ada");
        let post = create_post(&conn, &new_post("fresh", author)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));

        let updated = update_post(
            &conn,
            post.id,
            &PostChanges {
                content: Some("Revised.".to_string()),
                ..PostChanges::default()
            },
        )
        .unwrap();

        assert!(updated.updated_at > post.updated_at);
        assert_eq!(updated.created_at, post.created_at);
    }

    #[test]
    fn update_of_missing_post_is_not_found_before_other_checks() {
        let conn = test_db();
        let author = seed_author(&conn, "ada");
        create_post(&conn, &new_post("taken", author)).unwrap();

        for changes in [
            PostChanges {
                slug: Some("taken".to_string()),
                ..PostChanges::default()
            },
            PostChanges {
                title: Some("t".repeat(MAX_TITLE_LEN + 1)),
                ..PostChanges::default()
            },
        ] {
            assert!(matches!(
                update_post(&conn, 999, &changes),
                Err(ModelError::NotFound { entity: "Post", id: 999 })
            ));
        }
        assert!(post_exists(&conn, 1).unwrap());
        assert!(!post_exists(&conn, 999).unwrap());
    }

    #[test]
    fn empty_content_is_accepted() {
        let conn = test_db();
        let author = seed_author(&conn, "ada");
        let post = create_post(
            &conn,
            &NewPost {
                content: String::new(),
                ..new_post("empty", author)
            },
        )
        .expect("empty content is within limits");
        assert_eq!(post.content, "");
    }

    #[test]
    fn update_to_taken_slug_is_rejected() {
        let conn = test_db();
        let author = seed_author(&conn, "ada");
        create_post(&conn, &new_post("taken", author)).unwrap();
        let post = create_post(&conn, &new_post("mine", author)).unwrap();

        let err = update_post(
            &conn,
            post.id,
            &PostChanges {
                slug: Some("taken".to_string()),
                ..PostChanges::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::Duplicate(_)));
        assert_eq!(get_post(&conn, post.id).unwrap().slug, "mine");
    }

    #[test]
    fn delete_post_and_missing_post() {
        let conn = test_db();
        let author = seed_author(&conn, "ada");
        let post = create_post(&conn, &new_post("gone", author)).unwrap();

        delete_post(&conn, post.id).expect("delete should succeed");
        assert!(matches!(
            get_post(&conn, post.id),
            Err(ModelError::NotFound { entity: "Post", .. })
        ));
        assert!(matches!(
            delete_post(&conn, post.id),
            Err(ModelError::NotFound { .. })
        ));
    }

    #[test]
    fn deleting_author_removes_their_posts() {
        let conn = test_db();
        let ada = seed_author(&conn, "ada");
        let grace = seed_author(&conn, "grace");
        create_post(&conn, &new_post("ada-1", ada)).unwrap();
        create_post(&conn, &new_post("ada-2", ada)).unwrap();
        create_post(&conn, &new_post("grace-1", grace)).unwrap();

        delete_user(&conn, ada).unwrap();

        let remaining = list_posts(&conn).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].slug, "grace-1");
    }
}
