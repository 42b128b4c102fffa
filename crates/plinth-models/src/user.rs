//! User accounts.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::{check_len, unique_violation};
use crate::{hash_password, ModelError, NOW_SQL};

/// Maximum length for a username.
pub const MAX_USERNAME_LEN: usize = 80;
/// Maximum length for an email address.
pub const MAX_EMAIL_LEN: usize = 120;
/// Maximum length for a first or last name.
pub const MAX_NAME_LEN: usize = 50;

const USERNAME_TAKEN: &str = "Username already exists";
const EMAIL_TAKEN: &str = "Email already exists";

const SELECT_USER: &str = "SELECT
        id, username, email, password_hash, first_name, last_name,
        is_active, is_admin, created_at, updated_at
    FROM users";

/// A registered user. The password hash is never serialized.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    /// Creation timestamp (ISO 8601, UTC).
    pub created_at: String,
    /// Last modification timestamp (ISO 8601, UTC).
    pub updated_at: String,
}

impl User {
    /// Checks a plaintext password against this user's stored hash.
    pub fn check_password(&self, candidate: &str) -> bool {
        crate::verify_password(&self.password_hash, candidate)
    }
}

/// Parameters for creating a user.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    /// Plaintext password; hashed before it reaches the database.
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: bool,
}

/// Partial update for a user. `None` leaves a field untouched.
///
/// The name fields are doubly optional: `Some(None)` clears the column.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<Option<String>>,
    pub last_name: Option<Option<String>>,
}

impl UserChanges {
    fn validate(&self) -> Result<(), ModelError> {
        if let Some(username) = &self.username {
            check_len("username", username, MAX_USERNAME_LEN)?;
        }
        if let Some(email) = &self.email {
            check_len("email", email, MAX_EMAIL_LEN)?;
        }
        if let Some(Some(first)) = &self.first_name {
            check_len("first_name", first, MAX_NAME_LEN)?;
        }
        if let Some(Some(last)) = &self.last_name {
            check_len("last_name", last, MAX_NAME_LEN)?;
        }
        Ok(())
    }
}

impl NewUser {
    fn validate(&self) -> Result<(), ModelError> {
        check_len("username", &self.username, MAX_USERNAME_LEN)?;
        check_len("email", &self.email, MAX_EMAIL_LEN)?;
        if let Some(first) = &self.first_name {
            check_len("first_name", first, MAX_NAME_LEN)?;
        }
        if let Some(last) = &self.last_name {
            check_len("last_name", last, MAX_NAME_LEN)?;
        }
        Ok(())
    }
}

/// Creates a user and returns the stored row.
///
/// Fails with [`ModelError::Duplicate`] when the username or email is taken.
pub fn create_user(conn: &Connection, new: &NewUser) -> Result<User, ModelError> {
    new.validate()?;
    let password_hash = hash_password(&new.password)?;

    let tx = conn.unchecked_transaction()?;

    if username_taken(&tx, &new.username, None)? {
        return Err(ModelError::Duplicate(USERNAME_TAKEN.to_string()));
    }
    if email_taken(&tx, &new.email, None)? {
        return Err(ModelError::Duplicate(EMAIL_TAKEN.to_string()));
    }

    tx.execute(
        "INSERT INTO users (username, email, password_hash, first_name, last_name, is_admin)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            new.username,
            new.email,
            password_hash,
            new.first_name,
            new.last_name,
            new.is_admin,
        ],
    )
    .map_err(map_write_error)?;

    let user = get_user(&tx, tx.last_insert_rowid())?;
    tx.commit()?;

    tracing::debug!(user_id = user.id, username = %user.username, "user created");
    Ok(user)
}

/// Retrieves a user by id.
pub fn get_user(conn: &Connection, id: i64) -> Result<User, ModelError> {
    conn.query_row(
        &format!("{SELECT_USER} WHERE id = ?1"),
        [id],
        map_row_to_user,
    )
    .optional()?
    .ok_or(ModelError::NotFound { entity: "User", id })
}

/// Looks up a user by username.
pub fn find_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>, ModelError> {
    let user = conn
        .query_row(
            &format!("{SELECT_USER} WHERE username = ?1"),
            [username],
            map_row_to_user,
        )
        .optional()?;
    Ok(user)
}

/// Lists all users ordered by id.
pub fn list_users(conn: &Connection) -> Result<Vec<User>, ModelError> {
    let mut stmt = conn.prepare(&format!("{SELECT_USER} ORDER BY id ASC"))?;
    let rows = stmt.query_map([], map_row_to_user)?;
    let mut users = Vec::new();
    for row in rows {
        users.push(row?);
    }
    Ok(users)
}

/// Applies a partial update in a single UPDATE statement and returns the new row.
///
/// An unknown `id` fails with [`ModelError::NotFound`] before the changes
/// are validated. `updated_at` is refreshed even when no field changes.
pub fn update_user(conn: &Connection, id: i64, changes: &UserChanges) -> Result<User, ModelError> {
    let tx = conn.unchecked_transaction()?;

    if !user_exists(&tx, id)? {
        return Err(ModelError::NotFound { entity: "User", id });
    }
    changes.validate()?;
    let password_hash = changes.password.as_deref().map(hash_password).transpose()?;

    if let Some(username) = &changes.username {
        if username_taken(&tx, username, Some(id))? {
            return Err(ModelError::Duplicate(USERNAME_TAKEN.to_string()));
        }
    }
    if let Some(email) = &changes.email {
        if email_taken(&tx, email, Some(id))? {
            return Err(ModelError::Duplicate(EMAIL_TAKEN.to_string()));
        }
    }

    let mut set_parts: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(username) = &changes.username {
        values.push(Box::new(username.clone()));
        set_parts.push(format!("username = ?{}", values.len()));
    }
    if let Some(email) = &changes.email {
        values.push(Box::new(email.clone()));
        set_parts.push(format!("email = ?{}", values.len()));
    }
    if let Some(hash) = password_hash {
        values.push(Box::new(hash));
        set_parts.push(format!("password_hash = ?{}", values.len()));
    }
    if let Some(first) = &changes.first_name {
        values.push(Box::new(first.clone()));
        set_parts.push(format!("first_name = ?{}", values.len()));
    }
    if let Some(last) = &changes.last_name {
        values.push(Box::new(last.clone()));
        set_parts.push(format!("last_name = ?{}", values.len()));
    }
    set_parts.push(format!("updated_at = {NOW_SQL}"));

    values.push(Box::new(id));
    let sql = format!(
        "UPDATE users SET {} WHERE id = ?{}",
        set_parts.join(", "),
        values.len()
    );

    let params: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let count = tx
        .execute(&sql, params.as_slice())
        .map_err(map_write_error)?;
    if count == 0 {
        return Err(ModelError::NotFound { entity: "User", id });
    }

    let user = get_user(&tx, id)?;
    tx.commit()?;
    Ok(user)
}

/// Deletes a user. Their posts are removed by the `ON DELETE CASCADE` key.
pub fn delete_user(conn: &Connection, id: i64) -> Result<(), ModelError> {
    let count = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
    if count == 0 {
        return Err(ModelError::NotFound { entity: "User", id });
    }
    tracing::debug!(user_id = id, "user deleted");
    Ok(())
}

/// Whether a user row with `id` exists.
pub fn user_exists(conn: &Connection, id: i64) -> Result<bool, ModelError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn username_taken(conn: &Connection, username: &str, except: Option<i64>) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1 AND id IS NOT ?2)",
        params![username, except],
        |row| row.get(0),
    )
}

fn email_taken(conn: &Connection, email: &str, except: Option<i64>) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1 AND id IS NOT ?2)",
        params![email, except],
        |row| row.get(0),
    )
}

fn map_write_error(err: rusqlite::Error) -> ModelError {
    match unique_violation(&err) {
        Some("users.username") => ModelError::Duplicate(USERNAME_TAKEN.to_string()),
        Some("users.email") => ModelError::Duplicate(EMAIL_TAKEN.to_string()),
        _ => ModelError::Database(err),
    }
}

fn map_row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        is_active: row.get(6)?,
        is_admin: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_db;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: "password123".to_string(),
            ..NewUser::default()
        }
    }

    #[test]
    fn create_and_fetch_user() {
        let conn = test_db();
        let created = create_user(
            &conn,
            &NewUser {
                first_name: Some("Test".to_string()),
                last_name: Some("User".to_string()),
                ..new_user("testuser", "test@example.com")
            },
        )
        .expect("create should succeed");

        assert!(created.id > 0);
        assert!(created.is_active);
        assert!(!created.is_admin);
        assert_eq!(created.first_name.as_deref(), Some("Test"));
        assert_ne!(created.password_hash, "password123");
        assert!(created.check_password("password123"));
        assert_eq!(created.created_at, created.updated_at);

        let fetched = get_user(&conn, created.id).expect("get should succeed");
        assert_eq!(fetched, created);
    }

    #[test]
    fn serialized_user_omits_password_hash() {
        let conn = test_db();
        let user = create_user(&conn, &new_user("ada", "ada@example.com")).unwrap();
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("password").is_none());
        assert_eq!(json["username"], "ada");
        assert_eq!(json["is_active"], true);
    }

    #[test]
    fn duplicate_username_and_email_are_rejected() {
        let conn = test_db();
        create_user(&conn, &new_user("ada", "ada@example.com")).unwrap();

        let err = create_user(&conn, &new_user("ada", "other@example.com")).unwrap_err();
        assert!(matches!(err, ModelError::Duplicate(ref m) if m == "Username already exists"));

        let err = create_user(&conn, &new_user("grace", "ada@example.com")).unwrap_err();
        assert!(matches!(err, ModelError::Duplicate(ref m) if m == "Email already exists"));

        assert_eq!(list_users(&conn).unwrap().len(), 1);
    }

    #[test]
    fn unique_constraint_maps_to_duplicate() {
        let conn = test_db();
        conn.execute(
            "INSERT INTO users (username, email, password_hash) VALUES ('ada', 'ada@example.com', 'x')",
            [],
        )
        .unwrap();
        let err = conn
            .execute(
                "INSERT INTO users (username, email, password_hash) VALUES ('ada', 'b@example.com', 'x')",
                [],
            )
            .unwrap_err();
        assert!(matches!(
            map_write_error(err),
            ModelError::Duplicate(ref m) if m == "Username already exists"
        ));
    }

    #[test]
    fn overlong_fields_are_rejected() {
        let conn = test_db();
        let long = "x".repeat(MAX_USERNAME_LEN + 1);
        assert!(matches!(
            create_user(&conn, &new_user(&long, "a@example.com")),
            Err(ModelError::Validation(_))
        ));
        let long_email = format!("{}@example.com", "x".repeat(MAX_EMAIL_LEN));
        assert!(matches!(
            create_user(&conn, &new_user("ada", &long_email)),
            Err(ModelError::Validation(_))
        ));
        let long_name = NewUser {
            first_name: Some("x".repeat(MAX_NAME_LEN + 1)),
            ..new_user("ada", "a@example.com")
        };
        assert!(matches!(
            create_user(&conn, &long_name),
            Err(ModelError::Validation(_))
        ));
        assert!(list_users(&conn).unwrap().is_empty());
    }

    #[test]
    fn only_length_limits_are_enforced() {
        let conn = test_db();
        let user = create_user(
            &conn,
            &NewUser {
                password: String::new(),
                ..new_user(&"x".repeat(MAX_USERNAME_LEN), "bob")
            },
        )
        .expect("free-form values within limits should be stored");
        assert_eq!(user.email, "bob");
        assert!(user.check_password(""));
    }

    #[test]
    fn update_changes_only_supplied_fields() {
        let conn = test_db();
        let user = create_user(
            &conn,
            &NewUser {
                first_name: Some("Ada".to_string()),
                last_name: Some("Lovelace".to_string()),
                ..new_user("ada", "ada@example.com")
            },
        )
        .unwrap();

        let updated = update_user(
            &conn,
            user.id,
            &UserChanges {
                email: Some("countess@example.com".to_string()),
                last_name: Some(None),
                password: Some("new-secret".to_string()),
                ..UserChanges::default()
            },
        )
        .expect("update should succeed");

        assert_eq!(updated.username, "ada");
        assert_eq!(updated.email, "countess@example.com");
        assert_eq!(updated.first_name.as_deref(), Some("Ada"));
        assert_eq!(updated.last_name, None);
        assert!(updated.check_password("new-secret"));
        assert!(!updated.check_password("password123"));
        assert_eq!(updated.created_at, user.created_at);
    }

    #[test]
    fn update_refreshes_updated_at() {
        let conn = test_db();
        let user = create_user(&conn, &new_user("ada", "ada@example.com")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));

        let updated = update_user(&conn, user.id, &UserChanges::default()).unwrap();

        assert!(updated.updated_at > user.updated_at);
        assert_eq!(updated.created_at, user.created_at);
    }

    #[test]
    fn update_of_missing_user_is_not_found_before_other_checks() {
        let conn = test_db();
        create_user(&conn, &new_user("ada", "ada@example.com")).unwrap();

        let taken = UserChanges {
            username: Some("ada".to_string()),
            ..UserChanges::default()
        };
        assert!(matches!(
            update_user(&conn, 999, &taken),
            Err(ModelError::NotFound { entity: "User", id: 999 })
        ));

        let overlong = UserChanges {
            username: Some("x".repeat(MAX_USERNAME_LEN + 1)),
            ..UserChanges::default()
        };
        assert!(matches!(
            update_user(&conn, 999, &overlong),
            Err(ModelError::NotFound { .. })
        ));
    }

    #[test]
    fn update_rejects_taken_username_but_allows_own() {
        let conn = test_db();
        let ada = create_user(&conn, &new_user("ada", "ada@example.com")).unwrap();
        create_user(&conn, &new_user("grace", "grace@example.com")).unwrap();

        let err = update_user(
            &conn,
            ada.id,
            &UserChanges {
                username: Some("grace".to_string()),
                ..UserChanges::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::Duplicate(_)));

        let same = update_user(
            &conn,
            ada.id,
            &UserChanges {
                username: Some("ada".to_string()),
                ..UserChanges::default()
            },
        )
        .expect("keeping one's own username should succeed");
        assert_eq!(same.username, "ada");
    }

    #[test]
    fn missing_user_is_not_found() {
        let conn = test_db();
        assert!(matches!(
            get_user(&conn, 42),
            Err(ModelError::NotFound { entity: "User", id: 42 })
        ));
        assert!(matches!(
            update_user(&conn, 42, &UserChanges::default()),
            Err(ModelError::NotFound { .. })
        ));
        assert!(matches!(
            delete_user(&conn, 42),
            Err(ModelError::NotFound { .. })
        ));
    }

    #[test]
    fn find_by_username_and_delete() {
        let conn = test_db();
        let user = create_user(&conn, &new_user("ada", "ada@example.com")).unwrap();

        let found = find_user_by_username(&conn, "ada").unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
        assert!(find_user_by_username(&conn, "nobody").unwrap().is_none());

        delete_user(&conn, user.id).expect("delete should succeed");
        assert!(list_users(&conn).unwrap().is_empty());
    }

    #[test]
    fn admin_flag_is_stored() {
        let conn = test_db();
        let admin = create_user(
            &conn,
            &NewUser {
                is_admin: true,
                ..new_user("root", "root@example.com")
            },
        )
        .unwrap();
        assert!(admin.is_admin);
    }
}
