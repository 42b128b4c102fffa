//! User routes.

use crate::error::{parse_id, ApiError};
use crate::{with_conn, AppState};
use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::Json,
};
use plinth_models::{
    create_user, delete_user, get_user, list_users, update_user, user_exists, NewUser, UserChanges,
};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::sync::Arc;

/// Request body for `POST /api/users`.
///
/// Every field is optional at the type level so that absent keys produce
/// "Missing required fields" rather than a deserialization error.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Request body for `PUT /api/users/:id`.
///
/// `first_name` / `last_name` distinguish an absent key (unchanged) from an
/// explicit `null` (cleared).
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub last_name: Option<Option<String>>,
}

/// Marks a key as present, keeping `null` as `Some(None)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl From<UpdateUserRequest> for UserChanges {
    fn from(req: UpdateUserRequest) -> Self {
        UserChanges {
            username: req.username,
            email: req.email,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
        }
    }
}

/// GET /api/users
pub async fn list_users_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let users = with_conn(&state.pool, "list_users", |conn| Ok(list_users(conn)?)).await?;

    Ok(Json(json!({
        "count": users.len(),
        "users": users
    })))
}

/// POST /api/users
pub async fn create_user_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<Option<CreateUserRequest>>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(payload) = payload?;
    let Some(CreateUserRequest {
        username: Some(username),
        email: Some(email),
        password: Some(password),
        first_name,
        last_name,
    }) = payload
    else {
        return Err(ApiError::missing_fields());
    };

    let new_user = NewUser {
        username,
        email,
        password,
        first_name,
        last_name,
        is_admin: false,
    };

    let user = with_conn(&state.pool, "create_user", move |conn| {
        Ok(create_user(conn, &new_user)?)
    })
    .await?;

    tracing::info!(user_id = user.id, username = %user.username, "user created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User created successfully",
            "user": user
        })),
    ))
}

/// GET /api/users/:id
pub async fn get_user_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, "User")?;
    let user = with_conn(&state.pool, "get_user", move |conn| Ok(get_user(conn, id)?)).await?;

    Ok(Json(json!({ "user": user })))
}

/// PUT /api/users/:id
pub async fn update_user_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<Option<UpdateUserRequest>>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, "User")?;
    // A missing row is reported before anything about the body.
    let changes: Result<Option<UserChanges>, ApiError> = payload
        .map(|Json(req)| req.map(Into::into))
        .map_err(ApiError::from);

    let user = with_conn(&state.pool, "update_user", move |conn| {
        if !user_exists(conn, id)? {
            return Err(ApiError::NotFound("User not found".to_string()));
        }
        let changes = changes?.ok_or_else(ApiError::no_data)?;
        Ok(update_user(conn, id, &changes)?)
    })
    .await?;

    Ok(Json(json!({
        "message": "User updated successfully",
        "user": user
    })))
}

/// DELETE /api/users/:id
pub async fn delete_user_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, "User")?;
    with_conn(&state.pool, "delete_user", move |conn| Ok(delete_user(conn, id)?)).await?;

    tracing::info!(user_id = id, "user deleted");

    Ok(Json(json!({ "message": "User deleted successfully" })))
}
