//! Post routes.

use crate::error::{parse_id, ApiError};
use crate::{with_conn, AppState};
use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::Json,
};
use plinth_models::{
    create_post, delete_post, get_post, list_posts, post_exists, update_post, NewPost, PostChanges,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub slug: Option<String>,
    pub author_id: Option<i64>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub slug: Option<String>,
    pub is_published: Option<bool>,
}

impl From<UpdatePostRequest> for PostChanges {
    fn from(req: UpdatePostRequest) -> Self {
        PostChanges {
            title: req.title,
            content: req.content,
            slug: req.slug,
            is_published: req.is_published,
        }
    }
}

/// GET /api/posts
pub async fn list_posts_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let posts = with_conn(&state.pool, "list_posts", |conn| Ok(list_posts(conn)?)).await?;

    Ok(Json(json!({
        "count": posts.len(),
        "posts": posts
    })))
}

/// POST /api/posts
pub async fn create_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<Option<CreatePostRequest>>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(payload) = payload?;
    let Some(CreatePostRequest {
        title: Some(title),
        content: Some(content),
        slug: Some(slug),
        author_id: Some(author_id),
        is_published,
    }) = payload
    else {
        return Err(ApiError::missing_fields());
    };

    let new_post = NewPost {
        title,
        content,
        slug,
        author_id,
        is_published: is_published.unwrap_or(false),
    };

    let post = with_conn(&state.pool, "create_post", move |conn| {
        Ok(create_post(conn, &new_post)?)
    })
    .await?;

    tracing::info!(post_id = post.id, slug = %post.slug, "post created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Post created successfully",
            "post": post
        })),
    ))
}

/// GET /api/posts/:id
pub async fn get_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, "Post")?;
    let post = with_conn(&state.pool, "get_post", move |conn| Ok(get_post(conn, id)?)).await?;

    Ok(Json(json!({ "post": post })))
}

/// PUT /api/posts/:id
pub async fn update_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<Option<UpdatePostRequest>>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, "Post")?;
    // A missing row is reported before anything about the body.
    let changes: Result<Option<PostChanges>, ApiError> = payload
        .map(|Json(req)| req.map(Into::into))
        .map_err(ApiError::from);

    let post = with_conn(&state.pool, "update_post", move |conn| {
        if !post_exists(conn, id)? {
            return Err(ApiError::NotFound("Post not found".to_string()));
        }
        let changes = changes?.ok_or_else(ApiError::no_data)?;
        Ok(update_post(conn, id, &changes)?)
    })
    .await?;

    Ok(Json(json!({
        "message": "Post updated successfully",
        "post": post
    })))
}

/// DELETE /api/posts/:id
pub async fn delete_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, "Post")?;
    with_conn(&state.pool, "delete_post", move |conn| Ok(delete_post(conn, id)?)).await?;

    tracing::info!(post_id = id, "post deleted");

    Ok(Json(json!({ "message": "Post deleted successfully" })))
}
