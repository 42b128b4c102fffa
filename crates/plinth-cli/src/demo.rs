//! End-to-end smoke test against a running server.

use anyhow::{bail, Context};
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use std::io::Write;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const BANNER_WIDTH: usize = 50;

struct Demo<'a, W: Write> {
    client: Client,
    base_url: String,
    out: &'a mut W,
}

impl<W: Write> Demo<'_, W> {
    /// Sends one request, prints the exchange and checks the status.
    async fn step(
        &mut self,
        description: &str,
        method: Method,
        path: &str,
        body: Option<Value>,
        expected: StatusCode,
    ) -> anyhow::Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.with_context(|| {
            format!(
                "could not connect to {}; is plinth-server running?",
                self.base_url
            )
        })?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .with_context(|| format!("{description}: response was not JSON"))?;

        let banner = "=".repeat(BANNER_WIDTH);
        writeln!(self.out, "\n{banner}\n{description}\n{banner}")?;
        writeln!(self.out, "Status Code: {}", status.as_u16())?;
        writeln!(self.out, "Response: {}", serde_json::to_string_pretty(&body)?)?;

        if status != expected {
            bail!("{description}: expected status {expected}, got {status}");
        }
        Ok(body)
    }
}

fn id_of(body: &Value, entity: &str) -> anyhow::Result<i64> {
    body[entity]["id"]
        .as_i64()
        .with_context(|| format!("response has no {entity} id"))
}

/// Walks every endpoint once, creating and then removing a demo user and post.
pub async fn run<W: Write>(base_url: &str, out: &mut W) -> anyhow::Result<()> {
    let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    writeln!(out, "Plinth demo against {base_url}")?;

    let mut demo = Demo {
        client,
        base_url: base_url.trim_end_matches('/').to_string(),
        out,
    };

    demo.step("Health Check", Method::GET, "/health", None, StatusCode::OK).await?;
    demo.step("API Documentation", Method::GET, "/docs", None, StatusCode::OK).await?;

    let created = demo
        .step(
            "Create User",
            Method::POST,
            "/api/users",
            Some(json!({
                "username": "demo_user",
                "email": "demo@example.com",
                "password": "demo_password",
                "first_name": "Demo",
                "last_name": "User"
            })),
            StatusCode::CREATED,
        )
        .await?;
    let user_id = id_of(&created, "user")?;

    demo.step("Get All Users", Method::GET, "/api/users", None, StatusCode::OK).await?;
    demo.step(
        "Get Specific User",
        Method::GET,
        &format!("/api/users/{user_id}"),
        None,
        StatusCode::OK,
    )
    .await?;

    let created = demo
        .step(
            "Create Post",
            Method::POST,
            "/api/posts",
            Some(json!({
                "title": "Demo Post",
                "content": "This is a demo post created by the demo command.",
                "slug": "demo-post",
                "author_id": user_id,
                "is_published": true
            })),
            StatusCode::CREATED,
        )
        .await?;
    let post_id = id_of(&created, "post")?;
    let post_path = format!("/api/posts/{post_id}");

    demo.step("Get All Posts", Method::GET, "/api/posts", None, StatusCode::OK).await?;
    demo.step("Get Specific Post", Method::GET, &post_path, None, StatusCode::OK).await?;
    demo.step(
        "Update Post",
        Method::PUT,
        &post_path,
        Some(json!({ "title": "Updated Demo Post", "is_published": false })),
        StatusCode::OK,
    )
    .await?;
    demo.step("Delete Post", Method::DELETE, &post_path, None, StatusCode::OK).await?;
    demo.step(
        "Delete User",
        Method::DELETE,
        &format!("/api/users/{user_id}"),
        None,
        StatusCode::OK,
    )
    .await?;

    writeln!(demo.out, "\nDemo completed successfully!")?;
    Ok(())
}
