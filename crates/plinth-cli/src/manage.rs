//! Database and account commands.

use anyhow::Context;
use plinth_models::{find_user_by_username, NewUser, Post, User};
use plinth_server::config::Config;
use rusqlite::Connection;
use std::io::{self, BufRead, Write};

const RULE_WIDTH: usize = 50;

/// Account fields given on the command line; missing ones are prompted for.
#[derive(Debug, Default)]
pub struct AccountInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Opens the configured database, applying pending migrations.
pub fn init_db<W: Write>(config: &Config, out: &mut W) -> anyhow::Result<()> {
    plinth_server::open_database(config).context("failed to initialize database")?;
    writeln!(out, "Database initialized!")?;
    Ok(())
}

pub fn create_admin<R: BufRead, W: Write>(
    conn: &Connection,
    account: AccountInput,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<()> {
    let username = value_or_prompt(account.username, "Enter admin username: ", input, out)?;
    let email = value_or_prompt(account.email, "Enter admin email: ", input, out)?;
    let password = value_or_prompt(account.password, "Enter admin password: ", input, out)?;

    let new_user = NewUser {
        username,
        email,
        password,
        first_name: None,
        last_name: None,
        is_admin: true,
    };
    if insert_unless_exists(conn, &new_user, out)? {
        writeln!(out, "Admin user '{}' created successfully!", new_user.username)?;
    }
    Ok(())
}

pub fn create_user<R: BufRead, W: Write>(
    conn: &Connection,
    account: AccountInput,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<()> {
    let username = value_or_prompt(account.username, "Enter username: ", input, out)?;
    let email = value_or_prompt(account.email, "Enter email: ", input, out)?;
    let password = value_or_prompt(account.password, "Enter password: ", input, out)?;
    let first_name = optional_or_prompt(account.first_name, "Enter first name (optional): ", input, out)?;
    let last_name = optional_or_prompt(account.last_name, "Enter last name (optional): ", input, out)?;

    let new_user = NewUser {
        username,
        email,
        password,
        first_name,
        last_name,
        is_admin: false,
    };
    if insert_unless_exists(conn, &new_user, out)? {
        writeln!(out, "User '{}' created successfully!", new_user.username)?;
    }
    Ok(())
}

/// Returns `false` (after saying so) when the username is already taken.
fn insert_unless_exists<W: Write>(conn: &Connection, new_user: &NewUser, out: &mut W) -> anyhow::Result<bool> {
    if find_user_by_username(conn, &new_user.username)?.is_some() {
        writeln!(out, "User already exists!")?;
        return Ok(false);
    }
    let user = plinth_models::create_user(conn, new_user)?;
    tracing::info!(user_id = user.id, admin = user.is_admin, "account created");
    Ok(true)
}

fn value_or_prompt<R: BufRead, W: Write>(
    value: Option<String>,
    label: &str,
    input: &mut R,
    out: &mut W,
) -> io::Result<String> {
    match value {
        Some(v) => Ok(v),
        None => prompt(label, input, out),
    }
}

/// Like [`value_or_prompt`], but an empty answer means "not set".
fn optional_or_prompt<R: BufRead, W: Write>(
    value: Option<String>,
    label: &str,
    input: &mut R,
    out: &mut W,
) -> io::Result<Option<String>> {
    let answer = match value {
        Some(v) => v,
        None => prompt(label, input, out)?,
    };
    Ok(Some(answer).filter(|a| !a.is_empty()))
}

fn prompt<R: BufRead, W: Write>(label: &str, input: &mut R, out: &mut W) -> io::Result<String> {
    write!(out, "{label}")?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "input closed before a value was entered",
        ));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

pub fn write_users<W: Write>(users: &[User], out: &mut W) -> io::Result<()> {
    if users.is_empty() {
        return writeln!(out, "No users found.");
    }
    let rule = "-".repeat(RULE_WIDTH);
    writeln!(out, "\nUsers:\n{rule}")?;
    for user in users {
        writeln!(out, "ID: {}", user.id)?;
        writeln!(out, "Username: {}", user.username)?;
        writeln!(out, "Email: {}", user.email)?;
        writeln!(out, "Admin: {}", user.is_admin)?;
        writeln!(out, "Active: {}", user.is_active)?;
        writeln!(out, "{rule}")?;
    }
    Ok(())
}

pub fn write_posts<W: Write>(posts: &[Post], out: &mut W) -> io::Result<()> {
    if posts.is_empty() {
        return writeln!(out, "No posts found.");
    }
    let rule = "-".repeat(RULE_WIDTH);
    writeln!(out, "\nPosts:\n{rule}")?;
    for post in posts {
        writeln!(out, "ID: {}", post.id)?;
        writeln!(out, "Title: {}", post.title)?;
        writeln!(out, "Slug: {}", post.slug)?;
        writeln!(out, "Author: {}", post.author.as_deref().unwrap_or("Unknown"))?;
        writeln!(out, "Published: {}", post.is_published)?;
        writeln!(out, "{rule}")?;
    }
    Ok(())
}
