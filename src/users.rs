//! Teacher and parent accounts. Every call except `me` needs a teacher token.

use crate::api::{ApiClient, CurrentUser, User};
use crate::error::ApiError;
use reqwest::multipart::Form;
use reqwest::Method;
use tracing::info;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub is_teacher: bool,
}

/// Partial update; unset fields are not sent. A blank password keeps the old one.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub is_teacher: Option<bool>,
}

fn flag(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

pub async fn list(client: &ApiClient) -> Result<Vec<User>, ApiError> {
    client.get_json("/users").await
}

pub async fn get(client: &ApiClient, id: i64) -> Result<User, ApiError> {
    client.get_json(&format!("/users/{}", id)).await
}

/// `GET /me`: who the stored token belongs to
pub async fn me(client: &ApiClient) -> Result<CurrentUser, ApiError> {
    client.get_json("/me").await
}

/// `POST /users`. A duplicate email comes back as `Conflict`.
pub async fn add(client: &ApiClient, user: NewUser) -> Result<User, ApiError> {
    let form = Form::new()
        .text("name", user.name)
        .text("email", user.email)
        .text("password", user.password)
        .text("is_teacher", flag(user.is_teacher));

    let builder = client.authed(Method::POST, "/users")?.multipart(form);
    let created: User = client.send_json(builder).await?;
    info!("Added user {} ({})", created.id, created.email);
    Ok(created)
}

pub async fn update(client: &ApiClient, id: i64, update: UserUpdate) -> Result<User, ApiError> {
    let mut form = Form::new();
    if let Some(name) = update.name {
        form = form.text("name", name);
    }
    if let Some(email) = update.email {
        form = form.text("email", email);
    }
    if let Some(password) = update.password.filter(|p| !p.is_empty()) {
        form = form.text("password", password);
    }
    if let Some(is_teacher) = update.is_teacher {
        form = form.text("is_teacher", flag(is_teacher));
    }

    let builder = client
        .authed(Method::PUT, &format!("/users/{}", id))?
        .multipart(form);
    let updated: User = client.send_json(builder).await?;
    info!("Updated user {}", updated.id);
    Ok(updated)
}

pub async fn delete(client: &ApiClient, id: i64) -> Result<(), ApiError> {
    client.delete(&format!("/users/{}", id)).await?;
    info!("Deleted user {}", id);
    Ok(())
}
