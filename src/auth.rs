//! Login and credential persistence
//!
//! The credential (backend host + bearer token) is written to a small JSON
//! file so later commands can reuse it until `logout`.

use crate::api::{normalize_base_url, ApiClient, LoginReply};
use crate::error::ApiError;
use anyhow::{Context, Result};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Backend host without trailing slash (e.g. "http://192.168.0.166:8000")
    pub base_url: String,

    /// Bearer token issued by `/auth/login`
    pub token: String,
}

impl Credentials {
    /// Build an authenticated client for these credentials
    pub fn client(&self, timeout: Duration) -> Result<ApiClient, ApiError> {
        ApiClient::new(Some(&self.base_url), Some(self.token.clone()), timeout)
    }
}

/// `POST /auth/login` with form fields `email` and `password`.
pub async fn login(
    base_url: &str,
    email: &str,
    password: &str,
    timeout: Duration,
) -> Result<Credentials, ApiError> {
    let base_url = normalize_base_url(base_url);
    let client = ApiClient::new(Some(&base_url), None, timeout)?;

    let builder = client
        .request(Method::POST, "/auth/login")?
        .form(&[("email", email), ("password", password)]);

    let reply: LoginReply = match client.send_json(builder).await {
        Ok(reply) => reply,
        Err(ApiError::Network { message }) => return Err(ApiError::Network { message }),
        Err(e) => {
            return Err(ApiError::Auth {
                detail: Some(e.detail().unwrap_or("Login failed").to_string()),
            })
        }
    };

    info!("Logged in to {} as {}", base_url, email);

    Ok(Credentials {
        base_url,
        token: reply.token,
    })
}

/// File-backed credential storage
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored credentials, or `None` when nobody is logged in
    pub fn load(&self) -> Result<Option<Credentials>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let creds = serde_json::from_str(&raw)
            .with_context(|| format!("Corrupt credential file {}", self.path.display()))?;

        Ok(Some(creds))
    }

    pub fn save(&self, creds: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let raw = serde_json::to_string_pretty(creds)?;
        let mut file = open_private(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(raw.as_bytes())
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        Ok(())
    }

    /// Forget the stored credential. Clearing an empty store is fine.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }
}

/// Truncating open that leaves the bearer token readable by the owner only
#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
