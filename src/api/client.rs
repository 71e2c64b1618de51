use crate::error::ApiError;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Strip whitespace and any trailing slash from a backend host.
pub fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

/// Thin request/response mapper for the behavior backend.
///
/// Holds the backend host and bearer token explicitly; nothing is read from
/// global state. Never retries.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Option<String>,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(
        base_url: Option<&str>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.map(normalize_base_url).filter(|b| !b.is_empty()),
            token,
        })
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub(crate) fn token(&self) -> Result<&str, ApiError> {
        self.token
            .as_deref()
            .ok_or_else(|| ApiError::auth("Not logged in"))
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| ApiError::auth("Server host not set. Please login again."))?;

        Url::parse(&format!("{}{}", base, path))
            .map_err(|e| ApiError::Validation {
                detail: Some(format!("Invalid backend URL {}{}: {}", base, path, e)),
            })
    }

    /// Start a request with `Accept: application/json` and, when a token is
    /// held, the bearer header.
    pub(crate) fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(path)?;
        Ok(self.request_url(method, url))
    }

    /// Like `request`, but fails locally when no token is held.
    pub(crate) fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        self.token()?;
        self.request(method, path)
    }

    pub(crate) fn request_url(&self, method: Method, url: Url) -> RequestBuilder {
        debug!("{} {}", method, url.path());
        let mut builder = self
            .http
            .request(method, url)
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        builder
    }

    /// Send and return the response, classifying any non-success status.
    pub(crate) async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = read_detail(response).await;
        debug!("Request failed with {}: {:?}", status, detail);
        Err(ApiError::from_status(status, detail))
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::network(format!("Invalid response body: {}", e)))
    }

    /// Authenticated `GET` decoding a JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let builder = self.authed(Method::GET, path)?;
        self.send_json(builder).await
    }

    /// Authenticated `DELETE`; the response body is not needed.
    pub(crate) async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let builder = self.authed(Method::DELETE, path)?;
        self.send(builder).await?;
        Ok(())
    }
}

/// Pull the `detail` field out of an error body, if the body is JSON.
pub(crate) async fn read_detail(response: Response) -> Option<String> {
    let body: serde_json::Value = response.json().await.ok()?;
    match body.get("detail")? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
