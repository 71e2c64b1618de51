//! Error taxonomy for calls against the backend.
//!
//! Every failure is classified once, where the HTTP response (or transport
//! error) is first seen, and carries the backend's `detail` text when one
//! was supplied. Callers never inspect raw responses.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Missing or rejected credential; the user has to log in again
    #[error("authentication failed: {}", .detail.as_deref().unwrap_or("unauthorized"))]
    Auth { detail: Option<String> },

    /// Authenticated but not allowed (e.g. a parent account starting a session)
    #[error("forbidden: {}", .detail.as_deref().unwrap_or("forbidden"))]
    Forbidden { detail: Option<String> },

    #[error("not found: {}", .detail.as_deref().unwrap_or("not found"))]
    NotFound { detail: Option<String> },

    /// The backend refused a second concurrent session
    #[error("conflict: {}", .detail.as_deref().unwrap_or("session already active"))]
    Conflict { detail: Option<String> },

    #[error("invalid request: {}", .detail.as_deref().unwrap_or("validation failed"))]
    Validation { detail: Option<String> },

    /// Detection feed failed after the session was confirmed active
    #[error("stream failed: {}", .detail.as_deref().unwrap_or("camera not available"))]
    Stream { detail: Option<String> },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("server error ({status}): {}", .detail.as_deref().unwrap_or("request failed"))]
    Server { status: u16, detail: Option<String> },
}

impl ApiError {
    pub fn auth(detail: impl Into<String>) -> Self {
        Self::Auth {
            detail: Some(detail.into()),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Classify a non-success response status.
    pub fn from_status(status: StatusCode, detail: Option<String>) -> Self {
        match status.as_u16() {
            401 => Self::Auth { detail },
            403 => Self::Forbidden { detail },
            404 => Self::NotFound { detail },
            409 => Self::Conflict { detail },
            400 | 422 => Self::Validation { detail },
            code => Self::Server {
                status: code,
                detail,
            },
        }
    }

    /// Backend-provided detail, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Auth { detail }
            | Self::Forbidden { detail }
            | Self::NotFound { detail }
            | Self::Conflict { detail }
            | Self::Validation { detail }
            | Self::Stream { detail }
            | Self::Server { detail, .. } => detail.as_deref(),
            Self::Network { .. } => None,
        }
    }

    /// Human-readable text for a dialog: the backend detail verbatim, or a
    /// generic line for the error kind.
    pub fn message(&self) -> String {
        if let Some(detail) = self.detail() {
            return detail.to_string();
        }
        match self {
            Self::Auth { .. } => "Please login again".to_string(),
            Self::Forbidden { .. } => "You are not allowed to do that".to_string(),
            Self::NotFound { .. } => "Not found".to_string(),
            Self::Conflict { .. } => "A session is already active".to_string(),
            Self::Validation { .. } => "Invalid request".to_string(),
            Self::Stream { .. } => "Camera not available".to_string(),
            Self::Network { message } => message.clone(),
            Self::Server { status, .. } => format!("Request failed ({})", status),
        }
    }

    /// Whether the caller should force a fresh login.
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(status, None);
        }
        Self::network(err.to_string())
    }
}
