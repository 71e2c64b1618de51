//! REST client for the behavior backend
//!
//! - `GET /sessions`, `POST /sessions/start`, `POST /sessions/stop/:id`
//! - `GET /detect/stream` (bound by the stream sink, probed on failure)
//! - `GET /students/:id` for reports
//! - `/students` and `/users` management, `GET /me`

mod client;
mod sessions;
mod types;

pub use client::{normalize_base_url, ApiClient, DEFAULT_TIMEOUT};
pub use reqwest::Url;
pub use sessions::SessionApi;
pub use types::{BehaviorRecord, CurrentUser, Session, SessionId, Student, User};

pub(crate) use types::LoginReply;
