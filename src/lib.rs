pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod presentation;
pub mod reports;
pub mod stream;
pub mod students;
pub mod users;

pub use api::{ApiClient, Session, SessionApi, SessionId};
pub use auth::{Credentials, TokenStore};
pub use config::Config;
pub use error::ApiError;
pub use http::{create_router, AppState};
pub use presentation::StreamView;
pub use stream::{
    FrameStore, MjpegSink, SinkEvent, StartOutcome, StopOutcome, StreamController, StreamSink,
    StreamSnapshot, StreamState,
};
