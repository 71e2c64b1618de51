//! Local HTTP API for driving the stream page from a browser or script
//!
//! - GET /stream - Current view (button, status, dialog)
//! - POST /stream/start - Start a detection session
//! - POST /stream/stop - Stop the active session
//! - POST /stream/notice/dismiss - Clear the dialog
//! - GET /stream/frame - Latest JPEG from the feed
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::StartStreamRequest;
pub use routes::create_router;
pub use state::AppState;
