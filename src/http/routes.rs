use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Stream control
        .route("/stream", get(handlers::get_stream_view))
        .route("/stream/start", post(handlers::start_stream))
        .route("/stream/stop", post(handlers::stop_stream))
        .route("/stream/notice/dismiss", post(handlers::dismiss_notice))
        // Latest frame
        .route("/stream/frame", get(handlers::get_latest_frame))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
