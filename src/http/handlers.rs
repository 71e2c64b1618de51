use super::state::AppState;
use crate::error::ApiError;
use crate::presentation::{self, StreamView};
use crate::stream::{StartOutcome, START_FAILED_MESSAGE};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StartStreamRequest {
    /// Start the session in exam mode; omitted means the client's default
    #[serde(default)]
    pub is_exam: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn status_for(err: &ApiError) -> StatusCode {
    match err {
        ApiError::Auth { .. } => StatusCode::UNAUTHORIZED,
        ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
        ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
        ApiError::Conflict { .. } => StatusCode::CONFLICT,
        ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ApiError::Stream { .. } | ApiError::Network { .. } | ApiError::Server { .. } => {
            StatusCode::BAD_GATEWAY
        }
    }
}

async fn current_view(state: &AppState) -> StreamView {
    presentation::render(&state.controller.snapshot().await)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /stream
pub async fn get_stream_view(State(state): State<AppState>) -> impl IntoResponse {
    Json(current_view(&state).await)
}

/// POST /stream/start
pub async fn start_stream(
    State(state): State<AppState>,
    req: Option<Json<StartStreamRequest>>,
) -> impl IntoResponse {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    let is_exam = req.is_exam.unwrap_or(state.exam_default);

    match state.controller.start(is_exam).await {
        Ok(StartOutcome::Started(id)) => {
            info!("Stream started for session {}", id);
            (StatusCode::OK, Json(current_view(&state).await)).into_response()
        }
        Ok(StartOutcome::Ignored) => {
            (StatusCode::OK, Json(current_view(&state).await)).into_response()
        }
        Err(e) => {
            error!("Failed to start stream: {}", e);
            (
                status_for(&e),
                Json(ErrorResponse {
                    error: e.detail().unwrap_or(START_FAILED_MESSAGE).to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// POST /stream/stop
pub async fn stop_stream(State(state): State<AppState>) -> impl IntoResponse {
    state.controller.stop().await;
    Json(current_view(&state).await)
}

/// POST /stream/notice/dismiss
pub async fn dismiss_notice(State(state): State<AppState>) -> impl IntoResponse {
    state.controller.dismiss_notice().await;
    Json(current_view(&state).await)
}

/// GET /stream/frame
pub async fn get_latest_frame(State(state): State<AppState>) -> impl IntoResponse {
    match state.frames.latest() {
        Some(frame) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "image/jpeg".to_string()),
                (header::CACHE_CONTROL, "no-store".to_string()),
            ],
            frame.jpeg,
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No frame available".to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
