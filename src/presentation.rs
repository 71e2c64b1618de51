//! Projection of controller state onto the stream page's controls.

use crate::stream::{StreamSnapshot, StreamState};
use serde::Serialize;

/// Everything the stream page needs to draw its toggle, status line and dialog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamView {
    pub button_label: &'static str,
    pub button_color: &'static str,
    pub button_icon: &'static str,
    pub button_enabled: bool,
    pub status_text: String,
    /// Placeholder background shown while no feed is bound
    pub show_placeholder: bool,
    pub session_id: Option<String>,
    pub dialog: Option<String>,
}

pub fn render(snapshot: &StreamSnapshot) -> StreamView {
    let (button_label, button_color, button_icon, button_enabled) = match snapshot.state {
        StreamState::Idle => ("Start", "green", "play_fill", true),
        StreamState::Starting => ("Starting…", "gray", "hourglass", false),
        StreamState::Active(_) => ("Stop", "red", "stop_fill", true),
        StreamState::Stopping(_) => ("Stopping…", "gray", "hourglass", false),
    };

    let status_text = match &snapshot.state {
        StreamState::Idle => "No active session".to_string(),
        StreamState::Starting => "Starting session".to_string(),
        StreamState::Active(id) => format!("Session #{} active", id),
        StreamState::Stopping(id) => format!("Stopping session #{}", id),
    };

    StreamView {
        button_label,
        button_color,
        button_icon,
        button_enabled,
        status_text,
        show_placeholder: !matches!(snapshot.state, StreamState::Active(_)),
        session_id: snapshot.state.session_id().map(|id| id.to_string()),
        dialog: snapshot.notice.clone(),
    }
}
