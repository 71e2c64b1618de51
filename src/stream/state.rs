use crate::api::SessionId;
use serde::Serialize;

/// Where the stream controller is in the start/stop lifecycle.
///
/// Exactly one variant holds at any time; `Starting` and `Stopping` mark a
/// request in flight and block further toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "session_id", rename_all = "snake_case")]
pub enum StreamState {
    Idle,
    Starting,
    Active(SessionId),
    Stopping(SessionId),
}

impl StreamState {
    pub fn is_idle(&self) -> bool {
        matches!(self, StreamState::Idle)
    }

    /// Session the sink is (or was just) bound to
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            StreamState::Active(id) | StreamState::Stopping(id) => Some(id),
            StreamState::Idle | StreamState::Starting => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StreamState::Idle => "idle",
            StreamState::Starting => "starting",
            StreamState::Active(_) => "active",
            StreamState::Stopping(_) => "stopping",
        }
    }
}

/// Controller state plus the pending user-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamSnapshot {
    pub state: StreamState,
    pub notice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started(SessionId),
    /// Not in `Idle`, or the page was left while the request was in flight
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped(SessionId),
    /// Nothing active, or another stop already owns the session
    Ignored,
}
