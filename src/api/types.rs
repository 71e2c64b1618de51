use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Server-assigned session identifier.
///
/// The backend currently hands out integers; the client never does
/// arithmetic on them, so both numbers and strings are accepted and kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => Self(n.to_string()),
            RawId::Text(s) => Self(s),
        })
    }
}

/// A detection run bound to the teacher's camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,

    #[serde(default)]
    pub active: bool,

    /// Exam mode changes how behaviors are flagged server-side
    #[serde(default)]
    pub is_exam: bool,

    #[serde(default)]
    pub start_time: Option<NaiveDateTime>,

    #[serde(default)]
    pub end_time: Option<NaiveDateTime>,
}

/// Body of `POST /sessions/start`.
///
/// Depending on the backend revision this is a session object, an object
/// keyed `session_id`, or a bare id.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum StartReply {
    Object {
        #[serde(alias = "session_id")]
        id: SessionId,
        #[serde(default)]
        is_exam: Option<bool>,
        #[serde(default)]
        start_time: Option<NaiveDateTime>,
    },
    Bare(SessionId),
}

impl StartReply {
    pub(crate) fn into_session(self, requested_exam: bool) -> Session {
        match self {
            StartReply::Object {
                id,
                is_exam,
                start_time,
            } => Session {
                id,
                active: true,
                is_exam: is_exam.unwrap_or(requested_exam),
                start_time,
                end_time: None,
            },
            StartReply::Bare(id) => Session {
                id,
                active: true,
                is_exam: requested_exam,
                start_time: None,
                end_time: None,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginReply {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub full_name: String,

    #[serde(default)]
    pub class_name: Option<String>,

    #[serde(default)]
    pub photo_path: Option<String>,

    /// Parent account linked through `parent_email`
    #[serde(default)]
    pub parent_id: Option<i64>,
}

/// Account record from `/users`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,

    #[serde(default)]
    pub is_teacher: bool,
}

/// Token claims echoed by `GET /me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub sub: i64,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub is_teacher: bool,
}

/// One behavior observation recorded during a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorRecord {
    pub behavior: String,

    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,

    #[serde(default)]
    pub confidence: Option<f32>,

    #[serde(default)]
    pub session_id: Option<SessionId>,
}
