//! Session history and per-student behavior reports

use crate::api::{ApiClient, BehaviorRecord, Session, SessionApi, SessionId, Student};
use crate::error::ApiError;
use serde::{Deserialize, Serialize};

/// One line of the session history list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub title: String,
    pub status: &'static str,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            title: format!("Session #{}", session.id),
            status: if session.active { "Active" } else { "Done" },
        }
    }
}

/// `GET /students/{id}` with behaviors included
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentReport {
    #[serde(flatten)]
    pub student: Student,

    #[serde(default)]
    pub behaviors: Vec<BehaviorRecord>,
}

impl StudentReport {
    /// Count of each behavior label, most frequent first
    pub fn tally(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for record in &self.behaviors {
            match counts.iter_mut().find(|(b, _)| *b == record.behavior) {
                Some((_, n)) => *n += 1,
                None => counts.push((record.behavior.clone(), 1)),
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }
}

pub async fn session_history(api: &dyn SessionApi) -> Result<Vec<SessionSummary>, ApiError> {
    let sessions = api.list_sessions().await?;
    Ok(sessions.iter().map(SessionSummary::from).collect())
}

pub async fn student_report(client: &ApiClient, student_id: i64) -> Result<StudentReport, ApiError> {
    client.get_json(&format!("/students/{}", student_id)).await
}
