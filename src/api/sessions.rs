use super::client::{read_detail, ApiClient};
use super::types::{Session, SessionId, StartReply};
use crate::error::ApiError;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{multipart, Method, Url};
use tracing::{debug, info};

/// The three session calls the stream controller needs, plus the stream
/// endpoint helpers.
///
/// Implementations:
/// - `ApiClient`: the real backend over HTTP
/// - test fakes that record calls
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// `GET /sessions`
    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError>;

    /// `POST /sessions/start`
    async fn start_session(&self, is_exam: bool) -> Result<Session, ApiError>;

    /// `POST /sessions/stop/{id}`
    ///
    /// Callers treat this as idempotent and do not surface its failures.
    async fn stop_session(&self, id: &SessionId) -> Result<(), ApiError>;

    /// Stream URL for binding, with a fresh cache-bust token each call.
    fn stream_url(&self, id: &SessionId) -> Result<Url, ApiError>;

    /// Ask the stream endpoint once, without streaming, why it failed.
    async fn probe_stream(&self, id: &SessionId) -> Option<String>;
}

#[async_trait]
impl SessionApi for ApiClient {
    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
        let sessions: Vec<Session> = self.get_json("/sessions").await?;
        debug!("Backend reports {} session(s)", sessions.len());
        Ok(sessions)
    }

    async fn start_session(&self, is_exam: bool) -> Result<Session, ApiError> {
        self.token()?;
        let form = multipart::Form::new().text("is_exam", if is_exam { "true" } else { "false" });
        let builder = self.request(Method::POST, "/sessions/start")?.multipart(form);

        let reply: StartReply = self.send_json(builder).await?;
        let session = reply.into_session(is_exam);
        info!("Backend started session {} (exam={})", session.id, session.is_exam);
        Ok(session)
    }

    async fn stop_session(&self, id: &SessionId) -> Result<(), ApiError> {
        self.token()?;
        let builder = self.request(Method::POST, &format!("/sessions/stop/{}", id))?;
        self.send(builder).await?;
        info!("Backend stopped session {}", id);
        Ok(())
    }

    fn stream_url(&self, id: &SessionId) -> Result<Url, ApiError> {
        let token = self.token()?;
        let mut url = self.endpoint("/detect/stream")?;
        url.query_pairs_mut()
            .append_pair("session_id", id.as_str())
            .append_pair("_", &Utc::now().timestamp_millis().to_string())
            .append_pair("auth", &format!("Bearer {}", token));
        Ok(url)
    }

    async fn probe_stream(&self, id: &SessionId) -> Option<String> {
        let url = self.stream_url(id).ok()?;
        let response = match self.request_url(Method::GET, url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Stream probe failed to connect: {}", e);
                return None;
            }
        };

        if response.status().is_success() {
            // The feed answered; dropping the response closes it.
            return None;
        }

        let status = response.status();
        let detail = read_detail(response).await;
        debug!("Stream probe answered {}: {:?}", status, detail);
        detail
    }
}
