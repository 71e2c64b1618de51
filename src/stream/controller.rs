use super::sink::{SinkEvent, StreamSink};
use super::state::{StartOutcome, StopOutcome, StreamSnapshot, StreamState};
use crate::api::{SessionApi, SessionId, Url};
use crate::error::ApiError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Shown when the backend gives no reason for a failed start
pub const START_FAILED_MESSAGE: &str = "Failed to start session";

struct Inner {
    state: StreamState,
    notice: Option<String>,
    /// Bumped on every page entry/exit; completions from an older page
    /// visit must not touch the current state
    epoch: u64,
    /// Generation of the live sink binding, set only while `Active`
    binding: Option<u64>,
    next_binding: u64,
}

impl Inner {
    fn bind(&mut self, sink: &dyn StreamSink, id: SessionId, url: Url) {
        self.next_binding += 1;
        sink.bind(&id, self.next_binding, url);
        self.binding = Some(self.next_binding);
        self.state = StreamState::Active(id);
    }

    fn unbind(&mut self, sink: &dyn StreamSink) {
        sink.unbind();
        self.binding = None;
    }
}

/// Coordinates the backend detection session with the stream sink.
///
/// The lock is never held across a network call. `stopping` is claimed with
/// a compare-exchange so that a user stop and stream-failure recovery cannot
/// both stop the same session.
pub struct StreamController {
    api: Arc<dyn SessionApi>,
    sink: Arc<dyn StreamSink>,
    inner: Mutex<Inner>,
    stopping: AtomicBool,
}

impl StreamController {
    pub fn new(api: Arc<dyn SessionApi>, sink: Arc<dyn StreamSink>) -> Self {
        Self {
            api,
            sink,
            inner: Mutex::new(Inner {
                state: StreamState::Idle,
                notice: None,
                epoch: 0,
                binding: None,
                next_binding: 0,
            }),
            stopping: AtomicBool::new(false),
        }
    }

    pub async fn snapshot(&self) -> StreamSnapshot {
        let inner = self.inner.lock().await;
        StreamSnapshot {
            state: inner.state.clone(),
            notice: inner.notice.clone(),
        }
    }

    pub async fn state(&self) -> StreamState {
        self.inner.lock().await.state.clone()
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Page entry: drop whatever local state exists and adopt the session the
    /// backend reports active, if any.
    pub async fn enter(&self) -> Result<StreamState, ApiError> {
        let epoch = {
            let mut inner = self.inner.lock().await;
            inner.epoch += 1;
            if !inner.state.is_idle() {
                inner.unbind(self.sink.as_ref());
                inner.state = StreamState::Idle;
            }
            inner.notice = None;
            inner.epoch
        };

        info!("Re-syncing stream state with backend");

        let sessions = self.api.list_sessions().await?;
        let Some(active) = sessions.into_iter().find(|s| s.active) else {
            info!("No active session on backend");
            return Ok(self.state().await);
        };

        let url = self.api.stream_url(&active.id)?;

        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch || !inner.state.is_idle() {
            debug!("State changed during re-sync, not adopting session {}", active.id);
            return Ok(inner.state.clone());
        }

        info!("Adopting active session {} (exam={})", active.id, active.is_exam);
        inner.bind(self.sink.as_ref(), active.id, url);
        Ok(inner.state.clone())
    }

    /// Page exit. In-flight requests are left to finish on their own; their
    /// results are discarded.
    pub async fn leave(&self) {
        let mut inner = self.inner.lock().await;
        inner.epoch += 1;
        inner.unbind(self.sink.as_ref());
        inner.state = StreamState::Idle;
        inner.notice = None;
        info!("Left stream page");
    }

    /// User toggle "start". Only acts from `Idle`.
    pub async fn start(&self, is_exam: bool) -> Result<StartOutcome, ApiError> {
        let epoch = {
            let mut inner = self.inner.lock().await;
            if !inner.state.is_idle() {
                debug!("Start ignored while {}", inner.state.name());
                return Ok(StartOutcome::Ignored);
            }
            inner.state = StreamState::Starting;
            inner.notice = None;
            inner.epoch
        };

        info!("Starting detection session (exam={})", is_exam);

        let started = match self.api.start_session(is_exam).await {
            Ok(session) => self
                .api
                .stream_url(&session.id)
                .map(|url| (session.id, url)),
            Err(e) => Err(e),
        };

        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch {
            debug!("Page left while start was in flight");
            return Ok(StartOutcome::Ignored);
        }

        match started {
            Ok((id, url)) => {
                inner.bind(self.sink.as_ref(), id.clone(), url);
                info!("Session {} active", id);
                Ok(StartOutcome::Started(id))
            }
            Err(e) => {
                warn!("Failed to start session: {}", e);
                inner.state = StreamState::Idle;
                inner.notice = Some(e.detail().unwrap_or(START_FAILED_MESSAGE).to_string());
                Err(e)
            }
        }
    }

    /// User toggle "stop". Only acts from `Active` with no stop in flight;
    /// always ends in `Idle`.
    pub async fn stop(&self) -> StopOutcome {
        let (id, epoch) = {
            let mut inner = self.inner.lock().await;
            let StreamState::Active(id) = &inner.state else {
                debug!("Stop ignored while {}", inner.state.name());
                return StopOutcome::Ignored;
            };
            let id = id.clone();
            if !self.claim_stop() {
                debug!("Stop already in flight for session {}", id);
                return StopOutcome::Ignored;
            }
            inner.unbind(self.sink.as_ref());
            inner.state = StreamState::Stopping(id.clone());
            (id, inner.epoch)
        };

        info!("Stopping session {}", id);
        self.finish_stop(&id, epoch).await;
        StopOutcome::Stopped(id)
    }

    /// The sink lost the feed it bound for `session_id` under `binding`.
    ///
    /// Treated as an implicit stop; returns the error shown to the user, or
    /// `None` when the failure is stale or a stop already owns the session.
    pub async fn handle_stream_error(
        &self,
        session_id: &SessionId,
        binding: u64,
    ) -> Option<ApiError> {
        if self.is_stopping() {
            debug!("Stream error during stop ignored");
            return None;
        }

        let epoch = {
            let mut inner = self.inner.lock().await;
            match &inner.state {
                StreamState::Active(active)
                    if active == session_id && inner.binding == Some(binding) => {}
                other => {
                    debug!(
                        "Stream error for session {} (binding {}) ignored while {}",
                        session_id,
                        binding,
                        other.name()
                    );
                    return None;
                }
            }
            if !self.claim_stop() {
                return None;
            }
            inner.unbind(self.sink.as_ref());
            inner.state = StreamState::Stopping(session_id.clone());
            inner.epoch
        };

        warn!("Stream for session {} failed, stopping session", session_id);
        self.finish_stop(session_id, epoch).await;

        let error = ApiError::Stream {
            detail: self.api.probe_stream(session_id).await,
        };

        let mut inner = self.inner.lock().await;
        if inner.epoch == epoch {
            inner.notice = Some(error.message());
        }
        Some(error)
    }

    pub async fn dismiss_notice(&self) {
        self.inner.lock().await.notice = None;
    }

    /// Route sink failures into recovery until the channel closes.
    pub async fn watch(self: Arc<Self>, mut events: mpsc::Receiver<SinkEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                SinkEvent::Failed {
                    session_id,
                    binding,
                    reason,
                } => {
                    debug!("Sink reported failure for {}: {}", session_id, reason);
                    if let Some(error) = self.handle_stream_error(&session_id, binding).await {
                        warn!("Stream stopped: {}", error.message());
                    }
                }
            }
        }
        debug!("Sink event channel closed");
    }

    fn claim_stop(&self) -> bool {
        self.stopping
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    async fn finish_stop(&self, id: &SessionId, epoch: u64) {
        if let Err(e) = self.api.stop_session(id).await {
            warn!("Stop for session {} failed (ignored): {}", id, e);
        }

        {
            let mut inner = self.inner.lock().await;
            if inner.epoch == epoch {
                inner.state = StreamState::Idle;
            }
        }
        self.stopping.store(false, Ordering::SeqCst);
        info!("Session {} stopped", id);
    }
}
