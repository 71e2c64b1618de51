// Integration tests for the stream session controller
//
// The backend and the stream sink are replaced with in-memory fakes that
// record every call, so each test can assert exactly which network requests
// the controller issued.

use async_trait::async_trait;
use classwatch::api::{Session, SessionApi, SessionId, Url};
use classwatch::presentation;
use classwatch::stream::{
    SinkEvent, StartOutcome, StopOutcome, StreamController, StreamSink, StreamState,
};
use classwatch::ApiError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

#[derive(Default)]
struct FakeApi {
    sessions: Vec<Session>,
    start_result: Mutex<Option<Result<Session, ApiError>>>,
    start_gate: Option<Arc<Notify>>,
    stop_error: Option<ApiError>,
    stop_gate: Option<Arc<Notify>>,
    stop_entered: Arc<Notify>,
    stop_calls: Mutex<Vec<SessionId>>,
    probe_detail: Option<String>,
    probe_calls: Mutex<usize>,
}

impl FakeApi {
    fn with_sessions(sessions: Vec<Session>) -> Self {
        Self {
            sessions,
            ..Default::default()
        }
    }

    fn stop_calls(&self) -> Vec<SessionId> {
        self.stop_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionApi for FakeApi {
    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
        Ok(self.sessions.clone())
    }

    async fn start_session(&self, is_exam: bool) -> Result<Session, ApiError> {
        if let Some(gate) = &self.start_gate {
            gate.notified().await;
        }
        self.start_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(session("new", true, is_exam)))
    }

    async fn stop_session(&self, id: &SessionId) -> Result<(), ApiError> {
        self.stop_calls.lock().unwrap().push(id.clone());
        self.stop_entered.notify_one();
        if let Some(gate) = &self.stop_gate {
            gate.notified().await;
        }
        match &self.stop_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn stream_url(&self, id: &SessionId) -> Result<Url, ApiError> {
        Ok(Url::parse(&format!(
            "http://backend.test/detect/stream?session_id={}",
            id
        ))
        .unwrap())
    }

    async fn probe_stream(&self, _id: &SessionId) -> Option<String> {
        *self.probe_calls.lock().unwrap() += 1;
        self.probe_detail.clone()
    }
}

#[derive(Default)]
struct FakeSink {
    bound: Mutex<Option<(SessionId, u64, Url)>>,
    bind_count: Mutex<usize>,
}

impl FakeSink {
    fn bound_session(&self) -> Option<SessionId> {
        self.bound.lock().unwrap().as_ref().map(|(id, _, _)| id.clone())
    }

    fn binding(&self) -> u64 {
        self.bound
            .lock()
            .unwrap()
            .as_ref()
            .map(|(_, binding, _)| *binding)
            .expect("sink is not bound")
    }
}

impl StreamSink for FakeSink {
    fn bind(&self, session_id: &SessionId, binding: u64, url: Url) {
        *self.bind_count.lock().unwrap() += 1;
        *self.bound.lock().unwrap() = Some((session_id.clone(), binding, url));
    }

    fn unbind(&self) {
        *self.bound.lock().unwrap() = None;
    }

    fn is_bound(&self) -> bool {
        self.bound.lock().unwrap().is_some()
    }
}

fn session(id: &str, active: bool, is_exam: bool) -> Session {
    Session {
        id: SessionId::from(id),
        active,
        is_exam,
        start_time: None,
        end_time: None,
    }
}

fn setup(api: FakeApi) -> (Arc<FakeApi>, Arc<FakeSink>, Arc<StreamController>) {
    let api = Arc::new(api);
    let sink = Arc::new(FakeSink::default());
    let controller = Arc::new(StreamController::new(api.clone(), sink.clone()));
    (api, sink, controller)
}

async fn active_controller(api: FakeApi) -> (Arc<FakeApi>, Arc<FakeSink>, Arc<StreamController>) {
    let (api, sink, controller) = setup(api);
    let state = controller.enter().await.unwrap();
    assert_eq!(state, StreamState::Active(SessionId::from("s1")));
    (api, sink, controller)
}

fn s1_active() -> FakeApi {
    FakeApi::with_sessions(vec![session("s1", true, false)])
}

// ============================================================================
// Page entry
// ============================================================================

#[tokio::test]
async fn test_entry_adopts_session_reported_active() {
    let (_api, sink, controller) = setup(FakeApi::with_sessions(vec![
        session("s0", false, false),
        session("s1", true, false),
    ]));

    let state = controller.enter().await.unwrap();

    assert_eq!(state, StreamState::Active(SessionId::from("s1")));
    assert_eq!(sink.bound_session(), Some(SessionId::from("s1")));

    let view = presentation::render(&controller.snapshot().await);
    assert_eq!(view.button_label, "Stop");
    assert!(!view.show_placeholder);
}

#[tokio::test]
async fn test_entry_without_active_session_stays_idle() {
    let (_api, sink, controller) = setup(FakeApi::with_sessions(vec![session("s0", false, false)]));

    let state = controller.enter().await.unwrap();

    assert_eq!(state, StreamState::Idle);
    assert!(!sink.is_bound());
    assert_eq!(
        presentation::render(&controller.snapshot().await).button_label,
        "Start"
    );
}

#[tokio::test]
async fn test_reentry_resyncs_instead_of_trusting_memory() {
    let (_api, sink, controller) = active_controller(s1_active()).await;

    controller.leave().await;
    assert_eq!(controller.state().await, StreamState::Idle);
    assert!(!sink.is_bound());

    let state = controller.enter().await.unwrap();
    assert_eq!(state, StreamState::Active(SessionId::from("s1")));
    assert_eq!(*sink.bind_count.lock().unwrap(), 2);
}

// ============================================================================
// Start
// ============================================================================

#[tokio::test]
async fn test_start_binds_stream_for_new_session() {
    let api = FakeApi::default();
    *api.start_result.lock().unwrap() = Some(Ok(session("s2", true, true)));
    let (_api, sink, controller) = setup(api);

    let outcome = controller.start(true).await.unwrap();

    assert_eq!(outcome, StartOutcome::Started(SessionId::from("s2")));
    assert_eq!(controller.state().await, StreamState::Active(SessionId::from("s2")));

    let bound = sink.bound.lock().unwrap().clone().unwrap();
    assert_eq!(bound.0, SessionId::from("s2"));
    assert!(bound.2.as_str().contains("session_id=s2"));
}

#[tokio::test]
async fn test_start_conflict_stays_idle_and_shows_detail() {
    let api = FakeApi::default();
    *api.start_result.lock().unwrap() = Some(Err(ApiError::Conflict {
        detail: Some("Camera busy".to_string()),
    }));
    let (_api, sink, controller) = setup(api);

    let err = controller.start(false).await.unwrap_err();

    assert!(matches!(err, ApiError::Conflict { .. }));
    assert_eq!(controller.state().await, StreamState::Idle);
    assert!(!sink.is_bound());

    let view = presentation::render(&controller.snapshot().await);
    assert_eq!(view.dialog.as_deref(), Some("Camera busy"));
    assert_eq!(view.button_label, "Start");
}

#[tokio::test]
async fn test_start_failure_without_detail_uses_generic_message() {
    let api = FakeApi::default();
    *api.start_result.lock().unwrap() = Some(Err(ApiError::network("connection refused")));
    let (_api, _sink, controller) = setup(api);

    assert!(controller.start(false).await.is_err());

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.state, StreamState::Idle);
    assert_eq!(snapshot.notice.as_deref(), Some("Failed to start session"));
}

#[tokio::test]
async fn test_start_ignored_unless_idle() {
    let (_api, sink, controller) = active_controller(s1_active()).await;

    let outcome = controller.start(false).await.unwrap();

    assert_eq!(outcome, StartOutcome::Ignored);
    assert_eq!(controller.state().await, StreamState::Active(SessionId::from("s1")));
    assert_eq!(*sink.bind_count.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_start_in_flight_blocks_second_start() {
    let gate = Arc::new(Notify::new());
    let api = FakeApi {
        start_gate: Some(gate.clone()),
        ..Default::default()
    };
    let (_api, _sink, controller) = setup(api);

    let first = tokio::spawn({
        let controller = controller.clone();
        async move { controller.start(false).await }
    });

    wait_for_state(&controller, StreamState::Starting).await;
    assert_eq!(controller.start(false).await.unwrap(), StartOutcome::Ignored);
    assert_eq!(controller.stop().await, StopOutcome::Ignored);

    gate.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert_eq!(outcome, StartOutcome::Started(SessionId::from("new")));
}

#[tokio::test]
async fn test_start_result_discarded_after_leaving_page() {
    let gate = Arc::new(Notify::new());
    let api = FakeApi {
        start_gate: Some(gate.clone()),
        ..Default::default()
    };
    let (_api, sink, controller) = setup(api);

    let pending = tokio::spawn({
        let controller = controller.clone();
        async move { controller.start(false).await }
    });

    wait_for_state(&controller, StreamState::Starting).await;
    controller.leave().await;
    gate.notify_one();

    assert_eq!(pending.await.unwrap().unwrap(), StartOutcome::Ignored);
    assert_eq!(controller.state().await, StreamState::Idle);
    assert!(!sink.is_bound());
}

// ============================================================================
// Stop
// ============================================================================

#[tokio::test]
async fn test_stop_twice_issues_one_stop_call() {
    let (api, sink, controller) = active_controller(s1_active()).await;

    assert_eq!(controller.stop().await, StopOutcome::Stopped(SessionId::from("s1")));
    assert_eq!(controller.stop().await, StopOutcome::Ignored);

    assert_eq!(api.stop_calls(), vec![SessionId::from("s1")]);
    assert_eq!(controller.state().await, StreamState::Idle);
    assert!(!sink.is_bound());
    assert!(controller.snapshot().await.notice.is_none());
}

#[tokio::test]
async fn test_stop_while_idle_is_noop() {
    let (api, _sink, controller) = setup(FakeApi::default());

    assert_eq!(controller.stop().await, StopOutcome::Ignored);
    assert!(api.stop_calls().is_empty());
}

#[tokio::test]
async fn test_stop_failure_is_swallowed() {
    let mut api = s1_active();
    api.stop_error = Some(ApiError::NotFound {
        detail: Some("not active".to_string()),
    });
    let (api, _sink, controller) = active_controller(api).await;

    assert_eq!(controller.stop().await, StopOutcome::Stopped(SessionId::from("s1")));

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.state, StreamState::Idle);
    assert!(snapshot.notice.is_none());
    assert_eq!(api.stop_calls().len(), 1);
    assert!(!controller.is_stopping());
}

#[tokio::test]
async fn test_concurrent_stop_sources_issue_one_request() {
    let gate = Arc::new(Notify::new());
    let mut api = s1_active();
    api.stop_gate = Some(gate.clone());
    let (api, sink, controller) = active_controller(api).await;

    let first = tokio::spawn({
        let controller = controller.clone();
        async move { controller.stop().await }
    });
    api.stop_entered.notified().await;

    // Stop request is in flight: sink already unbound, toggles disabled
    assert!(!sink.is_bound());
    assert!(controller.is_stopping());
    assert_eq!(
        controller.state().await,
        StreamState::Stopping(SessionId::from("s1"))
    );
    assert!(!presentation::render(&controller.snapshot().await).button_enabled);

    assert_eq!(controller.stop().await, StopOutcome::Ignored);
    assert!(controller
        .handle_stream_error(&SessionId::from("s1"), 1)
        .await
        .is_none());

    gate.notify_one();
    assert_eq!(first.await.unwrap(), StopOutcome::Stopped(SessionId::from("s1")));

    assert_eq!(api.stop_calls(), vec![SessionId::from("s1")]);
    assert_eq!(*api.probe_calls.lock().unwrap(), 0);
    assert_eq!(controller.state().await, StreamState::Idle);
}

// ============================================================================
// Stream failure recovery
// ============================================================================

#[tokio::test]
async fn test_stream_error_stops_session_and_reports_probe_detail() {
    let mut api = s1_active();
    api.probe_detail = Some("camera not available".to_string());
    let (api, sink, controller) = active_controller(api).await;

    let error = controller
        .handle_stream_error(&SessionId::from("s1"), sink.binding())
        .await
        .expect("failure should be handled");

    assert!(matches!(error, ApiError::Stream { .. }));
    assert_eq!(error.message(), "camera not available");
    assert_eq!(api.stop_calls(), vec![SessionId::from("s1")]);
    assert_eq!(*api.probe_calls.lock().unwrap(), 1);
    assert!(!sink.is_bound());

    let view = presentation::render(&controller.snapshot().await);
    assert_eq!(view.button_label, "Start");
    assert_eq!(view.dialog.as_deref(), Some("camera not available"));
}

#[tokio::test]
async fn test_stream_error_without_probe_detail_uses_fallback() {
    let (_api, sink, controller) = active_controller(s1_active()).await;

    let error = controller
        .handle_stream_error(&SessionId::from("s1"), sink.binding())
        .await
        .unwrap();

    assert_eq!(error.message(), "Camera not available");
    assert_eq!(
        controller.snapshot().await.notice.as_deref(),
        Some("Camera not available")
    );
}

#[tokio::test]
async fn test_stale_stream_error_is_ignored() {
    let (api, sink, controller) = active_controller(s1_active()).await;

    assert!(controller
        .handle_stream_error(&SessionId::from("old"), sink.binding())
        .await
        .is_none());

    assert_eq!(controller.state().await, StreamState::Active(SessionId::from("s1")));
    assert!(sink.is_bound());
    assert!(api.stop_calls().is_empty());
}

#[tokio::test]
async fn test_stream_error_while_idle_is_ignored() {
    let (api, _sink, controller) = setup(FakeApi::default());

    assert!(controller
        .handle_stream_error(&SessionId::from("s1"), 1)
        .await
        .is_none());
    assert!(api.stop_calls().is_empty());
}

#[tokio::test]
async fn test_watch_routes_sink_failures_into_recovery() {
    let (api, sink, controller) = active_controller(s1_active()).await;
    let (tx, rx) = mpsc::channel(4);
    let watcher = tokio::spawn(controller.clone().watch(rx));

    tx.send(SinkEvent::Failed {
        session_id: SessionId::from("s1"),
        binding: sink.binding(),
        reason: "stream ended".to_string(),
    })
    .await
    .unwrap();

    wait_for_state(&controller, StreamState::Idle).await;
    drop(tx);
    watcher.await.unwrap();

    assert_eq!(api.stop_calls(), vec![SessionId::from("s1")]);
}

#[tokio::test]
async fn test_failure_from_previous_binding_does_not_stop_readopted_session() {
    let (api, sink, controller) = active_controller(s1_active()).await;
    let first = sink.binding();

    // Failure queued by the first binding, delivered after leave + re-entry
    controller.leave().await;
    controller.enter().await.unwrap();
    let second = sink.binding();
    assert_ne!(first, second);

    assert!(controller
        .handle_stream_error(&SessionId::from("s1"), first)
        .await
        .is_none());
    assert_eq!(controller.state().await, StreamState::Active(SessionId::from("s1")));
    assert!(sink.is_bound());
    assert!(api.stop_calls().is_empty());

    assert!(controller
        .handle_stream_error(&SessionId::from("s1"), second)
        .await
        .is_some());
    assert_eq!(controller.state().await, StreamState::Idle);
    assert_eq!(api.stop_calls(), vec![SessionId::from("s1")]);
}

#[tokio::test]
async fn test_stale_sink_event_through_watch_is_ignored() {
    let (api, sink, controller) = active_controller(s1_active()).await;
    let stale = sink.binding();
    controller.leave().await;
    controller.enter().await.unwrap();

    let (tx, rx) = mpsc::channel(4);
    let watcher = tokio::spawn(controller.clone().watch(rx));
    tx.send(SinkEvent::Failed {
        session_id: SessionId::from("s1"),
        binding: stale,
        reason: "aborted".to_string(),
    })
    .await
    .unwrap();
    drop(tx);
    watcher.await.unwrap();

    assert_eq!(controller.state().await, StreamState::Active(SessionId::from("s1")));
    assert!(api.stop_calls().is_empty());
}

#[tokio::test]
async fn test_leave_unbinds_without_stopping_backend_session() {
    let (api, sink, controller) = active_controller(s1_active()).await;

    controller.leave().await;

    assert!(!sink.is_bound());
    assert_eq!(controller.state().await, StreamState::Idle);
    assert!(api.stop_calls().is_empty());
}

async fn wait_for_state(controller: &StreamController, expected: StreamState) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if controller.state().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("controller did not reach expected state");
}
