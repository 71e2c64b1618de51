use super::mjpeg::MjpegDecoder;
use crate::api::{SessionId, Url};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::StreamExt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Reported by a sink when its bound feed dies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Failed {
        session_id: SessionId,
        /// Generation passed to `bind`; identifies the binding that died
        binding: u64,
        reason: String,
    },
}

/// Receiver of the live detection feed.
///
/// Binding is the only point where frames start flowing; unbinding is the
/// only way to stop them. A sink must not report failures for a binding that
/// has already been replaced or removed; every failure carries the
/// `binding` generation it was bound with.
pub trait StreamSink: Send + Sync {
    fn bind(&self, session_id: &SessionId, binding: u64, url: Url);

    fn unbind(&self);

    fn is_bound(&self) -> bool;
}

/// A decoded JPEG from the feed
#[derive(Debug, Clone)]
pub struct Frame {
    pub session_id: SessionId,
    pub sequence: u64,
    pub received_at: DateTime<Utc>,
    pub jpeg: Vec<u8>,
}

/// Latest frame shared between the sink and whoever displays it
#[derive(Debug, Clone, Default)]
pub struct FrameStore {
    latest: Arc<Mutex<Option<Frame>>>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<Frame> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, session_id: &SessionId, jpeg: Vec<u8>) -> u64 {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        let sequence = latest.as_ref().map(|f| f.sequence + 1).unwrap_or(0);
        *latest = Some(Frame {
            session_id: session_id.clone(),
            sequence,
            received_at: Utc::now(),
            jpeg,
        });
        sequence
    }

    fn clear(&self) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Sink that pulls `multipart/x-mixed-replace` JPEG over HTTP, one task per binding
pub struct MjpegSink {
    http: reqwest::Client,
    frames: FrameStore,
    events: mpsc::Sender<SinkEvent>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MjpegSink {
    pub fn new(frames: FrameStore, events: mpsc::Sender<SinkEvent>) -> Result<Self> {
        // No overall timeout: the feed is expected to run indefinitely
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build stream HTTP client")?;

        Ok(Self {
            http,
            frames,
            events,
            task: Mutex::new(None),
        })
    }

    pub fn frames(&self) -> &FrameStore {
        &self.frames
    }

    async fn pump(
        http: reqwest::Client,
        url: Url,
        session_id: SessionId,
        binding: u64,
        frames: FrameStore,
        events: mpsc::Sender<SinkEvent>,
    ) {
        let reason = match Self::read_feed(&http, url, &session_id, &frames).await {
            Ok(()) => "stream ended".to_string(),
            Err(e) => format!("{:#}", e),
        };

        warn!("Stream for session {} failed: {}", session_id, reason);

        if events
            .send(SinkEvent::Failed {
                session_id,
                binding,
                reason,
            })
            .await
            .is_err()
        {
            debug!("No listener for sink events");
        }
    }

    async fn read_feed(
        http: &reqwest::Client,
        url: Url,
        session_id: &SessionId,
        frames: &FrameStore,
    ) -> Result<()> {
        let response = http
            .get(url)
            .send()
            .await
            .context("Failed to connect to detection stream")?;

        let status = response.status();
        if !status.is_success() {
            bail!("detection stream answered {}", status);
        }

        let mut body = response.bytes_stream();
        let mut decoder = MjpegDecoder::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.context("Failed to read detection stream")?;
            for jpeg in decoder.push(&chunk) {
                let sequence = frames.publish(session_id, jpeg);
                if sequence == 0 {
                    info!("First frame received for session {}", session_id);
                }
            }
        }

        Ok(())
    }
}

impl StreamSink for MjpegSink {
    fn bind(&self, session_id: &SessionId, binding: u64, url: Url) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = task.take() {
            old.abort();
        }
        self.frames.clear();

        info!(
            "Binding stream sink to session {} (binding {})",
            session_id, binding
        );

        *task = Some(tokio::spawn(Self::pump(
            self.http.clone(),
            url,
            session_id.clone(),
            binding,
            self.frames.clone(),
            self.events.clone(),
        )));
    }

    fn unbind(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = task.take() {
            info!("Unbinding stream sink");
            old.abort();
        }
        self.frames.clear();
    }

    fn is_bound(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for MjpegSink {
    fn drop(&mut self) {
        if let Some(task) = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}
