use crate::stream::{FrameStore, StreamController};
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Stream page controller (one per running client)
    pub controller: Arc<StreamController>,

    /// Latest frame from the bound feed
    pub frames: FrameStore,

    /// Exam mode used when a start request does not say
    pub exam_default: bool,
}

impl AppState {
    pub fn new(controller: Arc<StreamController>, frames: FrameStore) -> Self {
        Self {
            controller,
            frames,
            exam_default: false,
        }
    }

    pub fn with_exam_default(mut self, exam: bool) -> Self {
        self.exam_default = exam;
        self
    }
}
