//! Live detection stream
//!
//! This module provides the `StreamController` that manages:
//! - Starting and stopping the backend detection session
//! - Binding the stream sink to the session's MJPEG feed
//! - Recovering from feed failures by stopping the session
//! - Re-syncing with the backend on page entry

mod controller;
pub mod mjpeg;
mod sink;
mod state;

pub use controller::{StreamController, START_FAILED_MESSAGE};
pub use sink::{Frame, FrameStore, MjpegSink, SinkEvent, StreamSink};
pub use state::{StartOutcome, StopOutcome, StreamSnapshot, StreamState};
