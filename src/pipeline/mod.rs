//! Pipeline building blocks shared by capture, mixing and recording
//!
//! - `clock`: background pacing thread that drives surface redraws
//! - `health`: lock-free counters for ticks, frames and chunks
//! - `state`: the recording session state machine
//! - `types`: timestamps, track kinds and video frames

pub mod clock;
pub mod health;
pub mod state;
pub mod types;

pub use clock::{ClockState, PacingClock, Tick};
pub use health::{HealthSummary, RecorderHealth};
pub use state::RecorderState;
pub use types::{Timestamp, TrackKind, VideoFrame};
