//! Live media compositor
//!
//! Re-renders a video source onto an owned surface at a fixed cadence, mixes
//! any number of audio tracks into one, and records the merged stream in
//! time-sliced chunks while sources come and go.
//!
//! The entry point is [`recorder::RecordingController`].

pub mod assets;
pub mod audio;
pub mod capture;
pub mod config;
pub mod encoder;
pub mod media;
pub mod pipeline;
pub mod recorder;
pub mod utils;
pub mod workers;

pub use config::RecorderOptions;
pub use media::{MediaStream, MediaTrack};
pub use recorder::{RecordedBlob, RecordingController, RecordingEvent};
pub use utils::error::{RecorderError, RecorderResult};
