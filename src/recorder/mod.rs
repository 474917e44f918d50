//! Recording sessions and their artifacts

pub mod blob;
pub mod controller;

pub use blob::RecordedBlob;
pub use controller::{RecordingController, RecordingControllerBuilder, RecordingEvent};
