//! Media model: tracks, streams and the sources that feed them

pub mod stream;
pub mod synthetic;
pub mod track;

pub use stream::MediaStream;
pub use track::{AudioSource, MediaTrack, TrackSettings, VideoSource};
