//! Media tracks and the sources that feed them

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use uuid::Uuid;

use crate::pipeline::types::{TrackKind, VideoFrame};

/// Producer of video frames behind a video track
///
/// Sources are polled: whoever consumes the track asks for the frame that is
/// current at that instant. A source may deliver frames at any rate.
pub trait VideoSource: Send + Sync {
    /// The latest frame, if the source has produced one
    fn current_frame(&self) -> Option<VideoFrame>;

    /// Called once when the owning track is stopped
    fn stop(&self) {}
}

/// Producer of interleaved f32 samples behind an audio track
pub trait AudioSource: Send + Sync {
    /// Fill `out` with interleaved samples and return how many were written.
    ///
    /// Returning fewer samples than requested means the source had nothing more
    /// to give; the caller must not assume the tail of `out` was touched.
    fn read(&self, out: &mut [f32]) -> usize;

    /// Called once when the owning track is stopped
    fn stop(&self) {}
}

/// Negotiated parameters of a track
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackSettings {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

impl TrackSettings {
    pub fn video(width: u32, height: u32, frame_rate: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            frame_rate: Some(frame_rate),
            ..Default::default()
        }
    }

    pub fn audio(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate: Some(sample_rate),
            channels: Some(channels),
            ..Default::default()
        }
    }
}

#[derive(Clone)]
enum TrackSource {
    Video(Arc<dyn VideoSource>),
    Audio(Arc<dyn AudioSource>),
}

struct TrackInner {
    id: String,
    label: String,
    settings: TrackSettings,
    source: TrackSource,
    ended: AtomicBool,
}

/// A single-medium channel with a stable id
///
/// Cloning yields another handle to the same track: stopping any clone ends
/// the track for every holder.
#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    /// Create a live video track
    pub fn video(
        label: impl Into<String>,
        settings: TrackSettings,
        source: Arc<dyn VideoSource>,
    ) -> Self {
        Self::with_source(label.into(), settings, TrackSource::Video(source))
    }

    /// Create a live audio track
    pub fn audio(
        label: impl Into<String>,
        settings: TrackSettings,
        source: Arc<dyn AudioSource>,
    ) -> Self {
        Self::with_source(label.into(), settings, TrackSource::Audio(source))
    }

    fn with_source(label: String, settings: TrackSettings, source: TrackSource) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                id: Uuid::new_v4().to_string(),
                label,
                settings,
                source,
                ended: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn kind(&self) -> TrackKind {
        match self.inner.source {
            TrackSource::Video(_) => TrackKind::Video,
            TrackSource::Audio(_) => TrackKind::Audio,
        }
    }

    pub fn settings(&self) -> &TrackSettings {
        &self.inner.settings
    }

    pub fn is_live(&self) -> bool {
        !self.inner.ended.load(Ordering::Acquire)
    }

    /// End the track. Returns `true` only for the call that actually ended it.
    pub fn stop(&self) -> bool {
        if self.inner.ended.swap(true, Ordering::AcqRel) {
            return false;
        }
        match &self.inner.source {
            TrackSource::Video(source) => source.stop(),
            TrackSource::Audio(source) => source.stop(),
        }
        debug!("Track {} ({}) stopped", self.inner.id, self.kind());
        true
    }

    /// Current frame of a live video track
    pub fn read_frame(&self) -> Option<VideoFrame> {
        if !self.is_live() {
            return None;
        }
        match &self.inner.source {
            TrackSource::Video(source) => source.current_frame(),
            TrackSource::Audio(_) => None,
        }
    }

    /// Pull samples from a live audio track; ended or video tracks yield nothing
    pub fn read_samples(&self, out: &mut [f32]) -> usize {
        if !self.is_live() {
            return 0;
        }
        match &self.inner.source {
            TrackSource::Audio(source) => source.read(out).min(out.len()),
            TrackSource::Video(_) => 0,
        }
    }

    /// Whether both handles refer to the same track
    pub fn same_track(&self, other: &MediaTrack) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for MediaTrack {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for MediaTrack {}

impl std::fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.kind())
            .field("label", &self.inner.label)
            .field("live", &self.is_live())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::synthetic::{SilenceSource, SolidColorSource};

    #[test]
    fn test_stop_is_idempotent() {
        let track = MediaTrack::audio(
            "silence",
            TrackSettings::audio(48_000, 2),
            Arc::new(SilenceSource),
        );
        let clone = track.clone();

        assert!(track.is_live());
        assert!(clone.stop());
        assert!(!track.stop());
        assert!(!track.is_live());

        let mut buf = [1.0f32; 8];
        assert_eq!(track.read_samples(&mut buf), 0);
    }

    #[test]
    fn test_kind_and_reads() {
        let video = MediaTrack::video(
            "red",
            TrackSettings::video(2, 2, 30),
            Arc::new(SolidColorSource::new(2, 2, [255, 0, 0, 255])),
        );
        assert_eq!(video.kind(), TrackKind::Video);
        assert!(video.read_frame().is_some());

        let mut buf = [0.0f32; 4];
        assert_eq!(video.read_samples(&mut buf), 0);

        video.stop();
        assert!(video.read_frame().is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = MediaTrack::audio("a", TrackSettings::default(), Arc::new(SilenceSource));
        let b = MediaTrack::audio("b", TrackSettings::default(), Arc::new(SilenceSource));
        assert_ne!(a.id(), b.id());
        assert_eq!(a, a.clone());
        assert!(a.same_track(&a.clone()));
    }
}
