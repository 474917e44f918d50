//! Receiver for video tracks that bypass the surface on `replace_stream`

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use parking_lot::Mutex;

use crate::media::MediaTrack;

pub trait PassthroughVideo: Send {
    fn replace_video_track(&mut self, track: &MediaTrack);
}

/// Keeps the most recent track handed over
///
/// Clones share the slot, so a caller can keep one handle and give another to
/// the controller.
#[derive(Debug, Clone, Default)]
pub struct PassthroughSlot {
    current: Arc<Mutex<Option<MediaTrack>>>,
    swaps: Arc<AtomicU64>,
}

impl PassthroughSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<MediaTrack> {
        self.current.lock().clone()
    }

    pub fn swap_count(&self) -> u64 {
        self.swaps.load(Ordering::Relaxed)
    }
}

impl PassthroughVideo for PassthroughSlot {
    fn replace_video_track(&mut self, track: &MediaTrack) {
        let previous = self.current.lock().replace(track.clone());
        self.swaps.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Passthrough video track {} -> {}",
            previous.as_ref().map(MediaTrack::id).unwrap_or("none"),
            track.id()
        );
    }
}
