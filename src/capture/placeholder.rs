//! Synthetic video used when a recording starts without a camera or screen

use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::assets::{CANVAS_FRAME_RATE, FALLBACK_HEIGHT, FALLBACK_WIDTH};
use crate::media::synthetic::SolidColorSource;
use crate::media::{MediaTrack, TrackSettings};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderKind {
    #[default]
    Black,
    White,
    Color([u8; 4]),
}

impl PlaceholderKind {
    pub fn rgba(&self) -> [u8; 4] {
        match self {
            PlaceholderKind::Black => [0, 0, 0, 255],
            PlaceholderKind::White => [255, 255, 255, 255],
            PlaceholderKind::Color(rgba) => *rgba,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceholderOptions {
    pub kind: PlaceholderKind,
    pub width: u32,
    pub height: u32,
}

impl Default for PlaceholderOptions {
    fn default() -> Self {
        Self {
            kind: PlaceholderKind::Black,
            width: FALLBACK_WIDTH,
            height: FALLBACK_HEIGHT,
        }
    }
}

/// Provider of stand-in video tracks
pub trait PlaceholderSource: Send {
    fn get_track(&mut self, options: &PlaceholderOptions) -> MediaTrack;

    /// Stop whatever was handed out so far
    fn release(&mut self);
}

/// Constant-colour frames at the requested size
#[derive(Debug, Default)]
pub struct SolidColorPlaceholder {
    issued: Vec<MediaTrack>,
}

impl SolidColorPlaceholder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issued(&self) -> usize {
        self.issued.len()
    }
}

impl PlaceholderSource for SolidColorPlaceholder {
    fn get_track(&mut self, options: &PlaceholderOptions) -> MediaTrack {
        let width = options.width.max(1);
        let height = options.height.max(1);
        let track = MediaTrack::video(
            "placeholder",
            TrackSettings::video(width, height, CANVAS_FRAME_RATE),
            Arc::new(SolidColorSource::new(width, height, options.kind.rgba())),
        );
        debug!(
            "Placeholder track {} ({:?}, {}x{})",
            track.id(),
            options.kind,
            width,
            height
        );
        self.issued.push(track.clone());
        track
    }

    fn release(&mut self) {
        for track in self.issued.drain(..) {
            track.stop();
        }
    }
}
