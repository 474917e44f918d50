//! Core types shared by the capture, mixing and recording stages

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Timestamp representation for media frames and chunks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    /// Microseconds since the owning clock/recording started
    pub micros: i64,
}

impl Timestamp {
    /// Create a new timestamp from microseconds
    pub fn from_micros(micros: i64) -> Self {
        Self { micros }
    }

    /// Create a timestamp from a duration
    pub fn from_duration(duration: Duration) -> Self {
        Self {
            micros: duration.as_micros() as i64,
        }
    }

    /// Create timestamp from instant relative to base
    pub fn from_instant(instant: Instant, base: Instant) -> Self {
        let duration = instant.saturating_duration_since(base);
        Self::from_duration(duration)
    }

    /// Convert to duration (negative timestamps clamp to zero)
    pub fn as_duration(&self) -> Duration {
        Duration::from_micros(self.micros.max(0) as u64)
    }

    /// Calculate the absolute difference between two timestamps
    pub fn diff(&self, other: Timestamp) -> Duration {
        let diff_micros = (self.micros - other.micros).abs();
        Duration::from_micros(diff_micros as u64)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}µs", self.micros)
    }
}

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Video frames
    Video,
    /// Audio samples
    Audio,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Video => write!(f, "video"),
            TrackKind::Audio => write!(f, "audio"),
        }
    }
}

/// A single RGBA8 video frame
///
/// Pixel data is tightly packed, `width * height * 4` bytes, row-major.
#[derive(Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
    /// Presentation timestamp relative to the producing source
    pub pts: Timestamp,
}

impl VideoFrame {
    /// Create a frame filled with a single colour
    pub fn solid(width: u32, height: u32, rgba: [u8; 4], pts: Timestamp) -> Self {
        let pixels = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(pixels * 4);
        for _ in 0..pixels {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data: Bytes::from(data),
            pts,
        }
    }

    /// Get the size of the frame data in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Read the pixel at (x, y), if inside the frame
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y as usize) * (self.width as usize) + x as usize) * 4;
        let px = self.data.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

impl std::fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pts", &self.pts)
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_conversions() {
        let ts = Timestamp::from_duration(Duration::from_millis(40));
        assert_eq!(ts.micros, 40_000);
        assert_eq!(ts.as_duration(), Duration::from_millis(40));
        assert_eq!(Timestamp::from_micros(-5).as_duration(), Duration::ZERO);
        assert_eq!(
            ts.diff(Timestamp::from_micros(10_000)),
            Duration::from_millis(30)
        );
    }

    #[test]
    fn test_solid_frame_pixels() {
        let frame = VideoFrame::solid(4, 2, [10, 20, 30, 255], Timestamp::default());
        assert_eq!(frame.size(), 4 * 2 * 4);
        assert_eq!(frame.pixel(3, 1), Some([10, 20, 30, 255]));
        assert_eq!(frame.pixel(4, 0), None);
    }
}
