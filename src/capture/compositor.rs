//! Drawable surface and the compositor that repaints it from a source stream

use std::sync::Arc;
use std::time::Instant;

use log::debug;
use parking_lot::RwLock;

use crate::assets::{FALLBACK_HEIGHT, FALLBACK_WIDTH};
use crate::media::{MediaStream, MediaTrack, TrackSettings, VideoSource};
use crate::pipeline::health::RecorderHealth;
use crate::pipeline::types::{Timestamp, VideoFrame};
use crate::utils::error::{RecorderError, RecorderResult};

/// In-memory RGBA8 raster that can be redrawn repeatedly
#[derive(Debug, Default)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Resize the surface. Like a canvas, resizing wipes the content.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels = vec![0; (width as usize) * (height as usize) * 4];
    }

    /// Reset every pixel to transparent black
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Paint `frame` over the whole surface, nearest-neighbour scaled.
    ///
    /// Returns false when nothing could be drawn (empty surface or malformed
    /// frame).
    pub fn draw(&mut self, frame: &VideoFrame) -> bool {
        let (dw, dh) = (self.width as usize, self.height as usize);
        let (sw, sh) = (frame.width as usize, frame.height as usize);
        if dw == 0 || dh == 0 || sw == 0 || sh == 0 || frame.data.len() < sw * sh * 4 {
            return false;
        }

        if (sw, sh) == (dw, dh) {
            self.pixels.copy_from_slice(&frame.data[..dw * dh * 4]);
            return true;
        }

        for y in 0..dh {
            let sy = y * sh / dh;
            let src_row = &frame.data[sy * sw * 4..(sy + 1) * sw * 4];
            let dst_row = &mut self.pixels[y * dw * 4..(y + 1) * dw * 4];
            for x in 0..dw {
                let sx = x * sw / dw;
                dst_row[x * 4..x * 4 + 4].copy_from_slice(&src_row[sx * 4..sx * 4 + 4]);
            }
        }
        true
    }

    /// Copy of the current content, `None` while the surface has no area
    pub fn snapshot(&self, pts: Timestamp) -> Option<VideoFrame> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        Some(VideoFrame {
            width: self.width,
            height: self.height,
            data: self.pixels.clone().into(),
            pts,
        })
    }
}

/// Video source reading straight from a shared surface
struct SurfaceSource {
    surface: Arc<RwLock<Surface>>,
    started: Instant,
}

impl VideoSource for SurfaceSource {
    fn current_frame(&self) -> Option<VideoFrame> {
        let pts = Timestamp::from_duration(self.started.elapsed());
        self.surface.read().snapshot(pts)
    }
}

/// Owns the drawable surface and the stream it is painted from
///
/// Tracks captured from the compositor read the surface itself, so swapping
/// the source or resizing the surface is visible through tracks issued
/// before the swap.
pub struct FrameCompositor {
    surface: Arc<RwLock<Surface>>,
    source: Option<MediaStream>,
    captured: Vec<MediaTrack>,
    health: Arc<RecorderHealth>,
}

impl FrameCompositor {
    pub fn new(health: Arc<RecorderHealth>) -> Self {
        Self {
            surface: Arc::new(RwLock::new(Surface::new())),
            source: None,
            captured: Vec::new(),
            health,
        }
    }

    /// Use the first video track of `stream` as render source and size the
    /// surface to it
    pub fn attach_source(&mut self, stream: &MediaStream) -> RecorderResult<(u32, u32)> {
        let track = first_video_track(stream).ok_or_else(|| {
            RecorderError::InvalidArgument("attachSource: video track is missing".into())
        })?;

        let (width, height) = negotiated_size(track);
        self.surface.write().resize(width, height);
        self.source = Some(stream.clone());

        debug!(
            "FrameCompositor: source {} ({}) attached ({}x{})",
            track.id(),
            track.label(),
            width,
            height
        );
        Ok((width, height))
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    fn source_track(&self) -> Option<&MediaTrack> {
        self.source.as_ref().and_then(first_video_track)
    }

    /// Copy the source's current frame onto the surface
    pub fn draw_frame(&self) -> bool {
        let frame = match self.source_track().and_then(MediaTrack::read_frame) {
            Some(frame) => frame,
            None => {
                self.health.record_compose(false);
                return false;
            }
        };
        let drawn = self.surface.write().draw(&frame);
        self.health.record_compose(drawn);
        drawn
    }

    /// Expose the surface as a new video track
    pub fn capture_stream(&mut self, frame_rate: u32) -> MediaTrack {
        let (width, height) = self.surface_size();
        let track = MediaTrack::video(
            "surface-capture",
            TrackSettings::video(width, height, frame_rate),
            Arc::new(SurfaceSource {
                surface: Arc::clone(&self.surface),
                started: Instant::now(),
            }),
        );
        self.captured.push(track.clone());
        track
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.surface.read().size()
    }

    pub fn snapshot(&self) -> Option<VideoFrame> {
        self.surface.read().snapshot(Timestamp::default())
    }

    pub fn clear(&self) {
        self.surface.write().clear();
    }

    /// Stop every track captured from the surface; returns how many were live
    pub fn stop_captured(&mut self) -> usize {
        self.captured.drain(..).filter(|track| track.stop()).count()
    }

    /// Stop the source stream's tracks and forget it
    pub fn release_source(&mut self) {
        if let Some(stream) = self.source.take() {
            stream.stop_all();
        }
    }
}

/// First live video track, else the first video track at all
fn first_video_track(stream: &MediaStream) -> Option<&MediaTrack> {
    stream
        .video_tracks()
        .find(|track| track.is_live())
        .or_else(|| stream.video_tracks().next())
}

/// Size advertised by the track, else the size of its current frame
fn negotiated_size(track: &MediaTrack) -> (u32, u32) {
    let settings = track.settings();
    match (settings.width, settings.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => track
            .read_frame()
            .map(|frame| (frame.width, frame.height))
            .filter(|(w, h)| *w > 0 && *h > 0)
            .unwrap_or((FALLBACK_WIDTH, FALLBACK_HEIGHT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::synthetic::{LatestFrameSource, SolidColorSource};

    fn solid_stream(width: u32, height: u32, rgba: [u8; 4]) -> MediaStream {
        MediaStream::from_tracks([MediaTrack::video(
            "solid",
            TrackSettings::video(width, height, 30),
            Arc::new(SolidColorSource::new(width, height, rgba)),
        )])
    }

    #[test]
    fn test_surface_scaling() {
        let mut surface = Surface::new();
        surface.resize(4, 4);

        let mut data = Vec::new();
        data.extend_from_slice(&[1, 1, 1, 255, 2, 2, 2, 255]);
        data.extend_from_slice(&[3, 3, 3, 255, 4, 4, 4, 255]);
        let frame = VideoFrame {
            width: 2,
            height: 2,
            data: data.into(),
            pts: Timestamp::default(),
        };

        assert!(surface.draw(&frame));
        let snap = surface.snapshot(Timestamp::default()).unwrap();
        assert_eq!(snap.pixel(0, 0), Some([1, 1, 1, 255]));
        assert_eq!(snap.pixel(3, 0), Some([2, 2, 2, 255]));
        assert_eq!(snap.pixel(0, 3), Some([3, 3, 3, 255]));
        assert_eq!(snap.pixel(3, 3), Some([4, 4, 4, 255]));
    }

    #[test]
    fn test_surface_rejects_short_frame() {
        let mut surface = Surface::new();
        surface.resize(2, 2);
        let frame = VideoFrame {
            width: 2,
            height: 2,
            data: vec![0u8; 3].into(),
            pts: Timestamp::default(),
        };
        assert!(!surface.draw(&frame));
        assert!(Surface::new().snapshot(Timestamp::default()).is_none());
    }

    #[test]
    fn test_attach_requires_video() {
        let mut compositor = FrameCompositor::new(Arc::new(RecorderHealth::new()));
        let err = compositor.attach_source(&MediaStream::new()).unwrap_err();
        assert!(matches!(err, RecorderError::InvalidArgument(_)));
        assert!(!compositor.has_source());
    }

    #[test]
    fn test_captured_track_follows_source_swap() {
        let health = Arc::new(RecorderHealth::new());
        let mut compositor = FrameCompositor::new(Arc::clone(&health));

        compositor.attach_source(&solid_stream(4, 2, [255, 0, 0, 255])).unwrap();
        let track = compositor.capture_stream(25);
        assert!(compositor.draw_frame());
        assert_eq!(track.read_frame().unwrap().pixel(0, 0), Some([255, 0, 0, 255]));

        compositor.attach_source(&solid_stream(8, 6, [0, 0, 255, 255])).unwrap();
        assert!(compositor.draw_frame());
        let frame = track.read_frame().unwrap();
        assert_eq!((frame.width, frame.height), (8, 6));
        assert_eq!(frame.pixel(7, 5), Some([0, 0, 255, 255]));
        assert_eq!(health.frames_composed(), 2);
    }

    #[test]
    fn test_size_falls_back_to_frame_then_default() {
        let pushed = Arc::new(LatestFrameSource::new());
        let stream = MediaStream::from_tracks([MediaTrack::video(
            "pushed",
            TrackSettings::default(),
            pushed.clone(),
        )]);

        let mut compositor = FrameCompositor::new(Arc::new(RecorderHealth::new()));
        assert_eq!(
            compositor.attach_source(&stream).unwrap(),
            (FALLBACK_WIDTH, FALLBACK_HEIGHT)
        );
        // nothing pushed yet: the tick is a miss
        assert!(!compositor.draw_frame());

        pushed.push(VideoFrame::solid(6, 4, [9, 9, 9, 255], Timestamp::default()));
        assert_eq!(compositor.attach_source(&stream).unwrap(), (6, 4));
    }

    #[test]
    fn test_release_stops_everything() {
        let mut compositor = FrameCompositor::new(Arc::new(RecorderHealth::new()));
        let stream = solid_stream(2, 2, [1, 2, 3, 255]);
        compositor.attach_source(&stream).unwrap();
        let captured = compositor.capture_stream(25);
        compositor.draw_frame();

        compositor.clear();
        assert_eq!(compositor.snapshot().unwrap().pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(compositor.stop_captured(), 1);
        assert_eq!(compositor.stop_captured(), 0);
        compositor.release_source();

        assert!(!captured.is_live());
        assert!(stream.tracks().iter().all(|t| !t.is_live()));
        assert!(!compositor.has_source());
    }
}
