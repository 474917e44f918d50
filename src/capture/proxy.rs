//! Video source proxy
//!
//! Re-renders an incoming video track onto an owned surface at a fixed
//! cadence and exposes the surface as a steady video track, so the recorder
//! never sees the source's own (possibly irregular) frame delivery.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::assets::{CANVAS_FRAME_RATE, PACING_INTERVAL_MS};
use crate::capture::compositor::FrameCompositor;
use crate::media::{MediaStream, MediaTrack};
use crate::pipeline::clock::PacingClock;
use crate::pipeline::health::RecorderHealth;
use crate::utils::error::{RecorderError, RecorderResult};

/// Proxy session guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxySession {
    #[default]
    Inactive,
    Active {
        width: u32,
        height: u32,
        started_at: Instant,
    },
}

impl ProxySession {
    pub fn is_active(&self) -> bool {
        matches!(self, ProxySession::Active { .. })
    }
}

pub struct VideoSourceProxy {
    compositor: Arc<Mutex<FrameCompositor>>,
    clock: PacingClock,
    session: ProxySession,
    render_task: Option<JoinHandle<()>>,
    frame_rate: u32,
}

impl VideoSourceProxy {
    pub fn new(health: Arc<RecorderHealth>) -> Self {
        Self::with_timing(
            Duration::from_millis(PACING_INTERVAL_MS),
            CANVAS_FRAME_RATE,
            health,
        )
    }

    pub fn with_timing(
        pacing_interval: Duration,
        frame_rate: u32,
        health: Arc<RecorderHealth>,
    ) -> Self {
        Self {
            compositor: Arc::new(Mutex::new(FrameCompositor::new(Arc::clone(&health)))),
            clock: PacingClock::new(pacing_interval, health),
            session: ProxySession::Inactive,
            render_task: None,
            frame_rate,
        }
    }

    pub fn session(&self) -> ProxySession {
        self.session
    }

    pub fn is_active(&self) -> bool {
        self.session.is_active()
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.compositor.lock().surface_size()
    }

    /// Start a session over `stream` and return the track captured from the
    /// surface
    ///
    /// Must be called from within a tokio runtime: the redraw loop runs as a
    /// task on it.
    pub fn create_canvas_stream(&mut self, stream: &MediaStream) -> RecorderResult<MediaTrack> {
        if self.session.is_active() {
            return Err(RecorderError::AlreadyActive("createCanvasStream"));
        }
        let has_live_video = stream.video_tracks().any(MediaTrack::is_live);
        if !has_live_video {
            return Err(RecorderError::InvalidArgument(
                "createCanvasStream: video track is missing".into(),
            ));
        }
        let handle = Handle::try_current().map_err(|e| {
            RecorderError::Runtime(format!("createCanvasStream needs a tokio runtime: {}", e))
        })?;

        let (width, height, track) = {
            let mut compositor = self.compositor.lock();
            let (width, height) = compositor.attach_source(stream)?;
            compositor.draw_frame();
            (width, height, compositor.capture_stream(self.frame_rate))
        };

        let mut ticks = self.clock.start();
        let compositor = Arc::clone(&self.compositor);
        self.render_task = Some(handle.spawn(async move {
            while ticks.recv().await.is_some() {
                compositor.lock().draw_frame();
            }
            debug!("VideoSourceProxy: render loop finished");
        }));

        self.session = ProxySession::Active {
            width,
            height,
            started_at: Instant::now(),
        };
        info!(
            "VideoSourceProxy: canvas stream {} created ({}x{} @ {} fps)",
            track.id(),
            width,
            height,
            self.frame_rate
        );
        Ok(track)
    }

    /// Swap the render source of the running session in place
    pub fn replace_video_stream(&mut self, stream: &MediaStream) -> RecorderResult<()> {
        if !self.session.is_active() {
            return Err(RecorderError::NotActive("replaceVideoStream"));
        }
        if !stream.video_tracks().any(MediaTrack::is_live) {
            warn!("replaceVideoStream: no live video track, keeping current source");
            return Ok(());
        }

        let (width, height) = {
            let mut compositor = self.compositor.lock();
            let size = compositor.attach_source(stream)?;
            compositor.draw_frame();
            size
        };

        if let ProxySession::Active { started_at, .. } = self.session {
            self.session = ProxySession::Active {
                width,
                height,
                started_at,
            };
        }
        debug!("VideoSourceProxy: source replaced ({}x{})", width, height);
        Ok(())
    }

    /// Tear the session down. Calling it again is a no-op.
    pub fn release_canvas_stream(&mut self) {
        self.clock.end();
        if let Some(task) = self.render_task.take() {
            task.abort();
        }

        let was_active = self.session.is_active();
        self.session = ProxySession::Inactive;

        let mut compositor = self.compositor.lock();
        compositor.clear();
        let stopped = compositor.stop_captured();
        compositor.release_source();

        if was_active {
            info!(
                "VideoSourceProxy: canvas stream released ({} tracks stopped)",
                stopped
            );
        }
    }
}

impl Drop for VideoSourceProxy {
    fn drop(&mut self) {
        self.release_canvas_stream();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::TrackSettings;
    use crate::media::synthetic::{SolidColorSource, ToneSource};

    fn video_stream(width: u32, height: u32, rgba: [u8; 4]) -> MediaStream {
        MediaStream::from_tracks([MediaTrack::video(
            "camera",
            TrackSettings::video(width, height, 30),
            Arc::new(SolidColorSource::new(width, height, rgba)),
        )])
    }

    fn proxy() -> VideoSourceProxy {
        VideoSourceProxy::with_timing(
            Duration::from_millis(5),
            CANVAS_FRAME_RATE,
            Arc::new(RecorderHealth::new()),
        )
    }

    #[tokio::test]
    async fn test_second_create_is_rejected() {
        let mut proxy = proxy();
        let first = proxy
            .create_canvas_stream(&video_stream(4, 4, [10, 20, 30, 255]))
            .unwrap();
        assert_eq!(first.settings().frame_rate, Some(CANVAS_FRAME_RATE));

        let err = proxy
            .create_canvas_stream(&video_stream(4, 4, [0, 0, 0, 255]))
            .unwrap_err();
        assert!(matches!(err, RecorderError::AlreadyActive(_)));
        assert!(first.is_live());
        assert!(proxy.is_active());
    }

    #[tokio::test]
    async fn test_create_requires_live_video() {
        let mut proxy = proxy();
        let audio_only = MediaStream::from_tracks([MediaTrack::audio(
            "mic",
            TrackSettings::audio(48_000, 1),
            Arc::new(ToneSource::new(440.0, 0.5, 48_000, 1)),
        )]);
        let err = proxy.create_canvas_stream(&audio_only).unwrap_err();
        assert!(matches!(err, RecorderError::InvalidArgument(_)));

        let ended = video_stream(2, 2, [1, 1, 1, 255]);
        ended.stop_all();
        let err = proxy.create_canvas_stream(&ended).unwrap_err();
        assert!(matches!(err, RecorderError::InvalidArgument(_)));
        assert!(!proxy.is_active());
    }

    #[test]
    fn test_create_outside_runtime() {
        let mut proxy = proxy();
        let err = proxy
            .create_canvas_stream(&video_stream(2, 2, [1, 1, 1, 255]))
            .unwrap_err();
        assert!(matches!(err, RecorderError::Runtime(_)));
        assert!(!proxy.is_active());
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let mut proxy = proxy();
        let source = video_stream(4, 4, [10, 20, 30, 255]);
        let track = proxy.create_canvas_stream(&source).unwrap();

        proxy.release_canvas_stream();
        proxy.release_canvas_stream();

        assert!(!proxy.is_active());
        assert!(!track.is_live());
        assert!(source.tracks().iter().all(|t| !t.is_live()));

        // a new session can be started afterwards
        let again = proxy
            .create_canvas_stream(&video_stream(4, 4, [1, 2, 3, 255]))
            .unwrap();
        assert!(again.is_live());
    }

    #[tokio::test]
    async fn test_replace_updates_existing_track() {
        let mut proxy = proxy();
        let track = proxy
            .create_canvas_stream(&video_stream(4, 4, [255, 0, 0, 255]))
            .unwrap();
        assert_eq!(track.read_frame().unwrap().pixel(0, 0), Some([255, 0, 0, 255]));

        proxy
            .replace_video_stream(&video_stream(8, 2, [0, 255, 0, 255]))
            .unwrap();
        assert_eq!(proxy.surface_size(), (8, 2));

        let frame = track.read_frame().unwrap();
        assert_eq!((frame.width, frame.height), (8, 2));
        assert_eq!(frame.pixel(7, 1), Some([0, 255, 0, 255]));
    }

    #[tokio::test]
    async fn test_replace_without_video_keeps_session() {
        let mut proxy = proxy();
        proxy
            .create_canvas_stream(&video_stream(4, 4, [255, 0, 0, 255]))
            .unwrap();

        proxy.replace_video_stream(&MediaStream::new()).unwrap();
        assert!(proxy.is_active());
        assert_eq!(proxy.surface_size(), (4, 4));
    }

    #[tokio::test]
    async fn test_replace_with_ended_video_keeps_surface() {
        let mut proxy = proxy();
        let source = video_stream(4, 4, [255, 0, 0, 255]);
        let track = proxy.create_canvas_stream(&source).unwrap();

        let ended = video_stream(8, 2, [0, 255, 0, 255]);
        ended.stop_all();
        proxy.replace_video_stream(&ended).unwrap();

        assert!(proxy.is_active());
        assert_eq!(proxy.surface_size(), (4, 4));
        assert!(matches!(
            proxy.session(),
            ProxySession::Active { width: 4, height: 4, .. }
        ));
        assert!(source.tracks().iter().all(|t| t.is_live()));
        let frame = track.read_frame().unwrap();
        assert_eq!((frame.width, frame.height), (4, 4));
        assert_eq!(frame.pixel(3, 3), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_replace_requires_session() {
        let mut proxy = proxy();
        let err = proxy
            .replace_video_stream(&video_stream(2, 2, [1, 1, 1, 255]))
            .unwrap_err();
        assert!(matches!(err, RecorderError::NotActive(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_render_loop_follows_clock() {
        let health = Arc::new(RecorderHealth::new());
        let mut proxy = VideoSourceProxy::with_timing(
            Duration::from_millis(5),
            CANVAS_FRAME_RATE,
            Arc::clone(&health),
        );
        proxy
            .create_canvas_stream(&video_stream(2, 2, [5, 5, 5, 255]))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;
        proxy.release_canvas_stream();

        assert!(health.ticks_emitted() >= 2);
        // one synchronous draw at creation plus one per delivered tick
        assert!(health.frames_composed() >= 2);
    }
}
