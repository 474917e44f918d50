//! Recording session controller
//!
//! Routes an input stream's video through the [`VideoSourceProxy`] and its
//! audio through an [`AudioMixGraph`], records the merged target stream in
//! chunks and keeps the session consistent while sources are swapped.

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, watch};

use crate::assets::{DEFAULT_FILE_NAME, EVENT_CHANNEL_CAPACITY, MIXCAST_MIME_TYPE};
use crate::audio::AudioMixGraph;
use crate::capture::passthrough::{PassthroughSlot, PassthroughVideo};
use crate::capture::placeholder::{PlaceholderSource, SolidColorPlaceholder};
use crate::capture::proxy::VideoSourceProxy;
use crate::config::{DataAvailableHook, RecorderOptions};
use crate::encoder::recorder::{
    Chunk, ChunkedRecorder, RecorderEvent, RecorderFactory, StreamRecorderFactory,
};
use crate::media::{MediaStream, MediaTrack};
use crate::pipeline::health::RecorderHealth;
use crate::pipeline::state::RecorderState;
use crate::pipeline::types::TrackKind;
use crate::recorder::blob::RecordedBlob;
use crate::utils::error::{RecorderError, RecorderResult};
use crate::workers::export::{BlobExportSink, FileExportSink};

/// Notifications for observers of a controller
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingEvent {
    Started,
    DataAvailable { seq: u64, size: usize },
    Error(String),
    Stopped,
}

/// Recorder session, present while recording and while a stop drains
struct Session {
    recorder: Box<dyn ChunkedRecorder>,
    target: MediaStream,
    mime_type: String,
}

struct ControllerInner {
    state: RecorderState,
    state_tx: watch::Sender<RecorderState>,
    options: RecorderOptions,
    proxy: VideoSourceProxy,
    audio: Option<AudioMixGraph>,
    placeholder: Box<dyn PlaceholderSource>,
    passthrough: Box<dyn PassthroughVideo>,
    session: Option<Session>,
    chunks: Vec<Chunk>,
    chunk_mime: Option<String>,
}

impl ControllerInner {
    fn transition(&mut self, to: RecorderState) {
        if !self.state.can_transition_to(&to) {
            warn!("RecordingController: unexpected transition {} -> {}", self.state, to);
        }
        debug!("RecordingController: {} -> {}", self.state, to);
        self.state = to;
        self.state_tx.send_replace(to);
    }

    fn require_recording(&self, op: &'static str) -> RecorderResult<()> {
        if self.state.is_recording() {
            return Ok(());
        }
        let err = RecorderError::NotActive(op);
        error!("{}", err);
        Err(err)
    }

    /// Build the target stream out of `stream`
    fn compose(&mut self, stream: &MediaStream) -> RecorderResult<MediaStream> {
        let video_source = if stream.has_video() {
            MediaStream::from_tracks(stream.video_tracks().cloned())
        } else {
            info!("RecordingController: no video track, using placeholder");
            MediaStream::from_tracks([self.placeholder.get_track(&self.options.placeholder)])
        };
        let video = self.proxy.create_canvas_stream(&video_source)?;

        let mut graph = AudioMixGraph::new(self.options.sample_rate, self.options.channels)?;
        for track in stream.audio_tracks() {
            if let Err(e) = graph.add_track(track) {
                warn!("RecordingController: skipping audio track {}: {}", track.id(), e);
            }
        }
        let audio = graph
            .output_track()
            .ok_or(RecorderError::NotActive("start"))?;
        self.audio = Some(graph);

        Ok(MediaStream::from_tracks([video, audio]))
    }

    /// Release video and audio resources. Safe to call repeatedly.
    fn release_media(&mut self) {
        self.placeholder.release();
        self.proxy.release_canvas_stream();
        if let Some(mut graph) = self.audio.take() {
            graph.reset_all();
        }
    }

    /// Abort a `start` that did not reach `Recording`
    fn abort_start(&mut self, target: Option<&MediaStream>) {
        self.release_media();
        if let Some(target) = target {
            target.stop_all();
        }
        self.transition(RecorderState::Idle);
    }

    /// Teardown once the recorder reported its last chunk
    fn finish_session(&mut self) {
        if self.state.is_recording() {
            // the recorder ended on its own
            self.transition(RecorderState::Stopped);
        }
        self.release_media();
        if let Some(session) = self.session.take() {
            session.target.stop_all();
            debug!(
                "RecordingController: session ({}) closed with {} chunks kept",
                session.mime_type,
                self.chunks.len()
            );
        }
        self.transition(RecorderState::Idle);
    }
}

/// Rolls a composed `start` back to `Idle` unless disarmed, also when the
/// `start` future is dropped while the recorder is being created
struct StartGuard {
    inner: Arc<Mutex<ControllerInner>>,
    target: MediaStream,
    armed: bool,
}

impl StartGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StartGuard {
    fn drop(&mut self) {
        if self.armed {
            warn!("RecordingController: start abandoned, rolling back");
            self.inner.lock().abort_start(Some(&self.target));
        }
    }
}

/// Builder for [`RecordingController`] with replaceable collaborators
pub struct RecordingControllerBuilder {
    options: RecorderOptions,
    placeholder: Option<Box<dyn PlaceholderSource>>,
    passthrough: Option<Box<dyn PassthroughVideo>>,
    factory: Option<Arc<dyn RecorderFactory>>,
    export_sink: Option<Arc<dyn BlobExportSink>>,
}

impl RecordingControllerBuilder {
    pub fn placeholder(mut self, placeholder: impl PlaceholderSource + 'static) -> Self {
        self.placeholder = Some(Box::new(placeholder));
        self
    }

    pub fn passthrough(mut self, passthrough: impl PassthroughVideo + 'static) -> Self {
        self.passthrough = Some(Box::new(passthrough));
        self
    }

    pub fn recorder_factory(mut self, factory: impl RecorderFactory + 'static) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn export_sink(mut self, sink: impl BlobExportSink + 'static) -> Self {
        self.export_sink = Some(Arc::new(sink));
        self
    }

    pub fn build(self) -> RecordingController {
        let health = Arc::new(RecorderHealth::new());
        let (state_tx, state_rx) = watch::channel(RecorderState::Idle);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let proxy = VideoSourceProxy::with_timing(
            self.options.pacing_interval(),
            self.options.frame_rate,
            Arc::clone(&health),
        );

        let inner = ControllerInner {
            state: RecorderState::Idle,
            state_tx,
            options: self.options,
            proxy,
            audio: None,
            placeholder: self
                .placeholder
                .unwrap_or_else(|| Box::new(SolidColorPlaceholder::new())),
            passthrough: self
                .passthrough
                .unwrap_or_else(|| Box::new(PassthroughSlot::new())),
            session: None,
            chunks: Vec::new(),
            chunk_mime: None,
        };

        RecordingController {
            inner: Arc::new(Mutex::new(inner)),
            state_rx,
            events,
            factory: self
                .factory
                .unwrap_or_else(|| Arc::new(StreamRecorderFactory)),
            export_sink: self
                .export_sink
                .unwrap_or_else(|| Arc::new(FileExportSink::default())),
            health,
        }
    }
}

/// Recording session state machine
///
/// `start` is the only suspending operation; everything else is synchronous
/// and guarded by the current [`RecorderState`].
pub struct RecordingController {
    inner: Arc<Mutex<ControllerInner>>,
    state_rx: watch::Receiver<RecorderState>,
    events: broadcast::Sender<RecordingEvent>,
    factory: Arc<dyn RecorderFactory>,
    export_sink: Arc<dyn BlobExportSink>,
    health: Arc<RecorderHealth>,
}

impl RecordingController {
    pub fn new(options: RecorderOptions) -> Self {
        Self::builder(options).build()
    }

    pub fn builder(options: RecorderOptions) -> RecordingControllerBuilder {
        RecordingControllerBuilder {
            options,
            placeholder: None,
            passthrough: None,
            factory: None,
            export_sink: None,
        }
    }

    pub fn state(&self) -> RecorderState {
        *self.state_rx.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.events.subscribe()
    }

    pub fn health(&self) -> Arc<RecorderHealth> {
        Arc::clone(&self.health)
    }

    /// Number of chunks kept for the artifact
    pub fn chunk_count(&self) -> usize {
        self.inner.lock().chunks.len()
    }

    /// Start recording `stream` (an empty stream when `None`)
    pub async fn start(&self, stream: Option<MediaStream>) -> RecorderResult<()> {
        let stream = stream.unwrap_or_default();

        let (target, options) = {
            let mut inner = self.inner.lock();
            if !inner.state.is_idle() {
                let err = RecorderError::AlreadyActive("start");
                error!("{}", err);
                return Err(err);
            }
            inner.transition(RecorderState::Composing);

            match inner.compose(&stream) {
                Ok(target) => (target, inner.options.clone()),
                Err(e) => {
                    error!("RecordingController: composing failed: {}", e);
                    inner.abort_start(None);
                    return Err(e);
                }
            }
        };

        let mut guard = StartGuard {
            inner: Arc::clone(&self.inner),
            target: target.clone(),
            armed: true,
        };
        let created = self.factory.create(&target, &options).await;

        let mut inner = self.inner.lock();
        guard.disarm();
        let mut recorder = match created {
            Ok(recorder) => recorder,
            Err(e) => {
                let err = match e {
                    RecorderError::RecorderInit(_) => e,
                    other => RecorderError::RecorderInit(other.to_string()),
                };
                error!("RecordingController: {}", err);
                inner.abort_start(Some(&target));
                return Err(err);
            }
        };

        let mime_type = recorder.mime_type().to_string();
        inner.chunks.clear();
        inner.chunk_mime = Some(mime_type.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        if let Err(e) = recorder.start(options.time_slice(), tx) {
            let err = RecorderError::RecorderInit(e.to_string());
            error!("RecordingController: {}", err);
            inner.abort_start(Some(&target));
            return Err(err);
        }

        tokio::spawn(pump_events(
            Arc::clone(&self.inner),
            rx,
            self.events.clone(),
            Arc::clone(&self.health),
            options.on_data_available.clone(),
            options.save_blobs,
        ));

        info!(
            "RecordingController: recording {} tracks as {}",
            target.tracks().len(),
            mime_type
        );
        inner.session = Some(Session {
            recorder,
            target,
            mime_type,
        });
        inner.transition(RecorderState::Recording);
        drop(inner);

        if let Some(on_start) = &options.on_start {
            on_start();
        }
        let _ = self.events.send(RecordingEvent::Started);
        Ok(())
    }

    /// Ask the recorder to finish. A no-op unless recording.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        if !inner.state.is_recording() {
            error!("{}", RecorderError::NotActive("stop"));
            return;
        }
        inner.transition(RecorderState::Stopped);
        if let Some(session) = inner.session.as_mut() {
            session.recorder.stop();
        }
    }

    /// Resolve once the controller is back to `Idle`
    pub async fn wait_idle(&self) {
        let mut state_rx = self.state_rx.clone();
        let _ = state_rx.wait_for(RecorderState::is_idle).await;
    }

    pub fn add_audio_track(&self, track: &MediaTrack) -> RecorderResult<bool> {
        let mut inner = self.inner.lock();
        inner.require_recording("addAudioTrack")?;
        if track.kind() != TrackKind::Audio {
            warn!("addAudioTrack: {} is a {} track", track.id(), track.kind());
            return Ok(false);
        }
        match inner.audio.as_mut() {
            Some(graph) => graph.add_track(track),
            None => Err(RecorderError::NotActive("addAudioTrack")),
        }
    }

    pub fn delete_audio_track(&self, track: &MediaTrack) -> RecorderResult<bool> {
        let mut inner = self.inner.lock();
        inner.require_recording("deleteAudioTrack")?;
        if track.kind() != TrackKind::Audio {
            warn!("deleteAudioTrack: {} is a {} track", track.id(), track.kind());
            return Ok(false);
        }
        Ok(inner
            .audio
            .as_mut()
            .is_some_and(|graph| graph.remove_track(track)))
    }

    /// Swap the video source painted onto the recorded surface
    pub fn replace_video_track(&self, track: &MediaTrack) -> RecorderResult<bool> {
        let mut inner = self.inner.lock();
        inner.require_recording("replaceVideoTrack")?;
        if track.kind() != TrackKind::Video {
            warn!("replaceVideoTrack: {} is a {} track", track.id(), track.kind());
            return Ok(false);
        }
        if !track.is_live() {
            warn!("replaceVideoTrack: {} has ended, keeping current source", track.id());
            return Ok(false);
        }
        inner
            .proxy
            .replace_video_stream(&MediaStream::from_tracks([track.clone()]))?;
        Ok(true)
    }

    /// Replace every audio producer with the audio of `stream` and hand its
    /// video to the passthrough collaborator
    pub fn replace_stream(&self, stream: &MediaStream) -> RecorderResult<()> {
        let mut inner = self.inner.lock();
        inner.require_recording("replaceStream")?;

        if let Some(graph) = inner.audio.as_mut() {
            graph.clear_tracks();
        }
        for track in stream.video_tracks() {
            inner.passthrough.replace_video_track(track);
        }
        if let Some(graph) = inner.audio.as_mut() {
            for track in stream.audio_tracks() {
                if let Err(e) = graph.add_track(track) {
                    warn!("replaceStream: skipping audio track {}: {}", track.id(), e);
                }
            }
        }
        Ok(())
    }

    /// The stream being recorded, `None` outside of a recording
    pub fn get_recorded_stream(&self) -> Option<MediaStream> {
        let inner = self.inner.lock();
        if !inner.state.is_recording() {
            warn!("{}", RecorderError::NotActive("getRecordedStream"));
            return None;
        }
        inner.session.as_ref().map(|session| session.target.clone())
    }

    /// All kept chunks joined into one artifact
    pub fn get_recorded_blob(&self) -> RecorderResult<RecordedBlob> {
        let inner = self.inner.lock();
        let mime_type = inner.chunk_mime.as_deref().unwrap_or(MIXCAST_MIME_TYPE);
        RecordedBlob::assemble(&inner.chunks, mime_type)
            .inspect_err(|e| warn!("getRecordedBlob: {}", e))
    }

    /// Export the artifact through the configured sink
    pub fn download(&self, file_name: Option<&str>) -> RecorderResult<PathBuf> {
        let blob = self.get_recorded_blob()?;
        self.export_sink
            .save(&blob, file_name.unwrap_or(DEFAULT_FILE_NAME))
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if let Some(session) = inner.session.as_mut() {
            session.recorder.stop();
        }
    }
}

/// Delivers recorder events for one session, then tears the session down
async fn pump_events(
    inner: Arc<Mutex<ControllerInner>>,
    mut rx: mpsc::UnboundedReceiver<RecorderEvent>,
    events: broadcast::Sender<RecordingEvent>,
    health: Arc<RecorderHealth>,
    on_data_available: Option<DataAvailableHook>,
    save_blobs: bool,
) {
    while let Some(event) = rx.recv().await {
        match event {
            RecorderEvent::DataAvailable(chunk) => {
                health.record_chunk(chunk.size());
                if let Some(hook) = &on_data_available {
                    hook(&chunk);
                }
                let _ = events.send(RecordingEvent::DataAvailable {
                    seq: chunk.seq,
                    size: chunk.size(),
                });
                if save_blobs && !chunk.is_empty() {
                    inner.lock().chunks.push(chunk);
                }
            }
            RecorderEvent::Error(message) => {
                error!("Recorder error: {}", message);
                let _ = events.send(RecordingEvent::Error(message));
            }
            RecorderEvent::Stopped => break,
        }
    }

    inner.lock().finish_session();
    info!("RecordingController: stopped");
    let _ = events.send(RecordingEvent::Stopped);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::capture::placeholder::PlaceholderOptions;
    use crate::encoder::container::{Record, decode_records};
    use crate::media::TrackSettings;
    use crate::media::synthetic::{SolidColorSource, ToneSource};

    fn video_track(rgba: [u8; 4]) -> MediaTrack {
        MediaTrack::video(
            "camera",
            TrackSettings::video(8, 8, 30),
            Arc::new(SolidColorSource::new(8, 8, rgba)),
        )
    }

    fn audio_track() -> MediaTrack {
        MediaTrack::audio(
            "mic",
            TrackSettings::audio(8_000, 1),
            Arc::new(ToneSource::new(440.0, 0.4, 8_000, 1)),
        )
    }

    fn options(time_slice: u64) -> RecorderOptions {
        RecorderOptions {
            time_slice,
            sample_rate: 8_000,
            channels: 1,
            ..Default::default()
        }
    }

    async fn stop_and_wait(controller: &RecordingController) {
        controller.stop();
        tokio::time::timeout(Duration::from_secs(5), controller.wait_idle())
            .await
            .expect("controller did not return to idle");
    }

    struct CountingPlaceholder {
        calls: Arc<AtomicUsize>,
        inner: SolidColorPlaceholder,
    }

    impl PlaceholderSource for CountingPlaceholder {
        fn get_track(&mut self, options: &PlaceholderOptions) -> MediaTrack {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_track(options)
        }

        fn release(&mut self) {
            self.inner.release();
        }
    }

    struct FailingFactory;

    #[async_trait]
    impl RecorderFactory for FailingFactory {
        async fn create(
            &self,
            _stream: &MediaStream,
            _options: &RecorderOptions,
        ) -> RecorderResult<Box<dyn ChunkedRecorder>> {
            Err(RecorderError::RecorderInit("encoder unavailable".into()))
        }
    }

    struct PendingFactory;

    #[async_trait]
    impl RecorderFactory for PendingFactory {
        async fn create(
            &self,
            _stream: &MediaStream,
            _options: &RecorderOptions,
        ) -> RecorderResult<Box<dyn ChunkedRecorder>> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_record_and_collect_chunks() {
        let controller = RecordingController::new(options(500));
        let mut events = controller.subscribe();
        let stream = MediaStream::from_tracks([video_track([200, 0, 0, 255]), audio_track()]);

        controller.start(Some(stream)).await.unwrap();
        assert_eq!(controller.state(), RecorderState::Recording);
        assert_eq!(events.recv().await.unwrap(), RecordingEvent::Started);

        let recorded = controller.get_recorded_stream().unwrap();
        assert_eq!(recorded.video_tracks().count(), 1);
        assert_eq!(recorded.audio_tracks().count(), 1);

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(controller.chunk_count() >= 2);

        stop_and_wait(&controller).await;
        assert_eq!(controller.state(), RecorderState::Idle);
        assert!(controller.get_recorded_stream().is_none());
        assert!(recorded.tracks().iter().all(|t| !t.is_live()));

        let blob = controller.get_recorded_blob().unwrap();
        assert!(blob.size() > 0);
        assert_eq!(blob.mime_type, MIXCAST_MIME_TYPE);

        let records = decode_records(&blob.data).unwrap();
        assert!(records.iter().any(|r| matches!(r, Record::Video { width: 8, height: 8, .. })));
        assert!(records.iter().any(|r| matches!(r, Record::Audio { channels: 1, .. })));
        assert!(controller.health().chunks_emitted() >= 3);
    }

    #[tokio::test]
    async fn test_placeholder_used_once_without_video() {
        let calls = Arc::new(AtomicUsize::new(0));
        let controller = RecordingController::builder(options(100))
            .placeholder(CountingPlaceholder {
                calls: Arc::clone(&calls),
                inner: SolidColorPlaceholder::new(),
            })
            .build();

        controller
            .start(Some(MediaStream::from_tracks([audio_track()])))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        stop_and_wait(&controller).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_without_stream() {
        let controller = RecordingController::new(options(100));
        controller.start(None).await.unwrap();

        let recorded = controller.get_recorded_stream().unwrap();
        assert!(recorded.has_video());
        stop_and_wait(&controller).await;
    }

    #[tokio::test]
    async fn test_stop_leaves_caller_audio_live() {
        let controller = RecordingController::new(options(100));
        let camera = video_track([3, 3, 3, 255]);
        let mic = audio_track();
        controller
            .start(Some(MediaStream::from_tracks([camera.clone(), mic.clone()])))
            .await
            .unwrap();

        stop_and_wait(&controller).await;
        assert!(!camera.is_live());
        assert!(mic.is_live());
    }

    #[tokio::test]
    async fn test_stop_while_idle_is_noop() {
        let controller = RecordingController::new(options(100));
        controller.stop();
        assert_eq!(controller.state(), RecorderState::Idle);
        assert!(matches!(
            controller.get_recorded_blob(),
            Err(RecorderError::NoDataAvailable)
        ));
    }

    #[tokio::test]
    async fn test_second_start_rejected() {
        let controller = RecordingController::new(options(100));
        controller.start(None).await.unwrap();
        assert!(matches!(
            controller.start(None).await,
            Err(RecorderError::AlreadyActive(_))
        ));
        assert_eq!(controller.state(), RecorderState::Recording);
        stop_and_wait(&controller).await;
    }

    #[tokio::test]
    async fn test_mutators_require_recording() {
        let controller = RecordingController::new(options(100));
        assert!(matches!(
            controller.add_audio_track(&audio_track()),
            Err(RecorderError::NotActive(_))
        ));
        assert!(matches!(
            controller.delete_audio_track(&audio_track()),
            Err(RecorderError::NotActive(_))
        ));
        assert!(matches!(
            controller.replace_video_track(&video_track([0, 0, 0, 255])),
            Err(RecorderError::NotActive(_))
        ));
        assert!(matches!(
            controller.replace_stream(&MediaStream::new()),
            Err(RecorderError::NotActive(_))
        ));
    }

    #[tokio::test]
    async fn test_audio_tracks_mid_session() {
        let controller = RecordingController::new(options(100));
        controller.start(None).await.unwrap();

        let mic = audio_track();
        assert!(controller.add_audio_track(&mic).unwrap());
        assert!(!controller.add_audio_track(&mic).unwrap());
        // wrong kind: nothing added
        assert!(!controller.add_audio_track(&video_track([1, 1, 1, 255])).unwrap());

        assert!(controller.delete_audio_track(&mic).unwrap());
        assert!(!controller.delete_audio_track(&mic).unwrap());
        stop_and_wait(&controller).await;
    }

    #[tokio::test]
    async fn test_replace_video_track_mid_session() {
        let controller = RecordingController::new(options(100));
        controller
            .start(Some(MediaStream::from_tracks([video_track([255, 0, 0, 255])])))
            .await
            .unwrap();
        let recorded = controller.get_recorded_stream().unwrap();
        let output = recorded.video_tracks().next().unwrap().clone();

        assert!(controller.replace_video_track(&video_track([0, 0, 255, 255])).unwrap());
        assert_eq!(output.read_frame().unwrap().pixel(0, 0), Some([0, 0, 255, 255]));
        assert!(!controller.replace_video_track(&audio_track()).unwrap());

        let ended = video_track([0, 255, 0, 255]);
        ended.stop();
        assert!(!controller.replace_video_track(&ended).unwrap());
        assert_eq!(output.read_frame().unwrap().pixel(0, 0), Some([0, 0, 255, 255]));
        stop_and_wait(&controller).await;
    }

    #[tokio::test]
    async fn test_replace_stream_routes_tracks() {
        let slot = PassthroughSlot::new();
        let controller = RecordingController::builder(options(100))
            .passthrough(slot.clone())
            .build();

        let first = audio_track();
        controller
            .start(Some(MediaStream::from_tracks([first.clone()])))
            .await
            .unwrap();

        let camera = video_track([9, 9, 9, 255]);
        let second = audio_track();
        controller
            .replace_stream(&MediaStream::from_tracks([camera.clone(), second.clone()]))
            .unwrap();

        assert_eq!(slot.swap_count(), 1);
        assert_eq!(slot.current().unwrap().id(), camera.id());
        // the old producer is gone, the new one is in
        assert!(!controller.delete_audio_track(&first).unwrap());
        assert!(controller.delete_audio_track(&second).unwrap());
        stop_and_wait(&controller).await;
    }

    #[tokio::test]
    async fn test_recorder_init_failure_reverts() {
        let controller = RecordingController::builder(options(100))
            .recorder_factory(FailingFactory)
            .build();
        let source = video_track([1, 2, 3, 255]);

        let err = controller
            .start(Some(MediaStream::from_tracks([source.clone()])))
            .await
            .unwrap_err();
        assert!(matches!(err, RecorderError::RecorderInit(_)));
        assert_eq!(controller.state(), RecorderState::Idle);
        assert!(!controller.inner.lock().proxy.is_active());
        assert!(controller.inner.lock().audio.is_none());
        assert!(!source.is_live());

        // the controller accepts a new start after the failure
        assert!(matches!(
            controller.start(None).await,
            Err(RecorderError::RecorderInit(_))
        ));
    }

    #[tokio::test]
    async fn test_dropped_start_rolls_back() {
        let controller = RecordingController::builder(options(100))
            .recorder_factory(PendingFactory)
            .build();
        let source = video_track([1, 2, 3, 255]);

        let timed_out = tokio::time::timeout(
            Duration::from_millis(50),
            controller.start(Some(MediaStream::from_tracks([source.clone()]))),
        )
        .await;
        assert!(timed_out.is_err());
        assert_eq!(controller.state(), RecorderState::Idle);
        assert!(!controller.inner.lock().proxy.is_active());
        assert!(controller.inner.lock().audio.is_none());
        assert!(!source.is_live());

        // not wedged: the next start reaches the factory again
        let again = tokio::time::timeout(Duration::from_millis(50), controller.start(None)).await;
        assert!(again.is_err());
        assert!(controller.state().is_idle());
    }

    #[tokio::test]
    async fn test_unsupported_mime_type_fails_start() {
        let controller = RecordingController::new(RecorderOptions {
            mime_type: Some("video/webm".into()),
            ..options(100)
        });
        assert!(matches!(
            controller.start(None).await,
            Err(RecorderError::RecorderInit(_))
        ));
        assert!(controller.state().is_idle());
    }

    #[tokio::test]
    async fn test_hooks_and_save_blobs() {
        let started = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(AtomicUsize::new(0));
        let started_hook = Arc::clone(&started);
        let seen_hook = Arc::clone(&seen);

        let options = RecorderOptions {
            save_blobs: false,
            ..options(100)
        }
        .with_on_start(move || {
            started_hook.fetch_add(1, Ordering::SeqCst);
        })
        .with_on_data_available(move |_chunk| {
            seen_hook.fetch_add(1, Ordering::SeqCst);
        });

        let controller = RecordingController::new(options);
        controller.start(None).await.unwrap();
        assert_eq!(started.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(350)).await;
        stop_and_wait(&controller).await;

        assert!(seen.load(Ordering::SeqCst) >= 3);
        assert_eq!(controller.chunk_count(), 0);
        assert!(matches!(
            controller.get_recorded_blob(),
            Err(RecorderError::NoDataAvailable)
        ));
    }

    #[tokio::test]
    async fn test_download_through_sink() {
        let dir = tempfile::tempdir().unwrap();
        let controller = RecordingController::builder(options(100))
            .export_sink(FileExportSink::new(dir.path()))
            .build();

        assert!(matches!(
            controller.download(None),
            Err(RecorderError::NoDataAvailable)
        ));

        controller.start(None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        stop_and_wait(&controller).await;

        let path = controller.download(None).unwrap();
        assert_eq!(path, dir.path().join(DEFAULT_FILE_NAME));
        let named = controller.download(Some("take2.mxc")).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), std::fs::read(&named).unwrap());
    }

    #[tokio::test]
    async fn test_restart_resets_chunks() {
        let controller = RecordingController::new(options(100));
        controller.start(None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        stop_and_wait(&controller).await;
        let first = controller.chunk_count();
        assert!(first >= 3);

        controller.start(None).await.unwrap();
        assert_eq!(controller.chunk_count(), 0);
        tokio::time::sleep(Duration::from_millis(150)).await;
        stop_and_wait(&controller).await;
        assert!(controller.chunk_count() >= 1);
    }
}
