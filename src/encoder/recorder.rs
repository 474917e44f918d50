//! Chunked recorder
//!
//! Samples a composed stream at its video frame rate and cuts the buffered
//! records into chunks every `time_slice`. Chunks and completion are reported
//! over an event channel in production order: the last chunk always precedes
//! `RecorderEvent::Stopped`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info, warn};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tokio_util::sync::CancellationToken;

use crate::assets::{
    DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE, MIXCAST_MIME_TYPE, MIXCAST_MIME_TYPE_CODECS,
};
use crate::config::RecorderOptions;
use crate::encoder::container::ChunkWriter;
use crate::media::{MediaStream, MediaTrack};
use crate::pipeline::types::Timestamp;
use crate::utils::error::{RecorderError, RecorderResult};

/// One slice of recorded data
#[derive(Debug, Clone)]
pub struct Chunk {
    pub data: Bytes,
    pub seq: u64,
    /// Offset of the slice end from the start of the recording
    pub timecode: Timestamp,
    pub mime_type: String,
}

impl Chunk {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug)]
pub enum RecorderEvent {
    DataAvailable(Chunk),
    Error(String),
    /// No further events follow
    Stopped,
}

/// Builds recorders for a composed stream
#[async_trait]
pub trait RecorderFactory: Send + Sync {
    async fn create(
        &self,
        stream: &MediaStream,
        options: &RecorderOptions,
    ) -> RecorderResult<Box<dyn ChunkedRecorder>>;
}

pub trait ChunkedRecorder: Send {
    /// Negotiated container type of the produced chunks
    fn mime_type(&self) -> &str;

    fn start(
        &mut self,
        time_slice: Duration,
        events: mpsc::UnboundedSender<RecorderEvent>,
    ) -> RecorderResult<()>;

    /// Request a stop; the final chunk and `Stopped` are delivered afterwards
    fn stop(&mut self);
}

/// Whether `mime_type` names the `mixcast` raw container
pub fn is_type_supported(mime_type: &str) -> bool {
    let normalized: String = mime_type
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    normalized == MIXCAST_MIME_TYPE || normalized == MIXCAST_MIME_TYPE_CODECS
}

/// Factory for [`StreamRecorder`]
#[derive(Debug, Default, Clone)]
pub struct StreamRecorderFactory;

#[async_trait]
impl RecorderFactory for StreamRecorderFactory {
    async fn create(
        &self,
        stream: &MediaStream,
        options: &RecorderOptions,
    ) -> RecorderResult<Box<dyn ChunkedRecorder>> {
        if stream.is_empty() {
            return Err(RecorderError::RecorderInit("stream has no tracks".into()));
        }
        let mime_type = match &options.mime_type {
            Some(requested) if !is_type_supported(requested) => {
                return Err(RecorderError::RecorderInit(format!(
                    "mime type {} is not supported",
                    requested
                )));
            }
            Some(requested) => requested.clone(),
            None => MIXCAST_MIME_TYPE.to_string(),
        };

        let frame_rate = stream
            .video_tracks()
            .find_map(|track| track.settings().frame_rate)
            .unwrap_or(options.frame_rate)
            .max(1);

        Ok(Box::new(StreamRecorder::new(
            stream.clone(),
            mime_type,
            Duration::from_secs(1) / frame_rate,
        )))
    }
}

/// Recorder writing the `mixcast` raw container
pub struct StreamRecorder {
    stream: MediaStream,
    mime_type: String,
    frame_interval: Duration,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl StreamRecorder {
    pub fn new(stream: MediaStream, mime_type: String, frame_interval: Duration) -> Self {
        Self {
            stream,
            mime_type,
            frame_interval,
            cancel: CancellationToken::new(),
            task: None,
        }
    }
}

impl ChunkedRecorder for StreamRecorder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn start(
        &mut self,
        time_slice: Duration,
        events: mpsc::UnboundedSender<RecorderEvent>,
    ) -> RecorderResult<()> {
        if self.task.is_some() {
            return Err(RecorderError::AlreadyActive("recorder.start"));
        }
        let handle = Handle::try_current()
            .map_err(|e| RecorderError::Runtime(format!("recorder.start: {}", e)))?;

        let session = RecordingSession {
            stream: self.stream.clone(),
            mime_type: self.mime_type.clone(),
            frame_interval: self.frame_interval.max(Duration::from_millis(1)),
            time_slice: time_slice.max(Duration::from_millis(1)),
            cancel: self.cancel.clone(),
            events,
        };
        info!(
            "StreamRecorder: started ({}, slice {:?}, frame every {:?})",
            self.mime_type, time_slice, self.frame_interval
        );
        self.task = Some(handle.spawn(session.run()));
        Ok(())
    }

    fn stop(&mut self) {
        if !self.cancel.is_cancelled() {
            debug!("StreamRecorder: stop requested");
            self.cancel.cancel();
        }
    }
}

impl Drop for StreamRecorder {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Read position inside one audio track
struct AudioCursor {
    track: MediaTrack,
    sample_rate: u32,
    channels: u16,
    frames_pulled: u64,
    buf: Vec<f32>,
}

impl AudioCursor {
    fn new(track: MediaTrack) -> Self {
        let settings = track.settings();
        let sample_rate = settings.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE).max(1);
        let channels = settings.channels.unwrap_or(DEFAULT_CHANNELS).max(1);
        Self {
            track,
            sample_rate,
            channels,
            frames_pulled: 0,
            buf: Vec::new(),
        }
    }

    /// Pull the samples due at `elapsed` into `writer`
    fn pull(&mut self, elapsed: Duration, writer: &mut ChunkWriter) {
        let due = (elapsed.as_secs_f64() * self.sample_rate as f64) as u64;
        if due <= self.frames_pulled {
            return;
        }
        let frames = (due - self.frames_pulled) as usize;
        let pts = Timestamp::from_micros(
            (self.frames_pulled as i64 * 1_000_000) / self.sample_rate as i64,
        );
        // the cursor advances even on a short read so a stalled source
        // does not build up a backlog
        self.frames_pulled = due;

        self.buf.clear();
        self.buf.resize(frames * self.channels as usize, 0.0);
        let got = self.track.read_samples(&mut self.buf);
        if got > 0 {
            writer.write_audio(self.sample_rate, self.channels, &self.buf[..got], pts);
        }
    }
}

struct RecordingSession {
    stream: MediaStream,
    mime_type: String,
    frame_interval: Duration,
    time_slice: Duration,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<RecorderEvent>,
}

impl RecordingSession {
    async fn run(self) {
        let started = Instant::now();
        let mut writer = ChunkWriter::new();
        let mut seq = 0u64;
        let mut cursors: Vec<AudioCursor> = self
            .stream
            .audio_tracks()
            .cloned()
            .map(AudioCursor::new)
            .collect();

        let mut frame_tick = interval(self.frame_interval);
        frame_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut slice_tick = interval_at(started + self.time_slice, self.time_slice);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = frame_tick.tick() => {
                    if self.stream.tracks().iter().all(|t| !t.is_live()) {
                        warn!("StreamRecorder: every track ended, stopping");
                        break;
                    }
                    self.sample(started.elapsed(), &mut writer, &mut cursors);
                }
                _ = slice_tick.tick() => {
                    if !self.emit(&mut writer, &mut seq, started) {
                        debug!("StreamRecorder: event receiver gone");
                        return;
                    }
                }
            }
        }

        // flush whatever audio is due, then the final chunk, then Stopped
        for cursor in cursors.iter_mut() {
            cursor.pull(started.elapsed(), &mut writer);
        }
        self.emit(&mut writer, &mut seq, started);
        let _ = self.events.send(RecorderEvent::Stopped);
        info!("StreamRecorder: stopped after {} chunks", seq);
    }

    fn sample(&self, elapsed: Duration, writer: &mut ChunkWriter, cursors: &mut [AudioCursor]) {
        let pts = Timestamp::from_duration(elapsed);
        for track in self.stream.video_tracks() {
            if let Some(frame) = track.read_frame() {
                writer.write_video(&frame, pts);
            }
        }
        for cursor in cursors.iter_mut() {
            cursor.pull(elapsed, writer);
        }
    }

    fn emit(&self, writer: &mut ChunkWriter, seq: &mut u64, started: Instant) -> bool {
        let chunk = Chunk {
            data: writer.take_chunk(),
            seq: *seq,
            timecode: Timestamp::from_duration(started.elapsed()),
            mime_type: self.mime_type.clone(),
        };
        *seq += 1;
        self.events.send(RecorderEvent::DataAvailable(chunk)).is_ok()
    }
}
