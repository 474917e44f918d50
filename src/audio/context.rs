//! Minimal pull-based audio context
//!
//! Producers wrap an audio track and connect to a mixing destination. The
//! destination is itself an audio source: every read pulls the same number of
//! frames from each connected producer, sums them and clips to [-1, 1].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use log::{debug, warn};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::media::synthetic::SilenceSource;
use crate::media::{AudioSource, MediaStream, MediaTrack, TrackSettings};
use crate::utils::error::{RecorderError, RecorderResult};

struct MixInput {
    node_id: String,
    track: MediaTrack,
    channels: usize,
}

/// Summing bus behind a mixing destination
struct MixBus {
    channels: usize,
    inputs: Mutex<Vec<MixInput>>,
}

impl MixBus {
    fn input_count(&self) -> usize {
        self.inputs.lock().len()
    }

    fn attach(&self, input: MixInput) -> bool {
        let mut inputs = self.inputs.lock();
        if inputs.iter().any(|i| i.node_id == input.node_id) {
            return false;
        }
        inputs.push(input);
        true
    }

    fn detach(&self, node_id: &str) -> bool {
        let mut inputs = self.inputs.lock();
        let before = inputs.len();
        inputs.retain(|i| i.node_id != node_id);
        inputs.len() != before
    }
}

impl AudioSource for MixBus {
    fn read(&self, out: &mut [f32]) -> usize {
        let channels = self.channels;
        let frames = out.len() / channels;
        let inputs = self.inputs.lock();
        // no producer, no signal
        if frames == 0 || inputs.is_empty() {
            return 0;
        }

        let len = frames * channels;
        let out = &mut out[..len];
        out.fill(0.0);

        let mut scratch = Vec::new();
        for input in inputs.iter() {
            let in_channels = input.channels;
            scratch.clear();
            scratch.resize(frames * in_channels, 0.0);
            let got = input.track.read_samples(&mut scratch) / in_channels;

            for (frame, dst) in out.chunks_exact_mut(channels).take(got).enumerate() {
                let src = &scratch[frame * in_channels..(frame + 1) * in_channels];
                for (c, sample) in dst.iter_mut().enumerate() {
                    *sample += if in_channels == 1 {
                        src[0]
                    } else {
                        src.get(c).copied().unwrap_or(0.0)
                    };
                }
            }
        }

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
        len
    }

    fn stop(&self) {
        self.inputs.lock().clear();
    }
}

/// Audio processing context with a fixed output format
pub struct AudioContext {
    sample_rate: u32,
    channels: u16,
    closed: AtomicBool,
}

impl AudioContext {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            closed: AtomicBool::new(false),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the context. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        if first {
            debug!("AudioContext closed");
        }
        first
    }

    fn ensure_open(&self, op: &'static str) -> RecorderResult<()> {
        if self.is_closed() {
            return Err(RecorderError::NotActive(op));
        }
        Ok(())
    }

    /// Producer fed by the first live audio track of `stream`
    pub fn create_media_stream_source(&self, stream: &MediaStream) -> RecorderResult<ProducerNode> {
        self.ensure_open("createMediaStreamSource")?;
        let track = stream
            .audio_tracks()
            .find(|t| t.is_live())
            .ok_or_else(|| {
                RecorderError::InvalidArgument(
                    "createMediaStreamSource: no live audio track".into(),
                )
            })?;

        let settings = track.settings();
        if let Some(rate) = settings.sample_rate {
            if rate != self.sample_rate {
                warn!(
                    "Track {} runs at {} Hz, context at {} Hz; samples are mixed unconverted",
                    track.id(),
                    rate,
                    self.sample_rate
                );
            }
        }
        let channels = settings.channels.unwrap_or(self.channels).max(1);
        Ok(ProducerNode::new(track.clone(), channels))
    }

    /// Producer that always yields silence
    pub fn create_silent_source(&self) -> RecorderResult<ProducerNode> {
        self.ensure_open("createSilentSource")?;
        let track = MediaTrack::audio(
            "silence",
            TrackSettings::audio(self.sample_rate, 1),
            Arc::new(SilenceSource),
        );
        Ok(ProducerNode::new(track, 1))
    }

    pub fn create_media_stream_destination(&self) -> RecorderResult<MixDestination> {
        self.ensure_open("createMediaStreamDestination")?;
        let bus = Arc::new(MixBus {
            channels: self.channels as usize,
            inputs: Mutex::new(Vec::new()),
        });
        let track = MediaTrack::audio(
            "mix",
            TrackSettings::audio(self.sample_rate, self.channels),
            Arc::clone(&bus) as Arc<dyn AudioSource>,
        );
        Ok(MixDestination { bus, track })
    }
}

/// Audio producer wrapping one track
pub struct ProducerNode {
    id: String,
    track: MediaTrack,
    channels: u16,
    target: Option<Weak<MixBus>>,
}

impl ProducerNode {
    fn new(track: MediaTrack, channels: u16) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            track,
            channels,
            target: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn track(&self) -> &MediaTrack {
        &self.track
    }

    pub fn is_connected(&self) -> bool {
        match self.target.as_ref().and_then(Weak::upgrade) {
            Some(bus) => {
                let inputs = bus.inputs.lock();
                inputs.iter().any(|i| i.node_id == self.id)
            }
            None => false,
        }
    }

    /// Connect to `destination`, leaving any previous destination first
    pub fn connect(&mut self, destination: &MixDestination) {
        self.disconnect();
        destination.bus.attach(MixInput {
            node_id: self.id.clone(),
            track: self.track.clone(),
            channels: self.channels as usize,
        });
        self.target = Some(Arc::downgrade(&destination.bus));
    }

    /// Returns whether the node was connected
    pub fn disconnect(&mut self) -> bool {
        match self.target.take().and_then(|weak| weak.upgrade()) {
            Some(bus) => bus.detach(&self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for ProducerNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerNode")
            .field("id", &self.id)
            .field("track", &self.track.id())
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Mixing destination exposing the mix as an audio track
pub struct MixDestination {
    bus: Arc<MixBus>,
    track: MediaTrack,
}

impl MixDestination {
    pub fn stream_track(&self) -> &MediaTrack {
        &self.track
    }

    pub fn input_count(&self) -> usize {
        self.bus.input_count()
    }

    /// Drop every input
    pub fn disconnect(&self) {
        self.bus.inputs.lock().clear();
    }
}
