//! Dynamic audio mixing graph

use std::collections::HashMap;

use log::{debug, info};

use crate::audio::context::{AudioContext, MixDestination, ProducerNode};
use crate::media::{MediaStream, MediaTrack};
use crate::pipeline::types::TrackKind;
use crate::utils::error::{RecorderError, RecorderResult};

/// Audio producers keyed by track id, all feeding one destination
///
/// A silent baseline producer stays connected for the whole life of the
/// graph so the destination never runs dry when the last real producer
/// leaves.
pub struct AudioMixGraph {
    context: Option<AudioContext>,
    destination: Option<MixDestination>,
    baseline: Option<ProducerNode>,
    producers: HashMap<String, ProducerNode>,
}

impl AudioMixGraph {
    pub fn new(sample_rate: u32, channels: u16) -> RecorderResult<Self> {
        let context = AudioContext::new(sample_rate, channels);
        let destination = context.create_media_stream_destination()?;
        let mut baseline = context.create_silent_source()?;
        baseline.connect(&destination);

        debug!(
            "AudioMixGraph: created ({} Hz, {} ch)",
            context.sample_rate(),
            context.channels()
        );
        Ok(Self {
            context: Some(context),
            destination: Some(destination),
            baseline: Some(baseline),
            producers: HashMap::new(),
        })
    }

    pub fn is_active(&self) -> bool {
        self.destination.is_some()
    }

    /// The mixed output, `None` after `reset_all`
    pub fn output_track(&self) -> Option<MediaTrack> {
        self.destination
            .as_ref()
            .map(|destination| destination.stream_track().clone())
    }

    /// Connect an audio track to the mix
    ///
    /// Returns `Ok(false)` for non-audio tracks and for tracks already in the
    /// graph.
    pub fn add_track(&mut self, track: &MediaTrack) -> RecorderResult<bool> {
        if track.kind() != TrackKind::Audio {
            debug!("AudioMixGraph: ignoring {} track {}", track.kind(), track.id());
            return Ok(false);
        }
        if self.producers.contains_key(track.id()) {
            return Ok(false);
        }
        let (context, destination) = match (&self.context, &self.destination) {
            (Some(context), Some(destination)) => (context, destination),
            _ => return Err(RecorderError::NotActive("addTrack")),
        };

        let stream = MediaStream::from_tracks([track.clone()]);
        let mut node = context.create_media_stream_source(&stream)?;
        node.connect(destination);
        self.producers.insert(track.id().to_string(), node);

        info!(
            "AudioMixGraph: track {} ({}) added ({} producers)",
            track.id(),
            track.label(),
            self.producers.len()
        );
        Ok(true)
    }

    pub fn remove_track(&mut self, track: &MediaTrack) -> bool {
        match self.producers.remove(track.id()) {
            Some(mut node) => {
                node.disconnect();
                info!("AudioMixGraph: track {} removed", track.id());
                true
            }
            None => false,
        }
    }

    /// Disconnect every producer except the baseline
    pub fn clear_tracks(&mut self) {
        for (_, mut node) in self.producers.drain() {
            node.disconnect();
        }
    }

    /// Full teardown. Safe to call more than once.
    pub fn reset_all(&mut self) {
        let had_producers = self.producers.len();
        self.clear_tracks();

        if let Some(mut baseline) = self.baseline.take() {
            baseline.disconnect();
        }
        if let Some(destination) = self.destination.take() {
            destination.disconnect();
        }
        if let Some(context) = self.context.take() {
            context.close();
            info!("AudioMixGraph: reset ({} producers released)", had_producers);
        }
    }

    pub fn producer_count(&self) -> usize {
        self.producers.len()
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.producers.contains_key(track_id)
    }

    /// Inputs currently feeding the destination, baseline included
    pub fn connected_inputs(&self) -> usize {
        self.destination
            .as_ref()
            .map_or(0, MixDestination::input_count)
    }
}

impl Drop for AudioMixGraph {
    fn drop(&mut self) {
        self.reset_all();
    }
}
