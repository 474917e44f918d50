//! Composite media streams

use uuid::Uuid;

use crate::media::track::MediaTrack;
use crate::pipeline::types::TrackKind;

/// An ordered set of tracks, unique by track id
///
/// Cloning a stream copies the track list; the tracks themselves are shared
/// handles.
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tracks: Vec::new(),
        }
    }

    pub fn from_tracks<I>(tracks: I) -> Self
    where
        I: IntoIterator<Item = MediaTrack>,
    {
        let mut stream = Self::new();
        for track in tracks {
            stream.add_track(track);
        }
        stream
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Add a track; a track whose id is already present is ignored
    pub fn add_track(&mut self, track: MediaTrack) -> bool {
        if self.tracks.iter().any(|t| t.id() == track.id()) {
            return false;
        }
        self.tracks.push(track);
        true
    }

    pub fn remove_track(&mut self, track: &MediaTrack) -> bool {
        let before = self.tracks.len();
        self.tracks.retain(|t| t.id() != track.id());
        self.tracks.len() != before
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks_of(TrackKind::Video)
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks_of(TrackKind::Audio)
    }

    fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(move |t| t.kind() == kind)
    }

    pub fn has_video(&self) -> bool {
        self.video_tracks().next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Stop every track in the stream
    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

impl Default for MediaStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::synthetic::{SilenceSource, SolidColorSource};
    use crate::media::track::TrackSettings;
    use std::sync::Arc;

    fn video() -> MediaTrack {
        MediaTrack::video(
            "v",
            TrackSettings::video(2, 2, 30),
            Arc::new(SolidColorSource::new(2, 2, [0, 0, 0, 255])),
        )
    }

    fn audio() -> MediaTrack {
        MediaTrack::audio("a", TrackSettings::audio(48_000, 1), Arc::new(SilenceSource))
    }

    #[test]
    fn test_tracks_unique_by_id() {
        let track = audio();
        let mut stream = MediaStream::new();
        assert!(stream.add_track(track.clone()));
        assert!(!stream.add_track(track.clone()));
        assert_eq!(stream.tracks().len(), 1);
        assert!(stream.remove_track(&track));
        assert!(stream.is_empty());
    }

    #[test]
    fn test_filters_by_kind() {
        let stream = MediaStream::from_tracks([video(), audio(), audio()]);
        assert!(stream.has_video());
        assert_eq!(stream.video_tracks().count(), 1);
        assert_eq!(stream.audio_tracks().count(), 2);
    }

    #[test]
    fn test_stop_all() {
        let stream = MediaStream::from_tracks([video(), audio()]);
        stream.stop_all();
        assert!(stream.tracks().iter().all(|t| !t.is_live()));
    }
}
