//! Groups incoming remote tracks into renderable audio+video streams.
//!
//! Video tracks are paired in arrival order once an audio track is known. The
//! first pairing carries the audio; later ones (simulcast layers) are video
//! only. Pairings are append-only and never revisited.

use tracing::debug;

use wisp_common::MediaKind;

use crate::peer::RemoteTrack;

/// One materialized output stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPairing<H> {
    /// Position in materialization order, starting at 0.
    pub index: usize,
    pub video: RemoteTrack<H>,
    pub audio: Option<RemoteTrack<H>>,
}

impl<H> StreamPairing<H> {
    /// Id of the live stream the video track arrived on.
    pub fn stream_id(&self) -> Option<&str> {
        self.video.stream_ids.first().map(String::as_str)
    }
}

/// Rendering collaborator that receives each pairing exactly once.
pub trait StreamSink<H>: Send + Sync {
    fn render(&self, pairing: &StreamPairing<H>);
}

#[derive(Debug)]
pub struct TrackPairer<H> {
    video_tracks: Vec<RemoteTrack<H>>,
    audio_track: Option<RemoteTrack<H>>,
    paired: Vec<StreamPairing<H>>,
}

impl<H: Clone> TrackPairer<H> {
    pub fn new() -> Self {
        Self {
            video_tracks: Vec::new(),
            audio_track: None,
            paired: Vec::new(),
        }
    }

    /// Record a remote track and return the pairings it completed, in order.
    pub fn on_track(&mut self, track: RemoteTrack<H>) -> Vec<StreamPairing<H>> {
        match track.kind {
            MediaKind::Video if !track.has_streams() => {
                // Inactive transceivers surface video tracks with no stream.
                debug!("Discarding video track {} without a live stream", track.id);
            }
            MediaKind::Video => self.video_tracks.push(track),
            MediaKind::Audio => {
                if let Some(previous) = &self.audio_track {
                    debug!("Audio track {} replaces {}", track.id, previous.id);
                }
                self.audio_track = Some(track);
            }
        }
        self.pair()
    }

    fn pair(&mut self) -> Vec<StreamPairing<H>> {
        let Some(audio) = &self.audio_track else {
            return Vec::new();
        };

        let mut fresh = Vec::new();
        while self.paired.len() < self.video_tracks.len() {
            let index = self.paired.len();
            let pairing = StreamPairing {
                index,
                video: self.video_tracks[index].clone(),
                audio: (index == 0).then(|| audio.clone()),
            };
            self.paired.push(pairing.clone());
            fresh.push(pairing);
        }
        fresh
    }

    pub fn video_tracks(&self) -> &[RemoteTrack<H>] {
        &self.video_tracks
    }

    pub fn audio_track(&self) -> Option<&RemoteTrack<H>> {
        self.audio_track.as_ref()
    }

    pub fn pairings(&self) -> &[StreamPairing<H>] {
        &self.paired
    }
}

impl<H: Clone> Default for TrackPairer<H> {
    fn default() -> Self {
        Self::new()
    }
}
