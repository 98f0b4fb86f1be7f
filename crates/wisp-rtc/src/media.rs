use async_trait::async_trait;
use std::sync::Arc;
use webrtc::api::media_engine::{MIME_TYPE_H264, MIME_TYPE_OPUS};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use wisp_common::{Error, Result};
use wisp_signal::MediaSource;

use crate::peer::LocalTrack;

const STREAM_ID: &str = "wisp";

/// Local H.264 video and Opus audio tracks fed through `write_sample`.
pub struct StaticMediaSource {
    video: Option<Arc<TrackLocalStaticSample>>,
    audio: Option<Arc<TrackLocalStaticSample>>,
}

impl StaticMediaSource {
    pub fn new(video: bool, audio: bool) -> Self {
        let track = |mime_type: &str, id: &str| {
            Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: mime_type.to_string(),
                    ..Default::default()
                },
                id.to_string(),
                STREAM_ID.to_string(),
            ))
        };
        Self {
            video: video.then(|| track(MIME_TYPE_H264, "video")),
            audio: audio.then(|| track(MIME_TYPE_OPUS, "audio")),
        }
    }

    pub fn video_track(&self) -> Option<&Arc<TrackLocalStaticSample>> {
        self.video.as_ref()
    }

    pub fn audio_track(&self) -> Option<&Arc<TrackLocalStaticSample>> {
        self.audio.as_ref()
    }
}

#[async_trait]
impl MediaSource<LocalTrack> for StaticMediaSource {
    async fn acquire(&self) -> Result<Vec<LocalTrack>> {
        let tracks: Vec<LocalTrack> = self
            .video
            .iter()
            .chain(self.audio.iter())
            .map(|track| Arc::clone(track) as LocalTrack)
            .collect();
        if tracks.is_empty() {
            return Err(Error::media_access("both audio and video are disabled"));
        }
        Ok(tracks)
    }
}
