//! webrtc-rs backend for Wisp sessions.
//!
//! [`RtcPeer`] implements [`wisp_signal::PeerConnection`] over an
//! `RTCPeerConnection`; [`StaticMediaSource`] hands out sample-fed local
//! tracks for publishing.

#![forbid(unsafe_code)]

pub mod media;
pub mod peer;

pub use media::StaticMediaSource;
pub use peer::{sdp_attribute, LocalTrack, RtcPeer};
