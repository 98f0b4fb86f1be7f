//! WHIP/WHEP signaling for WebRTC sessions.
//!
//! A [`WhipClient`] configures a peer connection for its [`Role`], posts the
//! local offer to the endpoint, applies the answer, and trickles candidates
//! discovered afterwards to the session URL the endpoint assigned. Incoming
//! remote tracks are grouped into renderable streams by the [`TrackPairer`].
//!
//! The peer-connection engine is abstracted behind [`PeerConnection`]; see the
//! `wisp-rtc` crate for the webrtc-rs implementation.

#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod events;
pub mod http;
pub mod link;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod pairer;
pub mod peer;
pub mod role;
pub mod session;
pub mod trickle;

pub use client::WhipClient;
pub use config::{ClientConfig, DEFAULT_SIMULCAST};
pub use events::{EventHub, ResponseError, SessionEvent};
pub use http::SignalingHttp;
pub use link::{parse_link_header, parse_link_headers, RelayServerDiscovery};
pub use pairer::{StreamPairing, StreamSink, TrackPairer};
pub use peer::{
    ConnectionState, IceCandidate, MediaSource, PeerConnection, PeerEvent, PeerEventSink,
    RemoteTrack, SdpType, SessionDescription,
};
pub use role::Role;
pub use session::{SessionState, SignalingSession};
pub use trickle::{sdp_fragment, CandidateTrickler, PLACEHOLDER_MEDIA_LINE};

pub use wisp_common::{Error, IceServer, MediaKind, Result};
