//! Seam between the signaling logic and the peer-connection engine.
//!
//! The engine owns ICE gathering, DTLS/SRTP and codec negotiation. Signaling
//! only needs the handful of capabilities below, so any engine (webrtc-rs, a
//! browser bridge, a test double) can drive a session.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

use wisp_common::{IceServer, MediaKind, Result};

/// Offer or answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// A session description exchanged with the signaling server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// A locally discovered connectivity candidate, captured verbatim from the
/// engine's notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// Candidate attribute value, e.g. `candidate:1 1 udp 2130706431 ...`.
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            ..Default::default()
        }
    }

    pub fn with_mid(mut self, mid: impl Into<String>) -> Self {
        self.sdp_mid = Some(mid.into());
        self
    }

    pub fn with_ufrag(mut self, ufrag: impl Into<String>) -> Self {
        self.username_fragment = Some(ufrag.into());
        self
    }

    /// Empty candidates mark the end of gathering and carry nothing to send.
    pub fn is_end_of_candidates(&self) -> bool {
        self.candidate.trim().is_empty()
    }
}

/// Aggregate connectivity state reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "new",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A remote track delivered by the engine, with the ids of the live streams it
/// belongs to. `handle` is whatever the engine needs to read media from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack<H> {
    pub id: String,
    pub kind: MediaKind,
    pub stream_ids: Vec<String>,
    pub handle: H,
}

impl<H> RemoteTrack<H> {
    pub fn has_streams(&self) -> bool {
        !self.stream_ids.is_empty()
    }
}

/// Notifications raised by the engine, in the order it raised them.
#[derive(Debug, Clone)]
pub enum PeerEvent<H> {
    /// `None` signals the end of candidate gathering.
    Candidate(Option<IceCandidate>),
    ConnectionState(ConnectionState),
    Track(RemoteTrack<H>),
}

pub type PeerEventSink<H> = mpsc::UnboundedSender<PeerEvent<H>>;

/// Capabilities the signaling session consumes from the peer-connection engine.
#[async_trait]
pub trait PeerConnection: Send + Sync + 'static {
    /// Local media track accepted by [`PeerConnection::add_track`].
    type LocalTrack: Send + 'static;
    /// Engine-specific handle carried by [`RemoteTrack`].
    type RemoteHandle: Clone + Send + Sync + 'static;

    async fn create_offer(&self) -> Result<SessionDescription>;
    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;
    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    /// Relay servers the engine is currently configured with.
    async fn ice_servers(&self) -> Vec<IceServer>;
    /// Replace the relay server configuration as a whole.
    async fn set_ice_servers(&self, servers: Vec<IceServer>) -> Result<()>;

    async fn add_track(&self, track: Self::LocalTrack) -> Result<()>;
    async fn add_recvonly_transceiver(&self, kind: MediaKind) -> Result<()>;

    /// Register where candidate, connection-state and track notifications go.
    /// Replaces any previously registered sink.
    fn set_event_sink(&self, sink: PeerEventSink<Self::RemoteHandle>);

    async fn close(&self) -> Result<()>;
}

/// Source of local media for roles that send.
#[async_trait]
pub trait MediaSource<T>: Send + Sync {
    /// Fails with [`wisp_common::Error::MediaAccess`] when media is denied or unavailable.
    async fn acquire(&self) -> Result<Vec<T>>;
}
