//! In-memory peer connection for tests and dry runs.
//!
//! Records every call made by the signaling layer and lets the test inject
//! engine notifications through [`MockPeer::emit`].

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};

use wisp_common::{Error, IceServer, MediaKind, Result};

use crate::peer::{
    MediaSource, PeerConnection, PeerEvent, PeerEventSink, SessionDescription,
};

pub const MOCK_OFFER_SDP: &str = "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n";

/// Local track stand-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTrack {
    pub id: String,
    pub kind: MediaKind,
}

impl MockTrack {
    pub fn audio(id: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: MediaKind::Audio,
        }
    }

    pub fn video(id: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: MediaKind::Video,
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    ice_servers: Vec<IceServer>,
    ice_server_updates: usize,
    offers_created: usize,
    local_description: Option<SessionDescription>,
    remote_description: Option<SessionDescription>,
    transceivers: Vec<MediaKind>,
    tracks: Vec<MockTrack>,
    reject_ice_servers: bool,
    closed: bool,
}

#[derive(Default)]
pub struct MockPeer {
    state: Mutex<MockState>,
    sink: Mutex<Option<PeerEventSink<()>>>,
}

impl MockPeer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ice_servers(ice_servers: Vec<IceServer>) -> Self {
        let peer = Self::new();
        peer.lock().ice_servers = ice_servers;
        peer
    }

    /// Peer whose engine refuses every relay server update.
    pub fn rejecting_ice_servers() -> Self {
        let peer = Self::new();
        peer.lock().reject_ice_servers = true;
        peer
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver an engine notification to the registered sink. Returns false
    /// when no sink is registered or it was dropped.
    pub fn emit(&self, event: PeerEvent<()>) -> bool {
        let sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        match sink.as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    pub fn has_sink(&self) -> bool {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn offers_created(&self) -> usize {
        self.lock().offers_created
    }

    pub fn ice_server_updates(&self) -> usize {
        self.lock().ice_server_updates
    }

    pub fn local_description(&self) -> Option<SessionDescription> {
        self.lock().local_description.clone()
    }

    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.lock().remote_description.clone()
    }

    pub fn transceivers(&self) -> Vec<MediaKind> {
        self.lock().transceivers.clone()
    }

    pub fn tracks(&self) -> Vec<MockTrack> {
        self.lock().tracks.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[async_trait]
impl PeerConnection for MockPeer {
    type LocalTrack = MockTrack;
    type RemoteHandle = ();

    async fn create_offer(&self) -> Result<SessionDescription> {
        let mut state = self.lock();
        state.offers_created += 1;
        Ok(SessionDescription::offer(MOCK_OFFER_SDP))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.lock().local_description = Some(desc);
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.lock().remote_description = Some(desc);
        Ok(())
    }

    async fn ice_servers(&self) -> Vec<IceServer> {
        self.lock().ice_servers.clone()
    }

    async fn set_ice_servers(&self, servers: Vec<IceServer>) -> Result<()> {
        let mut state = self.lock();
        if state.reject_ice_servers {
            return Err(Error::peer("relay servers cannot be changed"));
        }
        state.ice_servers = servers;
        state.ice_server_updates += 1;
        Ok(())
    }

    async fn add_track(&self, track: MockTrack) -> Result<()> {
        self.lock().tracks.push(track);
        Ok(())
    }

    async fn add_recvonly_transceiver(&self, kind: MediaKind) -> Result<()> {
        self.lock().transceivers.push(kind);
        Ok(())
    }

    fn set_event_sink(&self, sink: PeerEventSink<()>) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    async fn close(&self) -> Result<()> {
        self.lock().closed = true;
        Ok(())
    }
}

/// Media source that hands out fixed tracks, or refuses like a denied
/// camera prompt.
pub struct MockMediaSource {
    tracks: Option<Vec<MockTrack>>,
}

impl MockMediaSource {
    pub fn granted(tracks: Vec<MockTrack>) -> Self {
        Self {
            tracks: Some(tracks),
        }
    }

    pub fn denied() -> Self {
        Self { tracks: None }
    }
}

#[async_trait]
impl MediaSource<MockTrack> for MockMediaSource {
    async fn acquire(&self) -> Result<Vec<MockTrack>> {
        self.tracks
            .clone()
            .ok_or_else(|| Error::media_access("permission denied"))
    }
}
