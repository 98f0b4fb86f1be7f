use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use wisp_common::{Error, IceServer, MediaKind, Result};
use wisp_signal::{
    ConnectionState, IceCandidate, PeerConnection, PeerEvent, PeerEventSink, RemoteTrack,
    SdpType, SessionDescription,
};

pub type LocalTrack = Arc<dyn TrackLocal + Send + Sync>;

/// Peer connection backed by webrtc-rs.
///
/// The engine fixes its ICE agent's relay servers when the connection is
/// built, so the relay list is kept here. Servers installed later are
/// reported by [`PeerConnection::ice_servers`] but do not reach the running
/// agent.
pub struct RtcPeer {
    pc: Arc<RTCPeerConnection>,
    ice_servers: Mutex<Vec<IceServer>>,
}

impl RtcPeer {
    pub async fn new(ice_servers: &[IceServer]) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs().map_err(Error::peer)?;
        let registry =
            register_default_interceptors(Registry::new(), &mut m).map_err(Error::peer)?;
        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: ice_servers.iter().map(to_rtc_server).collect(),
            ..Default::default()
        };
        let pc = api.new_peer_connection(config).await.map_err(Error::peer)?;

        Ok(Self {
            pc: Arc::new(pc),
            ice_servers: Mutex::new(ice_servers.to_vec()),
        })
    }

    pub fn inner(&self) -> &Arc<RTCPeerConnection> {
        &self.pc
    }
}

fn to_rtc_server(server: &IceServer) -> RTCIceServer {
    RTCIceServer {
        urls: server.urls.clone(),
        username: server.username.clone().unwrap_or_default(),
        credential: server.credential.clone().unwrap_or_default(),
        ..Default::default()
    }
}

fn to_rtc_description(desc: SessionDescription) -> Result<RTCSessionDescription> {
    match desc.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp),
    }
    .map_err(Error::peer)
}

fn connection_state(state: RTCPeerConnectionState) -> ConnectionState {
    match state {
        RTCPeerConnectionState::Connecting => ConnectionState::Connecting,
        RTCPeerConnectionState::Connected => ConnectionState::Connected,
        RTCPeerConnectionState::Disconnected => ConnectionState::Disconnected,
        RTCPeerConnectionState::Failed => ConnectionState::Failed,
        RTCPeerConnectionState::Closed => ConnectionState::Closed,
        _ => ConnectionState::New,
    }
}

/// Value of the first `a=<name>:` attribute in an SDP blob.
pub fn sdp_attribute(sdp: &str, name: &str) -> Option<String> {
    let prefix = format!("a={}:", name);
    sdp.lines()
        .find_map(|line| line.trim().strip_prefix(prefix.as_str()))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Engine candidates leave `sdpMid` blank and carry no ufrag; both come from
/// the local description when missing.
async fn describe_candidate(
    candidate: &RTCIceCandidate,
    pc: Option<Arc<RTCPeerConnection>>,
) -> Result<IceCandidate> {
    let init = candidate.to_json().map_err(Error::peer)?;
    let local_sdp = match pc {
        Some(pc) => pc.local_description().await.map(|d| d.sdp),
        None => None,
    };
    let from_local = |name: &str| {
        local_sdp
            .as_deref()
            .and_then(|sdp| sdp_attribute(sdp, name))
    };

    Ok(IceCandidate {
        candidate: init.candidate,
        sdp_mid: init
            .sdp_mid
            .filter(|mid| !mid.is_empty())
            .or_else(|| from_local("mid")),
        username_fragment: init
            .username_fragment
            .filter(|ufrag| !ufrag.is_empty())
            .or_else(|| from_local("ice-ufrag")),
    })
}

#[async_trait]
impl PeerConnection for RtcPeer {
    type LocalTrack = LocalTrack;
    type RemoteHandle = Arc<TrackRemote>;

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self.pc.create_offer(None).await.map_err(Error::peer)?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = to_rtc_description(desc)?;
        self.pc
            .set_local_description(desc)
            .await
            .map_err(Error::peer)
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = to_rtc_description(desc)?;
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(Error::peer)
    }

    async fn ice_servers(&self) -> Vec<IceServer> {
        self.ice_servers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn set_ice_servers(&self, servers: Vec<IceServer>) -> Result<()> {
        let mut current = self
            .ice_servers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *current == servers {
            debug!("Relay servers unchanged ({})", servers.len());
            return Ok(());
        }
        warn!(
            "Recording {} relay server(s); the running ICE agent keeps the servers it was built with",
            servers.len()
        );
        *current = servers;
        Ok(())
    }

    async fn add_track(&self, track: LocalTrack) -> Result<()> {
        debug!("Adding local {} track {}", track.kind(), track.id());
        let sender = self.pc.add_track(track).await.map_err(Error::peer)?;

        // Drain RTCP so the interceptors keep running.
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
        });
        Ok(())
    }

    async fn add_recvonly_transceiver(&self, kind: MediaKind) -> Result<()> {
        let codec_type = match kind {
            MediaKind::Audio => RTPCodecType::Audio,
            MediaKind::Video => RTPCodecType::Video,
        };
        self.pc
            .add_transceiver_from_kind(
                codec_type,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: vec![],
                }),
            )
            .await
            .map_err(Error::peer)?;
        Ok(())
    }

    fn set_event_sink(&self, sink: PeerEventSink<Arc<TrackRemote>>) {
        let tx = sink.clone();
        let pc: Weak<RTCPeerConnection> = Arc::downgrade(&self.pc);
        self.pc.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = tx.clone();
            let pc = pc.clone();
            Box::pin(async move {
                let candidate = match c {
                    Some(c) => match describe_candidate(&c, pc.upgrade()).await {
                        Ok(candidate) => Some(candidate),
                        Err(e) => {
                            warn!("Failed to serialize local candidate: {}", e);
                            return;
                        }
                    },
                    None => None,
                };
                let _ = tx.send(PeerEvent::Candidate(candidate));
            })
        }));

        let tx = sink.clone();
        self.pc
            .on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
                let tx = tx.clone();
                Box::pin(async move {
                    let _ = tx.send(PeerEvent::ConnectionState(connection_state(s)));
                })
            }));

        let tx = sink;
        self.pc
            .on_track(Box::new(move |track, _receiver, _transceiver| {
                let tx = tx.clone();
                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => MediaKind::Audio,
                        RTPCodecType::Video => MediaKind::Video,
                        other => {
                            warn!("Ignoring remote track {} of kind {}", track.id(), other);
                            return;
                        }
                    };
                    let stream_id = track.stream_id();
                    let stream_ids = if stream_id.is_empty() {
                        Vec::new()
                    } else {
                        vec![stream_id]
                    };
                    info!(
                        "Remote track {} ({}), codec {}",
                        track.id(),
                        kind,
                        track.codec().capability.mime_type
                    );
                    let _ = tx.send(PeerEvent::Track(RemoteTrack {
                        id: track.id(),
                        kind,
                        stream_ids,
                        handle: track,
                    }));
                })
            }));
    }

    async fn close(&self) -> Result<()> {
        self.pc.close().await.map_err(Error::peer)
    }
}
