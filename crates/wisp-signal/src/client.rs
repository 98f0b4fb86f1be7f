//! Client facade: one role, one peer connection, one signaling session.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;

use wisp_common::{Error, Result};

use crate::config::ClientConfig;
use crate::events::SessionEvent;
use crate::pairer::{StreamPairing, StreamSink, TrackPairer};
use crate::peer::{MediaSource, PeerConnection, PeerEvent};
use crate::role::Role;
use crate::session::{SessionState, SignalingSession};

type Pairer<P> = Arc<Mutex<TrackPairer<<P as PeerConnection>::RemoteHandle>>>;
type Sink<P> = Arc<dyn StreamSink<<P as PeerConnection>::RemoteHandle>>;

pub struct WhipClient<P: PeerConnection> {
    config: ClientConfig,
    role: Role,
    session: Arc<SignalingSession<P>>,
    pairer: Pairer<P>,
    media: Option<Arc<dyn MediaSource<P::LocalTrack>>>,
    sink: Option<Sink<P>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl<P: PeerConnection> WhipClient<P> {
    pub fn new(config: ClientConfig, role: Role, peer: Arc<P>) -> Result<Self> {
        let session = SignalingSession::new(&config, peer)?;
        Ok(Self {
            config,
            role,
            session: Arc::new(session),
            pairer: Arc::new(Mutex::new(TrackPairer::new())),
            media: None,
            sink: None,
            pump: Mutex::new(None),
        })
    }

    /// Where sending roles get their local tracks from.
    pub fn with_media_source(mut self, source: impl MediaSource<P::LocalTrack> + 'static) -> Self {
        self.media = Some(Arc::new(source));
        self
    }

    /// Rendering collaborator for paired remote streams.
    pub fn with_sink(mut self, sink: Sink<P>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SignalingSession<P>> {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub async fn session_url(&self) -> Option<Url> {
        self.session.session_url().await
    }

    pub fn events(&self) -> mpsc::UnboundedReceiver<SessionEvent<P::RemoteHandle>> {
        self.session.events().subscribe()
    }

    pub fn pairings(&self) -> Vec<StreamPairing<P::RemoteHandle>> {
        self.pairer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pairings()
            .to_vec()
    }

    /// Configure the peer for the role and negotiate.
    ///
    /// Returns `Ok(false)` when local media could not be acquired (nothing is
    /// sent) or when the endpoint rejected the offer.
    pub async fn start(&self) -> Result<bool> {
        let tracks = if self.role.sends_media() {
            match self.acquire_media().await {
                Ok(tracks) => tracks,
                Err(Error::MediaAccess(reason)) => {
                    warn!("Local media unavailable, {} not started: {}", self.role, reason);
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
        } else {
            Vec::new()
        };

        let peer = self.session.peer();
        if !self.config.ice_servers.is_empty() {
            peer.set_ice_servers(self.config.ice_servers.clone()).await?;
        }

        self.spawn_pump();
        self.role
            .prepare(peer.as_ref(), self.config.simulcast_layers(), tracks)
            .await?;

        info!("Starting {} session with {}", self.role, self.session.endpoint_url());
        let state = self.session.negotiate().await?;
        Ok(state == SessionState::Negotiated)
    }

    async fn acquire_media(&self) -> Result<Vec<P::LocalTrack>> {
        match &self.media {
            Some(source) => source.acquire().await,
            None => Err(Error::media_access("no media source configured")),
        }
    }

    fn spawn_pump(&self) {
        let mut pump = self.pump.lock().unwrap_or_else(PoisonError::into_inner);
        if pump.is_some() {
            return;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.session.peer().set_event_sink(tx);
        *pump = Some(tokio::spawn(pump_peer_events(
            rx,
            Arc::clone(&self.session),
            Arc::clone(&self.pairer),
            self.sink.clone(),
        )));
    }

    /// Tear down the remote session and close the peer connection.
    pub async fn stop(&self) -> Result<()> {
        let pump = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pump) = pump {
            pump.abort();
        }

        let teardown = self.session.terminate().await;
        self.session.peer().close().await?;
        teardown
    }
}

impl<P: PeerConnection> Drop for WhipClient<P> {
    fn drop(&mut self) {
        if let Some(pump) = self
            .pump
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pump.abort();
        }
    }
}

/// Feed engine notifications to the trickler and the track pairer, one at a
/// time and in the order the engine raised them.
async fn pump_peer_events<P: PeerConnection>(
    mut rx: mpsc::UnboundedReceiver<PeerEvent<P::RemoteHandle>>,
    session: Arc<SignalingSession<P>>,
    pairer: Pairer<P>,
    sink: Option<Sink<P>>,
) {
    while let Some(event) = rx.recv().await {
        match event {
            PeerEvent::Candidate(candidate) => session.on_candidate(candidate).await,
            PeerEvent::ConnectionState(state) => {
                info!("Peer connection state: {}", state);
                session.events().emit(SessionEvent::ConnectionState(state));
            }
            PeerEvent::Track(track) => {
                info!(
                    "Remote {} track {} ({} stream(s))",
                    track.kind,
                    track.id,
                    track.stream_ids.len()
                );
                let fresh = pairer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .on_track(track);
                for pairing in fresh {
                    info!(
                        "Stream {} ready (video {}, audio {})",
                        pairing.index,
                        pairing.video.id,
                        pairing.audio.as_ref().map_or("none", |t| t.id.as_str())
                    );
                    if let Some(sink) = &sink {
                        sink.render(&pairing);
                    }
                    session.events().emit(SessionEvent::TrackPaired(pairing));
                }
            }
        }
    }
}
