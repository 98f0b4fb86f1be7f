//! Offer/answer session lifecycle.
//!
//! State machine:
//! - IDLE: created, nothing sent
//! - OFFER_SENT: local offer applied and POSTed to the endpoint
//! - NEGOTIATED: answer applied, session URL known, queued candidates flushed
//! - FAILED: offer rejected (event) or protocol broken (error)
//! - CLOSED: torn down by the caller

use reqwest::header::{HeaderMap, LOCATION};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};
use url::Url;

use wisp_common::{Error, Result, CONTENT_TYPE_SDP};

use crate::config::ClientConfig;
use crate::events::{EventHub, ResponseError, SessionEvent};
use crate::http::SignalingHttp;
use crate::link::RelayServerDiscovery;
use crate::peer::{IceCandidate, PeerConnection, SessionDescription};
use crate::trickle::CandidateTrickler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    OfferSent,
    Negotiated,
    Failed,
    Closed,
}

pub type SessionEvents<P> = EventHub<SessionEvent<<P as PeerConnection>::RemoteHandle>>;

pub struct SignalingSession<P: PeerConnection> {
    endpoint_url: Url,
    http: SignalingHttp,
    peer: Arc<P>,
    state: Mutex<SessionState>,
    trickler: CandidateTrickler,
    events: Arc<SessionEvents<P>>,
}

impl<P: PeerConnection> SignalingSession<P> {
    /// Fails with [`Error::Config`] when the endpoint URL is missing or invalid.
    pub fn new(config: &ClientConfig, peer: Arc<P>) -> Result<Self> {
        let endpoint_url = config.validate()?;
        let http = SignalingHttp::new(config.auth_token.clone());
        Ok(Self::with_http(endpoint_url, http, peer))
    }

    pub fn with_http(endpoint_url: Url, http: SignalingHttp, peer: Arc<P>) -> Self {
        Self {
            endpoint_url,
            trickler: CandidateTrickler::new(http.clone()),
            http,
            peer,
            state: Mutex::new(SessionState::Idle),
            events: Arc::new(EventHub::new()),
        }
    }

    pub fn endpoint_url(&self) -> &Url {
        &self.endpoint_url
    }

    pub fn peer(&self) -> &Arc<P> {
        &self.peer
    }

    pub fn events(&self) -> &Arc<SessionEvents<P>> {
        &self.events
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: SessionState) {
        let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        debug!("Session state {:?} -> {:?}", *current, state);
        *current = state;
    }

    pub async fn session_url(&self) -> Option<Url> {
        self.trickler.session_url().await
    }

    pub fn trickler(&self) -> &CandidateTrickler {
        &self.trickler
    }

    /// Forward a candidate-discovered notification to the trickler.
    pub async fn on_candidate(&self, candidate: Option<IceCandidate>) {
        self.trickler.on_candidate(candidate).await;
    }

    /// Run the offer/answer exchange once.
    ///
    /// A rejected offer is reported through a [`SessionEvent::ResponseError`]
    /// and returns `Ok(SessionState::Failed)`. A successful response without a
    /// `Location` header is a protocol error. Once a session URL has been
    /// assigned, further calls fail with a protocol error before any offer is
    /// made and leave the state untouched. Calls must not overlap.
    pub async fn negotiate(&self) -> Result<SessionState> {
        if let Some(existing) = self.trickler.session_url().await {
            warn!("Session already established at {}", existing);
            return Err(Error::protocol(format!(
                "session already established: {existing}"
            )));
        }

        self.set_state(SessionState::OfferSent);
        match self.exchange().await {
            Ok(state) => {
                self.set_state(state);
                Ok(state)
            }
            Err(e) => {
                error!("Negotiation with {} failed: {}", self.endpoint_url, e);
                self.set_state(SessionState::Failed);
                Err(e)
            }
        }
    }

    async fn exchange(&self) -> Result<SessionState> {
        let offer = self.peer.create_offer().await?;
        self.peer.set_local_description(offer.clone()).await?;

        info!("Posting offer to {}", self.endpoint_url);
        let response = self
            .http
            .post(&self.endpoint_url, CONTENT_TYPE_SDP, offer.sdp)
            .send()
            .await
            .map_err(Error::http)?;

        let status = response.status();
        let headers = response.headers().clone();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Offer rejected by {}: {}", self.endpoint_url, status);
            self.events.emit(SessionEvent::ResponseError(ResponseError {
                status: status.as_u16(),
                headers: header_pairs(&headers),
                body,
            }));
            return Ok(SessionState::Failed);
        }

        let location = headers
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| Error::protocol("offer accepted without a Location header"))?;
        let session_url = self.endpoint_url.join(location)?;
        info!("Session created: {}", session_url);

        RelayServerDiscovery::apply_from_headers(self.peer.as_ref(), &headers).await?;

        let answer = response.text().await.map_err(Error::http)?;
        self.peer
            .set_remote_description(SessionDescription::answer(answer))
            .await?;

        let flushed = self.trickler.establish(session_url).await?;
        debug!("Session established, {} queued candidate(s) flushed", flushed);
        Ok(SessionState::Negotiated)
    }

    /// Tear the session down with `DELETE <session url>`. Further candidates
    /// are dropped. Without a session URL this only closes locally.
    pub async fn terminate(&self) -> Result<()> {
        let session_url = self.trickler.close().await;
        self.set_state(SessionState::Closed);

        let Some(session_url) = session_url else {
            debug!("No remote session to tear down");
            return Ok(());
        };

        let response = self
            .http
            .delete(&session_url)
            .send()
            .await
            .map_err(Error::http)?;
        if response.status().is_success() {
            info!("Session terminated: {}", session_url);
            Ok(())
        } else {
            warn!(
                "Teardown of {} rejected with {}",
                session_url,
                response.status()
            );
            Err(Error::network(format!(
                "DELETE {} returned {}",
                session_url,
                response.status()
            )))
        }
    }
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}
