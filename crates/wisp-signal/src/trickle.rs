//! Trickle ICE: relays candidates discovered after the offer was sent.
//!
//! Candidates that arrive before the server has assigned a session URL are
//! queued and flushed, in arrival order, the moment the URL becomes known.
//! The queue-or-relay decision and the flush share one lock, so a candidate
//! discovered mid-flush is relayed after every queued one.

use std::collections::VecDeque;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use wisp_common::{Error, Result, CONTENT_TYPE_TRICKLE_ICE};

use crate::http::SignalingHttp;
use crate::peer::IceCandidate;

/// Media line the fragment opens with. Remote parsers only look at the mid and
/// candidate lines, so this stays fixed whatever the candidate's media is.
pub const PLACEHOLDER_MEDIA_LINE: &str = "m=audio 9 RTP/AVP 0";

/// Build the `application/trickle-ice-sdpfrag` body for one candidate.
///
/// The ICE password is not included: it is only available by parsing the
/// local offer, and lenient servers accept fragments without it.
pub fn sdp_fragment(candidate: &IceCandidate) -> String {
    [
        PLACEHOLDER_MEDIA_LINE.to_string(),
        format!(
            "a=ice-ufrag:{}",
            candidate.username_fragment.as_deref().unwrap_or_default()
        ),
        format!("a=mid:{}", candidate.sdp_mid.as_deref().unwrap_or_default()),
        format!("a={}", candidate.candidate),
    ]
    .join("\r\n")
}

#[derive(Debug, Default)]
struct TrickleState {
    session_url: Option<Url>,
    queue: VecDeque<IceCandidate>,
    closed: bool,
}

pub struct CandidateTrickler {
    http: SignalingHttp,
    state: Mutex<TrickleState>,
}

impl CandidateTrickler {
    pub fn new(http: SignalingHttp) -> Self {
        Self {
            http,
            state: Mutex::new(TrickleState::default()),
        }
    }

    /// Handle a candidate-discovered notification. `None` or an empty
    /// candidate marks the end of gathering and is never sent.
    pub async fn on_candidate(&self, candidate: Option<IceCandidate>) {
        let Some(candidate) = candidate.filter(|c| !c.is_end_of_candidates()) else {
            debug!("Candidate gathering complete");
            return;
        };

        let mut state = self.state.lock().await;
        if state.closed {
            debug!("Dropping candidate after session teardown");
            return;
        }

        match state.session_url.clone() {
            Some(url) => {
                self.relay(&url, &candidate).await;
            }
            None => {
                state.queue.push_back(candidate);
                debug!(
                    "Queued candidate until session is established ({} pending)",
                    state.queue.len()
                );
            }
        }
    }

    /// Record the session URL and flush the queue in arrival order. Returns
    /// how many queued candidates were relayed.
    pub async fn establish(&self, session_url: Url) -> Result<usize> {
        let mut state = self.state.lock().await;
        if let Some(existing) = &state.session_url {
            return Err(Error::protocol(format!(
                "session URL already assigned: {existing}"
            )));
        }
        state.session_url = Some(session_url.clone());

        let pending: Vec<IceCandidate> = state.queue.drain(..).collect();
        if !pending.is_empty() {
            debug!("Flushing {} queued candidate(s)", pending.len());
        }
        for candidate in &pending {
            self.relay(&session_url, candidate).await;
        }
        Ok(pending.len())
    }

    async fn relay(&self, session_url: &Url, candidate: &IceCandidate) -> bool {
        let request = self.http.patch(
            session_url,
            CONTENT_TYPE_TRICKLE_ICE,
            sdp_fragment(candidate),
        );
        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Trickled candidate: {}", candidate.candidate);
                true
            }
            Ok(response) => {
                warn!(
                    "Trickle PATCH to {} rejected with {}",
                    session_url,
                    response.status()
                );
                false
            }
            Err(e) => {
                warn!("Trickle PATCH to {} failed: {}", session_url, e);
                false
            }
        }
    }

    pub async fn session_url(&self) -> Option<Url> {
        self.state.lock().await.session_url.clone()
    }

    pub async fn pending(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    /// Stop relaying. Returns the session URL the first time it is called on
    /// an established session, so teardown happens at most once.
    pub async fn close(&self) -> Option<Url> {
        let mut state = self.state.lock().await;
        if state.closed {
            return None;
        }
        state.closed = true;
        state.queue.clear();
        state.session_url.clone()
    }
}
