//! Relay server discovery from the offer response's `Link` header.
//!
//! Servers advertise STUN/TURN servers as
//! `<turn:host>; rel="ice-server"; username="u"; credential="p"; credential-type="password"`,
//! repeated or comma-joined. The discovered set is installed whole, and only
//! when the caller configured no relay servers of its own.

use reqwest::header::{HeaderMap, LINK};
use tracing::{debug, info, warn};

use wisp_common::{IceServer, Result, ICE_SERVER_REL};

use crate::peer::PeerConnection;

/// Parse one `Link` header value into relay server descriptors.
///
/// Entries without `rel="ice-server"` are ignored, and entries whose URL is not
/// enclosed in angle brackets are dropped without failing the rest.
pub fn parse_link_header(value: &str) -> Vec<IceServer> {
    value.split(',').filter_map(parse_entry).collect()
}

/// Parse every `Link` header on a response, in order.
pub fn parse_link_headers(headers: &HeaderMap) -> Vec<IceServer> {
    let joined = headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| match value.to_str() {
            Ok(text) => Some(text),
            Err(_) => {
                debug!("Skipping Link header with non-ASCII content");
                None
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    parse_link_header(&joined)
}

fn parse_entry(entry: &str) -> Option<IceServer> {
    let segments: Vec<&str> = entry.split(';').map(str::trim).collect();
    if !segments.iter().any(|segment| *segment == ICE_SERVER_REL) {
        return None;
    }

    let url = bracketed_url(segments.first()?)?;
    let mut server = IceServer::new(url);
    for segment in &segments[1..] {
        if let Some(value) = segment.strip_prefix("username=") {
            server.username = Some(unquote(value));
        } else if let Some(value) = segment.strip_prefix("credential=") {
            server.credential = Some(unquote(value));
        } else if let Some(value) = segment.strip_prefix("credential-type=") {
            server.credential_type = Some(unquote(value));
        }
    }
    Some(server)
}

fn bracketed_url(segment: &str) -> Option<&str> {
    let start = segment.find('<')?;
    let end = segment[start + 1..].find('>')? + start + 1;
    let url = segment[start + 1..end].trim();
    (!url.is_empty()).then_some(url)
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches('"').to_string()
}

/// Applies discovered relay servers to a peer connection.
pub struct RelayServerDiscovery;

impl RelayServerDiscovery {
    /// Install `discovered` when it is non-empty and the peer has no relay
    /// servers configured. Returns whether the configuration changed. An
    /// engine that refuses the list is logged and leaves the session usable.
    pub async fn apply<P: PeerConnection>(peer: &P, discovered: Vec<IceServer>) -> Result<bool> {
        if discovered.is_empty() {
            return Ok(false);
        }

        let configured = peer.ice_servers().await;
        if !configured.is_empty() {
            debug!(
                "Ignoring {} advertised relay server(s): {} configured explicitly",
                discovered.len(),
                configured.len()
            );
            return Ok(false);
        }

        let count = discovered.len();
        match peer.set_ice_servers(discovered).await {
            Ok(()) => {
                info!("Installed {} relay server(s) from Link header", count);
                Ok(true)
            }
            Err(e) => {
                warn!("Failed to install {} advertised relay server(s): {}", count, e);
                Ok(false)
            }
        }
    }

    /// Parse the response headers and apply the result.
    pub async fn apply_from_headers<P: PeerConnection>(
        peer: &P,
        headers: &HeaderMap,
    ) -> Result<bool> {
        Self::apply(peer, parse_link_headers(headers)).await
    }
}
