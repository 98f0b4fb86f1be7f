use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use wisp_common::{MediaKind, Result};

use crate::peer::PeerConnection;

/// What the client asks the peer connection for before negotiating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// WHIP: send local media.
    Publisher,
    /// WHEP: receive `simulcast` video layers and one audio track.
    Subscriber,
    /// Both at once over a single negotiation.
    Duplex,
}

impl Role {
    pub fn sends_media(&self) -> bool {
        matches!(self, Self::Publisher | Self::Duplex)
    }

    pub fn receives_media(&self) -> bool {
        matches!(self, Self::Subscriber | Self::Duplex)
    }

    /// Configure `peer` for this role. Receive slots are created before local
    /// tracks are attached.
    pub async fn prepare<P: PeerConnection>(
        &self,
        peer: &P,
        simulcast: u8,
        tracks: Vec<P::LocalTrack>,
    ) -> Result<()> {
        if self.receives_media() {
            let layers = simulcast.max(1);
            for _ in 0..layers {
                peer.add_recvonly_transceiver(MediaKind::Video).await?;
            }
            peer.add_recvonly_transceiver(MediaKind::Audio).await?;
            info!("Requested {} video layer(s) and one audio track", layers);
        }

        if self.sends_media() {
            let count = tracks.len();
            for track in tracks {
                peer.add_track(track).await?;
            }
            info!("Attached {} local track(s)", count);
        } else if !tracks.is_empty() {
            debug!("Ignoring {} local track(s) for {} role", tracks.len(), self);
        }
        Ok(())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Publisher => "publisher",
            Self::Subscriber => "subscriber",
            Self::Duplex => "duplex",
        };
        f.write_str(name)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "publisher" | "publish" | "whip" => Ok(Self::Publisher),
            "subscriber" | "subscribe" | "whep" => Ok(Self::Subscriber),
            "duplex" => Ok(Self::Duplex),
            other => Err(format!("unknown role: {other}")),
        }
    }
}
