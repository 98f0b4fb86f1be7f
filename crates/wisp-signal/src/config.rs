use serde::{Deserialize, Serialize};
use url::Url;

use wisp_common::{Error, IceServer, Result};

pub const DEFAULT_SIMULCAST: u8 = 1;

fn default_simulcast() -> u8 {
    DEFAULT_SIMULCAST
}

/// Caller-facing client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// WHIP/WHEP endpoint the offer is posted to.
    #[serde(default)]
    pub endpoint_url: String,
    /// Explicit relay servers. When non-empty, servers advertised by the
    /// endpoint are ignored.
    #[serde(default)]
    pub ice_servers: Vec<IceServer>,
    /// Number of receive-only video slots requested by receiving roles.
    #[serde(default = "default_simulcast")]
    pub simulcast: u8,
    /// Bearer token sent with every signaling request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl ClientConfig {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            ice_servers: Vec::new(),
            simulcast: DEFAULT_SIMULCAST,
            auth_token: None,
        }
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<IceServer>) -> Self {
        self.ice_servers = ice_servers;
        self
    }

    pub fn with_simulcast(mut self, simulcast: u8) -> Self {
        self.simulcast = simulcast;
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Parse and check the endpoint URL.
    pub fn validate(&self) -> Result<Url> {
        let raw = self.endpoint_url.trim();
        if raw.is_empty() {
            return Err(Error::config("endpoint URL is required"));
        }

        let url = Url::parse(raw)
            .map_err(|e| Error::config(format!("invalid endpoint URL {raw:?}: {e}")))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(Error::config(format!(
                "endpoint URL must be http or https, got {other}"
            ))),
        }
    }

    /// Simulcast layer count with the zero case clamped to one.
    pub fn simulcast_layers(&self) -> u8 {
        self.simulcast.max(1)
    }
}
