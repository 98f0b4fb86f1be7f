//! Common error types for Wisp.

use thiserror::Error;

/// Result type alias using Wisp's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for Wisp operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing client configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// The signaling server broke the offer/answer contract
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The signaling server rejected a request
    #[error("network error: {0}")]
    Network(String),

    /// Local media could not be acquired
    #[error("media access error: {0}")]
    MediaAccess(String),

    /// The peer-connection engine failed an operation
    #[error("peer connection error: {0}")]
    Peer(String),

    /// An HTTP request could not be performed
    #[error("http error: {0}")]
    Http(String),

    /// Malformed URL
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Create a config error from any displayable type.
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    /// Create a protocol error from any displayable type.
    pub fn protocol(msg: impl std::fmt::Display) -> Self {
        Self::Protocol(msg.to_string())
    }

    /// Create a network error from any displayable type.
    pub fn network(msg: impl std::fmt::Display) -> Self {
        Self::Network(msg.to_string())
    }

    /// Create a media access error from any displayable type.
    pub fn media_access(msg: impl std::fmt::Display) -> Self {
        Self::MediaAccess(msg.to_string())
    }

    /// Create a peer connection error from any displayable type.
    pub fn peer(msg: impl std::fmt::Display) -> Self {
        Self::Peer(msg.to_string())
    }

    /// Create an http error from any displayable type.
    pub fn http(msg: impl std::fmt::Display) -> Self {
        Self::Http(msg.to_string())
    }

    /// Whether the failure ends the session with no way to continue.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Network(_) | Self::MediaAccess(_))
    }
}
