//! Error types for the telemetry engine.
//!
//! None of these are fatal to a running engine: channel and decode errors are
//! logged and folded into [`ConnectionStatus`](crate::channel::ConnectionStatus).
//! Only [`ConfigError`] ever reaches the caller.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Transport-level failures on the push channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Websocket connect or I/O failure (refused, reset, protocol violation).
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// Handshake did not complete within the connect timeout.
    #[error("connect timed out after {}ms", .0.as_millis())]
    ConnectTimeout(Duration),

    /// Server stopped sending (no ping) for longer than it promised.
    #[error("no traffic from server for {}ms", .0.as_millis())]
    HeartbeatTimeout(Duration),

    /// Server answered the handshake with something unexpected.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Connection ended by the server or the network.
    #[error("connection closed: {0}")]
    Closed(String),
}

/// An inbound frame or payload that could not be interpreted.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty frame")]
    Empty,

    #[error("unknown packet type '{0}'")]
    UnknownPacket(char),

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
