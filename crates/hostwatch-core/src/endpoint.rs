//! Metrics server address → websocket connect URL.

use std::fmt;

use url::Url;

use crate::error::ConfigError;
use crate::protocol::ENGINE_IO_VERSION;

/// Default Socket.IO mount point.
const SOCKET_IO_PATH: &str = "/socket.io/";

/// A validated push-channel endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    display: String,
    url: Url,
}

impl Endpoint {
    /// Parse a server address.
    ///
    /// Accepts `http://host:port`, `ws://host:port[/path]` or a bare
    /// `host:port`. An empty path becomes `/socket.io/` and the Engine.IO
    /// query is added unless the caller already supplied one.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        let invalid = |reason: &str| ConfigError::InvalidEndpoint {
            endpoint: raw.to_string(),
            reason: reason.to_string(),
        };
        if trimmed.is_empty() {
            return Err(invalid("empty address"));
        }

        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}")
        };
        let mut url = Url::parse(&with_scheme).map_err(|e| invalid(&e.to_string()))?;

        match url.scheme() {
            "ws" => {}
            "http" => url
                .set_scheme("ws")
                .map_err(|_| invalid("cannot map http to ws"))?,
            "https" | "wss" => return Err(invalid("TLS endpoints are not supported")),
            other => return Err(invalid(&format!("unsupported scheme '{other}'"))),
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(invalid("missing host"));
        }

        if url.path().is_empty() || url.path() == "/" {
            url.set_path(SOCKET_IO_PATH);
        }
        let has_eio = url.query_pairs().any(|(key, _)| key == "EIO");
        if !has_eio {
            url.query_pairs_mut()
                .append_pair("EIO", &ENGINE_IO_VERSION.to_string())
                .append_pair("transport", "websocket");
        }

        Ok(Self {
            display: trimmed.to_string(),
            url,
        })
    }

    /// The websocket URL the channel dials.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}
