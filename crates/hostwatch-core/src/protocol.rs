//! Push-channel wire codec: Socket.IO events over an Engine.IO v4 websocket.
//!
//! Every websocket text frame carries one Engine.IO packet: a single digit
//! type followed by its data. Engine.IO MESSAGE packets (`4`) carry a
//! Socket.IO packet with its own type digit, an optional `/namespace,`
//! prefix, an optional ack id and a JSON array body:
//!
//! ```text
//! 0{"sid":"..","pingInterval":25000,"pingTimeout":20000}   open
//! 2 / 3                                                    ping / pong
//! 40 / 40{"sid":".."}                                      connect / ack
//! 42["request_update"]                                     outbound event
//! 42["update",{"cpu":[..],"memory":{..}}]                  inbound event
//! ```

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::DecodeError;
use crate::snapshot::MetricsSnapshot;

/// Outbound event asking the server to push a fresh snapshot.
pub const REQUEST_UPDATE: &str = "request_update";

/// Inbound event carrying a (partial) snapshot.
pub const UPDATE_EVENT: &str = "update";

/// Engine.IO protocol revision requested in the connect URL.
pub const ENGINE_IO_VERSION: u8 = 4;

/// Used when the server's open packet omits its heartbeat settings.
const DEFAULT_PING_INTERVAL_MS: u64 = 25_000;
const DEFAULT_PING_TIMEOUT_MS: u64 = 20_000;

/// Session parameters from the Engine.IO open packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    #[serde(default)]
    pub sid: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    DEFAULT_PING_INTERVAL_MS
}

fn default_ping_timeout() -> u64 {
    DEFAULT_PING_TIMEOUT_MS
}

impl OpenInfo {
    /// How long the link may stay silent before it is considered dead.
    pub fn silence_limit(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

impl Default for OpenInfo {
    fn default() -> Self {
        Self {
            sid: String::new(),
            ping_interval: DEFAULT_PING_INTERVAL_MS,
            ping_timeout: DEFAULT_PING_TIMEOUT_MS,
        }
    }
}

/// One decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Engine.IO open (`0`).
    Open(OpenInfo),
    /// Engine.IO close (`1`).
    Close,
    /// Engine.IO ping (`2`), with optional probe payload to echo.
    Ping(String),
    /// Engine.IO pong (`3`).
    Pong,
    /// Engine.IO noop (`6`).
    Noop,
    /// Socket.IO connect acknowledgement (`40`).
    Connected,
    /// Socket.IO connect error (`44`).
    ConnectError(String),
    /// Socket.IO disconnect (`41`).
    Disconnected,
    /// Socket.IO event (`42`): name plus arguments.
    Event { name: String, args: Vec<Value> },
    /// Packets this client never acts on (upgrade, ack, binary).
    Ignored(&'static str),
}

/// A decoded `update` event payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UpdatePayload {
    #[serde(flatten)]
    pub metrics: MetricsSnapshot,
    /// Free-form notice the server attaches to its first push.
    #[serde(default)]
    pub message: Option<String>,
}

/// Decode one websocket text frame.
pub fn decode_frame(text: &str) -> Result<Frame, DecodeError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(DecodeError::Empty)?;
    let rest = chars.as_str();
    match kind {
        '0' => Ok(Frame::Open(serde_json::from_str(rest)?)),
        '1' => Ok(Frame::Close),
        '2' => Ok(Frame::Ping(rest.to_string())),
        '3' => Ok(Frame::Pong),
        '4' => decode_message(rest),
        '5' => Ok(Frame::Ignored("upgrade")),
        '6' => Ok(Frame::Noop),
        other => Err(DecodeError::UnknownPacket(other)),
    }
}

fn decode_message(text: &str) -> Result<Frame, DecodeError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(DecodeError::Empty)?;
    let body = strip_namespace(chars.as_str());
    match kind {
        '0' => Ok(Frame::Connected),
        '1' => Ok(Frame::Disconnected),
        '2' => decode_event(body),
        '3' => Ok(Frame::Ignored("ack")),
        '4' => Ok(Frame::ConnectError(connect_error_message(body))),
        '5' | '6' => Ok(Frame::Ignored("binary")),
        other => Err(DecodeError::UnknownPacket(other)),
    }
}

/// Drop a leading `/namespace,` if present.
fn strip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        match body.find(',') {
            Some(idx) => &body[idx + 1..],
            None => "",
        }
    } else {
        body
    }
}

fn decode_event(body: &str) -> Result<Frame, DecodeError> {
    // Optional ack id between the type digit and the array.
    let body = body.trim_start_matches(|c: char| c.is_ascii_digit());
    let value: Value = serde_json::from_str(body)?;
    let Value::Array(mut items) = value else {
        return Err(DecodeError::MalformedEvent(
            "event body is not an array".to_string(),
        ));
    };
    if items.is_empty() {
        return Err(DecodeError::MalformedEvent("event has no name".to_string()));
    }
    let name = match items.remove(0) {
        Value::String(name) => name,
        other => {
            return Err(DecodeError::MalformedEvent(format!(
                "event name is not a string: {other}"
            )));
        }
    };
    Ok(Frame::Event { name, args: items })
}

fn connect_error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        _ => body.to_string(),
    }
}

/// Decode the arguments of an `update` event. The first argument must be a
/// JSON object; anything else rejects the whole payload.
pub fn decode_update(args: Vec<Value>) -> Result<UpdatePayload, DecodeError> {
    let Some(first) = args.into_iter().next() else {
        return Err(DecodeError::MalformedEvent(
            "update event has no payload".to_string(),
        ));
    };
    if !first.is_object() {
        return Err(DecodeError::MalformedEvent(format!(
            "update payload is not an object: {first}"
        )));
    }
    Ok(serde_json::from_value(first)?)
}

/// Socket.IO connect request for the default namespace.
pub fn encode_connect() -> String {
    "40".to_string()
}

/// Engine.IO pong echoing the ping's probe payload.
pub fn encode_pong(probe: &str) -> String {
    format!("3{probe}")
}

/// Socket.IO event with a name and no payload.
pub fn encode_event(name: &str) -> String {
    // A one-element string array cannot fail to serialize.
    let body = serde_json::to_string(&[name]).unwrap_or_else(|_| format!("[\"{name}\"]"));
    format!("42{body}")
}
