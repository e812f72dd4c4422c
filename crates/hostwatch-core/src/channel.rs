//! Push-channel lifecycle.
//!
//! [`ChannelManager`] owns one logical connection to the metrics server. The
//! websocket itself lives in a spawned session task; the manager talks to it
//! through two unbounded queues (outbound frames in, session events out).
//! Each session is stamped with a generation number so that anything a
//! torn-down session still manages to emit is discarded.
//!
//! The manager never reconnects on its own. A transport failure flips the
//! status to [`ConnectionStatus::Disconnected`] and is reported through
//! [`ChannelManager::recv`]; whoever owns the manager decides what to do next.

use std::fmt;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::endpoint::Endpoint;
use crate::error::ChannelError;
use crate::protocol::{self, Frame, OpenInfo, UPDATE_EVENT};
use crate::snapshot::MetricsSnapshot;

/// Default bound on the connect + handshake phase.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A status transition, with the failure that caused it if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub status: ConnectionStatus,
    pub reason: Option<String>,
}

impl StatusChange {
    fn new(status: ConnectionStatus) -> Self {
        Self {
            status,
            reason: None,
        }
    }

    fn failed(reason: String) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            reason: Some(reason),
        }
    }

    /// True when the channel went down without being asked to.
    pub fn is_failure(&self) -> bool {
        self.status == ConnectionStatus::Disconnected && self.reason.is_some()
    }
}

/// Result of [`ChannelManager::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the session for transmission.
    Queued,
    /// Not Connected; the request was discarded, not buffered.
    Dropped,
}

/// What [`ChannelManager::recv`] just processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// An update reached the registered message handler.
    Delivered,
    /// An update arrived with no handler registered and was discarded.
    Unhandled,
    /// The connection status changed.
    Status(StatusChange),
}

/// Receives each decoded update, in wire order.
pub type MessageHandler = Box<dyn FnMut(MetricsSnapshot) + Send>;

// ---------------------------------------------------------------------------
// Session plumbing
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum SessionEvent {
    Connected,
    Update(MetricsSnapshot),
    Lost(ChannelError),
}

struct Tagged {
    generation: u64,
    event: SessionEvent,
}

struct Session {
    outbound: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

// ---------------------------------------------------------------------------
// ChannelManager
// ---------------------------------------------------------------------------

pub struct ChannelManager {
    status: ConnectionStatus,
    connect_timeout: Duration,
    generation: u64,
    session: Option<Session>,
    events_tx: mpsc::UnboundedSender<Tagged>,
    events_rx: mpsc::UnboundedReceiver<Tagged>,
    handler: Option<MessageHandler>,
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl ChannelManager {
    pub fn new(connect_timeout: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            status: ConnectionStatus::Disconnected,
            connect_timeout,
            generation: 0,
            session: None,
            events_tx,
            events_rx,
            handler: None,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Start connecting to `endpoint`. A no-op (returns `None`) while already
    /// Connecting or Connected. Must be called inside a tokio runtime.
    pub fn connect(&mut self, endpoint: &Endpoint) -> Option<StatusChange> {
        if self.status != ConnectionStatus::Disconnected {
            debug!("connect ignored: channel already {}", self.status);
            return None;
        }

        self.generation += 1;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_session(
            endpoint.clone(),
            self.generation,
            self.connect_timeout,
            self.events_tx.clone(),
            outbound_rx,
        ));
        self.session = Some(Session {
            outbound: outbound_tx,
            task,
        });
        self.status = ConnectionStatus::Connecting;
        info!("connecting to {endpoint}");
        Some(StatusChange::new(ConnectionStatus::Connecting))
    }

    /// Register the update handler, replacing any previous one.
    pub fn on_message(&mut self, handler: impl FnMut(MetricsSnapshot) + Send + 'static) {
        self.handler = Some(Box::new(handler));
    }

    /// Deregister the update handler. Returns whether one was registered.
    pub fn clear_handler(&mut self) -> bool {
        self.handler.take().is_some()
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Queue a named, payload-less request. Dropped (and logged) unless
    /// Connected; the next refresh tick retries anyway.
    pub fn send(&mut self, request: &str) -> SendOutcome {
        if self.status != ConnectionStatus::Connected {
            debug!("dropping '{request}': channel {}", self.status);
            return SendOutcome::Dropped;
        }
        let Some(session) = self.session.as_ref() else {
            debug!("dropping '{request}': no session");
            return SendOutcome::Dropped;
        };
        match session.outbound.send(protocol::encode_event(request)) {
            Ok(()) => SendOutcome::Queued,
            Err(_) => {
                debug!("dropping '{request}': session already gone");
                SendOutcome::Dropped
            }
        }
    }

    /// Release the channel. Queued session events are discarded; the handler
    /// stays registered. Idempotent.
    pub fn disconnect(&mut self) -> Option<StatusChange> {
        self.teardown();
        while self.events_rx.try_recv().is_ok() {}

        if self.status == ConnectionStatus::Disconnected {
            return None;
        }
        self.status = ConnectionStatus::Disconnected;
        info!("channel disconnected by client");
        Some(StatusChange::new(ConnectionStatus::Disconnected))
    }

    /// Wait for the next live session event and apply it: updates go to the
    /// handler, lifecycle events move the status. Cancel-safe.
    pub async fn recv(&mut self) -> Inbound {
        loop {
            let Some(tagged) = self.events_rx.recv().await else {
                // The manager holds a sender, so the queue never closes.
                return std::future::pending().await;
            };
            if tagged.generation != self.generation {
                continue;
            }
            match tagged.event {
                SessionEvent::Connected => {
                    self.status = ConnectionStatus::Connected;
                    info!("channel connected");
                    return Inbound::Status(StatusChange::new(ConnectionStatus::Connected));
                }
                SessionEvent::Update(update) => {
                    return match self.handler.as_mut() {
                        Some(handler) => {
                            handler(update);
                            Inbound::Delivered
                        }
                        None => {
                            debug!("update discarded: no handler registered");
                            Inbound::Unhandled
                        }
                    };
                }
                SessionEvent::Lost(err) => {
                    warn!("channel lost: {err}");
                    self.teardown();
                    self.status = ConnectionStatus::Disconnected;
                    return Inbound::Status(StatusChange::failed(err.to_string()));
                }
            }
        }
    }

    fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            session.task.abort();
        }
        // Anything the old session still emits is now stale.
        self.generation += 1;
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Session task
// ---------------------------------------------------------------------------

async fn run_session(
    endpoint: Endpoint,
    generation: u64,
    connect_timeout: Duration,
    events: mpsc::UnboundedSender<Tagged>,
    outbound: mpsc::UnboundedReceiver<String>,
) {
    let emit = |event: SessionEvent| {
        // The manager may already be gone; nothing left to tell.
        let _ = events.send(Tagged { generation, event });
    };

    let (mut socket, open, early) = match timeout(connect_timeout, handshake(&endpoint)).await {
        Ok(Ok(established)) => established,
        Ok(Err(err)) => {
            emit(SessionEvent::Lost(err));
            return;
        }
        Err(_) => {
            emit(SessionEvent::Lost(ChannelError::ConnectTimeout(connect_timeout)));
            return;
        }
    };
    debug!("handshake complete sid={}", open.sid);
    emit(SessionEvent::Connected);
    // The server may push before acking the namespace; deliver those now.
    for update in early {
        emit(SessionEvent::Update(update));
    }

    let reason = pump(&mut socket, &open, outbound, &emit).await;
    let _ = socket.close(None).await;
    emit(SessionEvent::Lost(reason));
}

/// Dial, read the open packet, join the default namespace, await the ack.
/// Updates received before the ack are returned in wire order.
async fn handshake(
    endpoint: &Endpoint,
) -> Result<(Socket, OpenInfo, Vec<MetricsSnapshot>), ChannelError> {
    let (mut socket, _) = connect_async(endpoint.url().as_str()).await?;

    let mut open: Option<OpenInfo> = None;
    let mut early = Vec::new();
    while let Some(message) = socket.next().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Close(frame) => {
                return Err(ChannelError::Closed(close_reason(frame.map(|f| f.reason.to_string()))));
            }
            _ => continue,
        };
        match protocol::decode_frame(&text) {
            Ok(Frame::Open(info)) => {
                socket.send(Message::text(protocol::encode_connect())).await?;
                open = Some(info);
            }
            Ok(Frame::Connected) => match open.take() {
                Some(info) => return Ok((socket, info, early)),
                None => {
                    return Err(ChannelError::Handshake(
                        "namespace ack before open packet".to_string(),
                    ));
                }
            },
            Ok(Frame::Ping(probe)) => {
                socket.send(Message::text(protocol::encode_pong(&probe))).await?;
            }
            Ok(Frame::ConnectError(message)) => return Err(ChannelError::Handshake(message)),
            Ok(Frame::Event { name, args }) if name == UPDATE_EVENT => {
                early.extend(accept_update(args));
            }
            Ok(Frame::Event { name, .. }) => debug!("handshake: ignoring event '{name}'"),
            Ok(Frame::Close) | Ok(Frame::Disconnected) => {
                return Err(ChannelError::Closed("server closed during handshake".to_string()));
            }
            Ok(other) => debug!("handshake: ignoring {other:?}"),
            Err(err) => return Err(ChannelError::Handshake(err.to_string())),
        }
    }
    Err(ChannelError::Closed("stream ended during handshake".to_string()))
}

/// Shuttle frames until the link fails; returns why it ended.
async fn pump(
    socket: &mut Socket,
    open: &OpenInfo,
    mut outbound: mpsc::UnboundedReceiver<String>,
    emit: &impl Fn(SessionEvent),
) -> ChannelError {
    let silence_limit = open.silence_limit();
    let mut deadline = Instant::now() + silence_limit;

    loop {
        tokio::select! {
            message = socket.next() => {
                deadline = Instant::now() + silence_limit;
                let text = match message {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(frame))) => {
                        return ChannelError::Closed(close_reason(frame.map(|f| f.reason.to_string())));
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => return ChannelError::Transport(err),
                    None => return ChannelError::Closed("stream ended".to_string()),
                };
                match protocol::decode_frame(&text) {
                    Ok(Frame::Ping(probe)) => {
                        if let Err(err) = socket.send(Message::text(protocol::encode_pong(&probe))).await {
                            return ChannelError::Transport(err);
                        }
                    }
                    Ok(Frame::Event { name, args }) if name == UPDATE_EVENT => {
                        if let Some(update) = accept_update(args) {
                            emit(SessionEvent::Update(update));
                        }
                    }
                    Ok(Frame::Event { name, .. }) => debug!("ignoring event '{name}'"),
                    Ok(Frame::Close) => return ChannelError::Closed("server sent close".to_string()),
                    Ok(Frame::Disconnected) => {
                        return ChannelError::Closed("server disconnected namespace".to_string());
                    }
                    Ok(other) => debug!("ignoring {other:?}"),
                    Err(err) => warn!("discarding undecodable frame: {err}"),
                }
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    return ChannelError::Closed("client released channel".to_string());
                };
                if let Err(err) = socket.send(Message::text(frame)).await {
                    return ChannelError::Transport(err);
                }
            }
            _ = sleep_until(deadline) => {
                return ChannelError::HeartbeatTimeout(silence_limit);
            }
        }
    }
}

/// Decode an `update` event, logging the server notice. Malformed payloads
/// are logged and dropped whole.
fn accept_update(args: Vec<serde_json::Value>) -> Option<MetricsSnapshot> {
    match protocol::decode_update(args) {
        Ok(payload) => {
            if let Some(notice) = payload.message.as_deref() {
                info!("server: {notice}");
            }
            debug!("update fields={:?}", payload.metrics.present_fields());
            Some(payload.metrics)
        }
        Err(err) => {
            warn!("discarding malformed update: {err}");
            None
        }
    }
}

fn close_reason(reason: Option<String>) -> String {
    match reason {
        Some(reason) if !reason.is_empty() => reason,
        _ => "close frame".to_string(),
    }
}
