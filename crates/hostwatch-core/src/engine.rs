//! Composition root: one task that owns the channel, the scheduler and the
//! write side of the store.
//!
//! [`Engine::run`] is the single logical timeline. Each `select!` branch
//! (refresh tick, inbound channel event, reconnect deadline, presentation
//! command) runs to completion before the next is polled, so a merge is
//! never interleaved with another merge or a tick.
//!
//! Presentation talks to the engine only through the cloneable
//! [`EngineHandle`].

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};

use crate::channel::{ChannelManager, ConnectionStatus, Inbound, StatusChange};
use crate::config::{EngineConfig, ReconnectConfig};
use crate::derive;
use crate::endpoint::Endpoint;
use crate::error::ConfigError;
use crate::gauge::{GaugeDescriptor, GaugeReading, read_gauges};
use crate::scheduler::RefreshScheduler;
use crate::snapshot::{MetricsSnapshot, SnapshotStore};
use crate::ui_state::UiState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Connect,
    Disconnect,
    Shutdown,
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Exponential reconnect delay: initial, doubling, capped.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            next: initial,
        }
    }

    pub fn from_config(config: &ReconnectConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(config.initial_delay(), config.max_delay()))
    }

    /// The delay to wait now; doubles the following one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.initial;
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
    endpoint: Endpoint,
    channel: ChannelManager,
    scheduler: RefreshScheduler,
    store: SnapshotStore,
    status: watch::Sender<ConnectionStatus>,
    commands: mpsc::UnboundedReceiver<Command>,
    backoff: Option<Backoff>,
    reconnect_at: Option<Instant>,
}

impl Engine {
    /// Validate `config` and build an engine plus the handle presentation
    /// uses. Nothing connects until [`Engine::run`] is polled.
    pub fn new(config: &EngineConfig) -> Result<(Self, EngineHandle), ConfigError> {
        config.validate()?;
        let endpoint = config.endpoint()?;

        let store = SnapshotStore::new();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let engine = Self {
            endpoint,
            channel: ChannelManager::new(config.connect_timeout()),
            scheduler: RefreshScheduler::new(config.refresh_interval()),
            store: store.clone(),
            status: status_tx,
            commands: command_rx,
            backoff: Backoff::from_config(&config.reconnect),
            reconnect_at: None,
        };
        let handle = EngineHandle {
            store,
            status: status_rx,
            commands: command_tx,
            gauges: config.gauges.clone().into(),
            ui: Arc::new(Mutex::new(UiState::new())),
        };
        Ok((engine, handle))
    }

    /// Connect, start refreshing and process events until shutdown is
    /// requested or every handle has been dropped.
    pub async fn run(mut self) {
        let store = self.store.clone();
        self.channel.on_message(move |update| store.merge(update));
        self.scheduler.start();
        self.connect();

        loop {
            let reconnect_at = self.reconnect_at;
            tokio::select! {
                _ = self.scheduler.tick() => {
                    self.scheduler.fire(&mut self.channel);
                }
                inbound = self.channel.recv() => self.on_inbound(inbound),
                _ = wait_until(reconnect_at) => {
                    self.reconnect_at = None;
                    debug!("reconnect deadline reached");
                    self.connect();
                }
                command = self.commands.recv() => match command {
                    Some(Command::Connect) => {
                        self.reconnect_at = None;
                        if let Some(backoff) = self.backoff.as_mut() {
                            backoff.reset();
                        }
                        self.connect();
                    }
                    Some(Command::Disconnect) => {
                        // Cancels any pending retry; the drained channel
                        // reports no further failure to schedule another.
                        self.reconnect_at = None;
                        if let Some(change) = self.channel.disconnect() {
                            self.publish(change);
                        }
                    }
                    Some(Command::Shutdown) | None => break,
                },
            }
        }

        self.teardown();
    }

    fn connect(&mut self) {
        if let Some(change) = self.channel.connect(&self.endpoint) {
            self.publish(change);
        }
    }

    fn on_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Delivered | Inbound::Unhandled => {}
            Inbound::Status(change) => {
                if change.status == ConnectionStatus::Connected {
                    if let Some(backoff) = self.backoff.as_mut() {
                        backoff.reset();
                    }
                }
                let failed = change.is_failure();
                self.publish(change);
                if failed {
                    self.schedule_reconnect();
                }
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        let Some(backoff) = self.backoff.as_mut() else {
            debug!("reconnect disabled; staying disconnected");
            return;
        };
        let delay = backoff.next_delay();
        info!("reconnecting in {} ms", delay.as_millis());
        self.reconnect_at = Some(Instant::now() + delay);
    }

    fn publish(&self, change: StatusChange) {
        match change.reason.as_deref() {
            Some(reason) => warn!("status {}: {reason}", change.status),
            None => debug!("status {}", change.status),
        }
        self.status.send_replace(change.status);
    }

    fn teardown(&mut self) {
        self.reconnect_at = None;
        self.scheduler.stop();
        self.channel.disconnect();
        self.channel.clear_handler();
        self.status.send_replace(ConnectionStatus::Disconnected);
        info!("engine stopped");
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Presentation side
// ---------------------------------------------------------------------------

/// Everything one render needs, captured together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardFrame {
    pub status: ConnectionStatus,
    pub revision: u64,
    pub snapshot: MetricsSnapshot,
    pub gauges: Vec<GaugeReading>,
    pub average_cpu: f64,
    pub process_count: usize,
    pub show_process_detail: bool,
}

/// Cloneable read/command handle onto a running [`Engine`].
#[derive(Clone)]
pub struct EngineHandle {
    store: SnapshotStore,
    status: watch::Receiver<ConnectionStatus>,
    commands: mpsc::UnboundedSender<Command>,
    gauges: Arc<[GaugeDescriptor]>,
    ui: Arc<Mutex<UiState>>,
}

impl EngineHandle {
    /// Capture status, snapshot, derived gauges and UI flags.
    pub fn frame(&self) -> DashboardFrame {
        let show_process_detail = self.ui().show_process_detail();
        let status = *self.status.borrow();
        self.store.read(|snapshot| DashboardFrame {
            status,
            revision: self.store.revision(),
            snapshot: snapshot.clone(),
            gauges: read_gauges(snapshot, &self.gauges),
            average_cpu: derive::average_cpu(snapshot),
            process_count: derive::process_count(snapshot),
            show_process_detail,
        })
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Receiver that changes on every status transition.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Receiver that changes on every merge.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.store.subscribe()
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn show_process_detail(&self) -> bool {
        self.ui().show_process_detail()
    }

    /// Returns the new value.
    pub fn toggle_process_detail(&self) -> bool {
        self.ui().toggle_process_detail()
    }

    /// Ask the engine to (re)connect. False once the engine has stopped.
    pub fn connect(&self) -> bool {
        self.commands.send(Command::Connect).is_ok()
    }

    /// Drop the connection and hold off automatic reconnects until
    /// [`EngineHandle::connect`].
    pub fn disconnect(&self) -> bool {
        self.commands.send(Command::Disconnect).is_ok()
    }

    pub fn shutdown(&self) -> bool {
        self.commands.send(Command::Shutdown).is_ok()
    }

    fn ui(&self) -> MutexGuard<'_, UiState> {
        match self.ui.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::MemoryStats;

    fn unreachable_config() -> EngineConfig {
        // Bind then release a port so nothing is listening on it.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        EngineConfig {
            endpoint: addr.to_string(),
            connect_timeout_ms: 1000,
            reconnect: ReconnectConfig {
                enabled: true,
                initial_delay_ms: 20,
                max_delay_ms: 40,
            },
            ..EngineConfig::default()
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut backoff = Backoff::new(Duration::from_millis(1000), Duration::from_millis(30_000));
        let delays: Vec<u128> = (0..7).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16_000, 30_000, 30_000]);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn backoff_disabled_by_config() {
        let config = ReconnectConfig {
            enabled: false,
            ..ReconnectConfig::default()
        };
        assert!(Backoff::from_config(&config).is_none());
        assert!(Backoff::from_config(&ReconnectConfig::default()).is_some());
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = EngineConfig {
            refresh_interval_ms: 0,
            ..EngineConfig::default()
        };
        assert!(Engine::new(&config).is_err());
    }

    #[test]
    fn initial_frame_is_empty_and_disconnected() {
        let (_engine, handle) = Engine::new(&EngineConfig::default()).unwrap();
        let frame = handle.frame();
        assert_eq!(frame.status, ConnectionStatus::Disconnected);
        assert_eq!(frame.revision, 0);
        assert!(frame.snapshot.is_empty());
        assert_eq!(frame.gauges.len(), 4);
        assert_eq!(frame.process_count, 0);
        assert!(!frame.show_process_detail);
    }

    #[test]
    fn ui_toggle_survives_unrelated_merge() {
        let (_engine, handle) = Engine::new(&EngineConfig::default()).unwrap();
        assert!(handle.toggle_process_detail());

        handle.store().merge(MetricsSnapshot {
            memory: Some(MemoryStats {
                percent: Some(42.0),
                ..Default::default()
            }),
            ..Default::default()
        });

        let frame = handle.frame();
        assert!(frame.show_process_detail);
        assert_eq!(frame.revision, 1);
        assert_eq!(frame.gauges[1].value, 42.0);
    }

    #[test]
    fn commands_fail_once_engine_is_gone() {
        let (engine, handle) = Engine::new(&EngineConfig::default()).unwrap();
        assert!(handle.connect());
        drop(engine);
        assert!(!handle.connect());
        assert!(!handle.disconnect());
        assert!(!handle.shutdown());
    }

    #[tokio::test]
    async fn shutdown_stops_run_and_reports_disconnected() {
        let (engine, handle) = Engine::new(&unreachable_config()).unwrap();
        let task = tokio::spawn(engine.run());
        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("engine did not stop")
            .unwrap();
        assert_eq!(handle.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn run_ends_when_all_handles_drop() {
        let (engine, handle) = Engine::new(&unreachable_config()).unwrap();
        let task = tokio::spawn(engine.run());
        drop(handle);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("engine did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn failed_connect_is_retried() {
        let (engine, handle) = Engine::new(&unreachable_config()).unwrap();
        let mut status = handle.watch_status();
        let task = tokio::spawn(engine.run());

        // Connecting -> Disconnected -> Connecting again via backoff.
        let mut connecting = 0;
        let seen = tokio::time::timeout(Duration::from_secs(5), async {
            while connecting < 2 {
                status.changed().await.unwrap();
                if *status.borrow_and_update() == ConnectionStatus::Connecting {
                    connecting += 1;
                }
            }
        })
        .await;
        assert!(seen.is_ok(), "engine never retried");

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn explicit_disconnect_cancels_pending_reconnect() {
        let mut config = unreachable_config();
        config.reconnect.initial_delay_ms = 300;
        config.reconnect.max_delay_ms = 300;
        let (engine, handle) = Engine::new(&config).unwrap();
        let mut status = handle.watch_status();
        let task = tokio::spawn(engine.run());

        // First attempt fails and a retry is scheduled 300 ms out.
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                status.changed().await.unwrap();
                if *status.borrow_and_update() == ConnectionStatus::Disconnected {
                    break;
                }
            }
        })
        .await
        .expect("first attempt never failed");

        handle.disconnect();
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(!status.has_changed().unwrap(), "engine retried after disconnect");
        assert_eq!(handle.status(), ConnectionStatus::Disconnected);

        handle.shutdown();
        task.await.unwrap();
    }
}
