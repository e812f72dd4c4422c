//! # hostwatch-core
//!
//! **A live mirror of a remote host's resource metrics.**
//!
//! `hostwatch-core` is the telemetry synchronization engine behind the
//! `hostwatch` dashboard. It keeps one push channel open to a metrics server,
//! asks for a fresh snapshot on a fixed cadence, merges every partial update
//! into a single local snapshot, and derives the gauge values presentation
//! draws.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hostwatch_core::{Engine, EngineConfig};
//!
//! # async fn demo() -> Result<(), hostwatch_core::ConfigError> {
//! let config = EngineConfig {
//!     endpoint: "http://127.0.0.1:5000".into(),
//!     ..EngineConfig::default()
//! };
//! let (engine, handle) = Engine::new(&config)?;
//! tokio::spawn(engine.run());
//!
//! let mut updates = handle.subscribe();
//! updates.changed().await.ok();
//! for gauge in handle.frame().gauges {
//!     println!("{:<10} {:>6.1}  needle {:>6.1}°", gauge.label, gauge.value, gauge.state.angle_degrees);
//! }
//! handle.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ChannelManager → SnapshotStore (merge) → MetricDeriver → presentation
//!
//! - [`ChannelManager`]: connect/disconnect lifecycle and typed inbound
//!   updates. Never retries on its own.
//! - [`RefreshScheduler`]: one `request_update` per period, independent of
//!   response latency.
//! - [`SnapshotStore`]: the latest snapshot; shallow last-writer-wins merge.
//! - [`derive`]: pure gauge math, every percentage gauge on the same
//!   `-45°..225°` needle sweep.
//! - [`UiState`]: local toggles, never touched by updates.
//!
//! [`Engine`] wires them onto one task and adds optional reconnect backoff;
//! [`EngineHandle`] is what presentation holds.

pub mod channel;
pub mod config;
pub mod derive;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod gauge;
pub mod protocol;
pub mod scheduler;
pub mod snapshot;
pub mod ui_state;

pub use channel::{ChannelManager, ConnectionStatus, Inbound, SendOutcome, StatusChange};
pub use config::{EngineConfig, ReconnectConfig};
pub use derive::{
    GaugeState, ProcessSort, average_cpu, format_bytes, gauge_state, process_count,
    process_count_gauge_state, top_processes,
};
pub use endpoint::Endpoint;
pub use engine::{Backoff, DashboardFrame, Engine, EngineHandle};
pub use error::{ChannelError, ConfigError, DecodeError};
pub use gauge::{
    GaugeDescriptor, GaugeMetric, GaugeReading, default_gauges, read_gauge, read_gauges,
};
pub use scheduler::RefreshScheduler;
pub use snapshot::{DiskStats, MemoryStats, MetricsSnapshot, ProcessInfo, SnapshotStore};
pub use ui_state::UiState;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
