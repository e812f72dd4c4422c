//! Engine configuration.
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! file (or no file at all) yields a working configuration:
//!
//! ```toml
//! endpoint = "http://127.0.0.1:5000"
//! refresh_interval_ms = 1000
//! connect_timeout_ms = 5000
//!
//! [reconnect]
//! enabled = true
//! initial_delay_ms = 1000
//! max_delay_ms = 30000
//!
//! [[gauges]]
//! metric = "cpu"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;
use crate::error::ConfigError;
use crate::gauge::{GaugeDescriptor, default_gauges};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub endpoint: String,
    pub refresh_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub reconnect: ReconnectConfig,
    pub gauges: Vec<GaugeDescriptor>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            refresh_interval_ms: 1000,
            connect_timeout_ms: 5000,
            reconnect: ReconnectConfig::default(),
            gauges: default_gauges(),
        }
    }
}

/// Backoff applied by the engine after an unexpected disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconnectConfig {
    pub enabled: bool,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl ReconnectConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl EngineConfig {
    /// Read and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML config file without validating it, so callers can layer
    /// overrides on top first.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "refresh_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "connect_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.reconnect.enabled {
            if self.reconnect.initial_delay_ms == 0 {
                return Err(ConfigError::Invalid {
                    field: "reconnect.initial_delay_ms",
                    reason: "must be greater than zero".to_string(),
                });
            }
            if self.reconnect.max_delay_ms < self.reconnect.initial_delay_ms {
                return Err(ConfigError::Invalid {
                    field: "reconnect.max_delay_ms",
                    reason: format!(
                        "{} is below initial_delay_ms {}",
                        self.reconnect.max_delay_ms, self.reconnect.initial_delay_ms
                    ),
                });
            }
        }
        if let Some(bad) = self
            .gauges
            .iter()
            .find(|g| !g.metric.is_percent() && (g.max_scale.is_nan() || g.max_scale <= 0.0))
        {
            return Err(ConfigError::Invalid {
                field: "gauges.max_scale",
                reason: format!("{} must be positive for '{}'", bad.max_scale, bad.label()),
            });
        }
        self.endpoint()?;
        Ok(())
    }

    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        Endpoint::parse(&self.endpoint)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
