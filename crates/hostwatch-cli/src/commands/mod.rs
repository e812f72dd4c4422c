pub mod monitor;
pub mod snapshot;
pub mod watch;

use std::path::Path;

use hostwatch_core::{ConfigError, Engine, EngineConfig, EngineHandle};

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigOverrides<'a> {
    pub endpoint: Option<&'a str>,
    pub config_path: Option<&'a Path>,
    pub refresh_ms: Option<u64>,
}

/// Flag, then file, then default.
pub fn load_config(overrides: &ConfigOverrides<'_>) -> Result<EngineConfig, ConfigError> {
    let mut config = match overrides.config_path {
        Some(path) => EngineConfig::read(path)?,
        None => EngineConfig::default(),
    };
    if let Some(endpoint) = overrides.endpoint {
        config.endpoint = endpoint.to_string();
    }
    if let Some(refresh_ms) = overrides.refresh_ms {
        config.refresh_interval_ms = refresh_ms;
    }
    config.validate()?;
    Ok(config)
}

pub fn load_config_or_exit(overrides: &ConfigOverrides<'_>) -> EngineConfig {
    match load_config(overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

/// Build the engine, exiting with status 1 on a bad config.
pub fn engine_or_exit(config: &EngineConfig) -> (Engine, EngineHandle) {
    match Engine::new(config) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

/// Runtime for the engine task.
pub fn runtime_or_exit() -> tokio::runtime::Runtime {
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to start async runtime: {e}");
            std::process::exit(1);
        }
    }
}
