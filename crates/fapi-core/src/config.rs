//! Configuration parsing for the trading bot.
//!
//! Settings come from an optional JSON file; every field has a default so an
//! empty object `{}` is a valid config. Secrets may instead be supplied through
//! environment variables (see [`AppConfig::apply_env_overrides`]).
//!
//! # Example config
//!
//! ```json
//! {
//!   "logging": { "level": "info", "file": "bot.log", "max_bytes": 1000000, "max_backups": 3 },
//!   "exchange": {
//!     "api_key": "...", "api_secret": "...",
//!     "environment": "testnet", "timeout_secs": 10, "recv_window": 5000, "sync_time": false
//!   }
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::FapiError;
use crate::types::Environment;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub exchange: ExchangeConfig,
}

/// Log sink settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level if `RUST_LOG` is not set.
    pub level: String,
    /// Rotating log file path. `None` disables file output.
    pub file: Option<String>,
    /// Size at which the active file is rotated.
    pub max_bytes: u64,
    /// Number of rotated files kept (`bot.log.1` .. `bot.log.N`).
    pub max_backups: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: None,
            max_bytes: default_max_bytes(),
            max_backups: default_max_backups(),
        }
    }
}

/// Exchange connection settings. Scalars only.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub api_key: String,
    pub api_secret: String,
    pub environment: Environment,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
    /// `recvWindow` for signed requests (milliseconds).
    pub recv_window: u64,
    /// Measure the server clock offset once before trading.
    pub sync_time: bool,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            environment: Environment::Testnet,
            timeout_secs: default_timeout_secs(),
            recv_window: default_recv_window(),
            sync_time: false,
        }
    }
}

impl std::fmt::Debug for ExchangeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("environment", &self.environment)
            .field("timeout_secs", &self.timeout_secs)
            .field("recv_window", &self.recv_window)
            .field("sync_time", &self.sync_time)
            .finish()
    }
}

impl AppConfig {
    /// Overlay secrets and environment selection from the process environment.
    ///
    /// Reads `FAPI_API_KEY`, `FAPI_API_SECRET` and `FAPI_ENV`. Empty values
    /// are ignored.
    pub fn apply_env_overrides(&mut self) -> Result<(), FapiError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), FapiError> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(v) = get("FAPI_API_KEY") {
            self.exchange.api_key = v;
        }
        if let Some(v) = get("FAPI_API_SECRET") {
            self.exchange.api_secret = v;
        }
        if let Some(v) = get("FAPI_ENV") {
            self.exchange.environment = v.parse()?;
        }
        Ok(())
    }

    /// Reject values that would only fail later at request time.
    pub fn validate(&self) -> Result<(), FapiError> {
        if self.exchange.timeout_secs == 0 {
            return Err(FapiError::Config("exchange.timeout_secs must be > 0".into()));
        }
        if self.exchange.recv_window == 0 || self.exchange.recv_window > 60_000 {
            return Err(FapiError::Config("exchange.recv_window must be in 1..=60000".into()));
        }
        if self.logging.file.is_some() && self.logging.max_bytes == 0 {
            return Err(FapiError::Config("logging.max_bytes must be > 0".into()));
        }
        Ok(())
    }
}

/// Load, override and validate a JSON config file.
pub fn load_config(path: &Path) -> Result<AppConfig, FapiError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| FapiError::Config(format!("cannot read {}: {e}", path.display())))?;
    let mut config: AppConfig = serde_json::from_str(&content)?;
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Defaults (used by serde)
// ---------------------------------------------------------------------------

fn default_max_bytes() -> u64 {
    1_000_000
}

fn default_max_backups() -> usize {
    3
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_recv_window() -> u64 {
    5000
}
