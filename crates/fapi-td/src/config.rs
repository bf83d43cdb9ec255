//! Client credentials and connection settings.
//!
//! Both are fixed at client construction and never mutated afterwards.

use std::fmt;
use std::time::Duration;

use fapi_core::Environment;
use fapi_core::config::ExchangeConfig;

/// Default `recvWindow` for signed requests (milliseconds).
pub const DEFAULT_RECV_WINDOW: u64 = 5000;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// API key + secret. The secret is only ever used as an HMAC key.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    secret_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub(crate) fn secret_key(&self) -> &str {
        &self.secret_key
    }

    pub fn is_empty(&self) -> bool {
        self.api_key.is_empty() || self.secret_key.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// How the request timestamp is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeSyncPolicy {
    /// Use the local wall clock as-is.
    #[default]
    LocalClock,
    /// Query `/fapi/v1/time` once at connect and apply the measured offset.
    ServerOffset,
}

/// Connection settings for [`FuturesClient`](crate::client::FuturesClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST base URL (e.g. `https://testnet.binancefuture.com`).
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Default `recvWindow` for signed requests; overridable per call.
    pub recv_window: u64,
    pub time_sync: TimeSyncPolicy,
}

impl ClientConfig {
    pub fn for_environment(env: Environment) -> Self {
        Self {
            base_url: env.rest_base_url().to_string(),
            timeout: DEFAULT_TIMEOUT,
            recv_window: DEFAULT_RECV_WINDOW,
            time_sync: TimeSyncPolicy::LocalClock,
        }
    }

    pub fn testnet() -> Self {
        Self::for_environment(Environment::Testnet)
    }

    pub fn production() -> Self {
        Self::for_environment(Environment::Production)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_recv_window(mut self, recv_window: u64) -> Self {
        self.recv_window = recv_window;
        self
    }

    pub fn with_time_sync(mut self, policy: TimeSyncPolicy) -> Self {
        self.time_sync = policy;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::testnet()
    }
}

impl From<&ExchangeConfig> for ClientConfig {
    fn from(cfg: &ExchangeConfig) -> Self {
        Self::for_environment(cfg.environment)
            .with_timeout(Duration::from_secs(cfg.timeout_secs))
            .with_recv_window(cfg.recv_window)
            .with_time_sync(if cfg.sync_time {
                TimeSyncPolicy::ServerOffset
            } else {
                TimeSyncPolicy::LocalClock
            })
    }
}

impl From<&ExchangeConfig> for Credentials {
    fn from(cfg: &ExchangeConfig) -> Self {
        Self::new(cfg.api_key.clone(), cfg.api_secret.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_testnet() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.base_url, "https://testnet.binancefuture.com");
        assert_eq!(cfg.recv_window, 5000);
        assert_eq!(cfg.timeout, Duration::from_secs(10));
        assert_eq!(cfg.time_sync, TimeSyncPolicy::LocalClock);
    }

    #[test]
    fn built_from_exchange_section() {
        let section = ExchangeConfig {
            environment: Environment::Production,
            timeout_secs: 3,
            recv_window: 1500,
            sync_time: true,
            ..ExchangeConfig::default()
        };
        let cfg = ClientConfig::from(&section);
        assert_eq!(cfg.base_url, "https://fapi.binance.com");
        assert_eq!(cfg.timeout, Duration::from_secs(3));
        assert_eq!(cfg.recv_window, 1500);
        assert_eq!(cfg.time_sync, TimeSyncPolicy::ServerOffset);
    }

    #[test]
    fn debug_hides_secret() {
        let creds = Credentials::new("key", "very-secret");
        let out = format!("{creds:?}");
        assert!(out.contains("key"));
        assert!(!out.contains("very-secret"));
    }
}
