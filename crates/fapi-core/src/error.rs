//! Typed error definitions shared by the bot's crates.
//!
//! [`FapiError`] covers the failures that can happen before any request is
//! built: reading configuration, setting up the log file, and parsing
//! user-supplied enum values. Trading failures live in `fapi-td`.

use thiserror::Error;

/// Domain-specific errors for configuration and input parsing.
#[derive(Debug, Error)]
pub enum FapiError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// A user-supplied value does not name a known variant.
    #[error("parse error: {0}")]
    Parse(String),

    /// Log file or config file I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for [`AppConfig`](crate::config::AppConfig).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
