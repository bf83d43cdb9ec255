//! # fapi-core
//!
//! Core crate for the Binance USDT-M futures trading bot, providing:
//!
//! - **Types** (`types`): side, time-in-force and environment enums
//! - **Configuration** (`config`): JSON config deserialization + env overrides
//! - **Error types** (`error`): domain-specific `FapiError` via thiserror
//! - **Time utilities** (`time_util`): millisecond wall-clock timestamps
//! - **Logging** (`logging`): tracing-based console + file output
//! - **Rotating file** (`rotating_file`): size-capped append-only log sink

pub mod config;
pub mod error;
pub mod logging;
pub mod rotating_file;
pub mod time_util;
pub mod types;

// Re-export types at crate root for convenience.
pub use types::*;
