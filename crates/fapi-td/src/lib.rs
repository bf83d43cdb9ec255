//! # fapi-td
//!
//! Order execution against the Binance USDT-M futures REST API.
//!
//! Layers, bottom up:
//!
//! | Module   | Role                                                        |
//! |----------|-------------------------------------------------------------|
//! | `auth`   | HMAC-SHA256 request signing over the encoded parameters     |
//! | `rest`   | [`FuturesRest`] transport contract + typed endpoints        |
//! | `client` | reqwest implementation of [`FuturesRest`]                   |
//! | `orders` | MARKET / LIMIT / STOP_LIMIT construction and validation     |
//! | `twap`   | sequential time-sliced MARKET execution with cancellation   |
//!
//! Everything above `client` is written against the trait, so it runs
//! unchanged over the real client or a test double.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod orders;
pub mod rest;
pub mod twap;

#[cfg(test)]
pub(crate) mod testing;

pub use client::FuturesClient;
pub use config::{ClientConfig, Credentials, TimeSyncPolicy};
pub use error::TdError;
pub use orders::{OrderKind, OrderRequest, limit_order, market_order, stop_limit_order, submit_order};
pub use rest::{ApiResponse, FuturesRest, HttpMethod, OrderRef, Params, SendOptions};
pub use twap::{CancelHandle, RemainderPolicy, TwapPlan, TwapReport, TwapState, execute, twap_market};
