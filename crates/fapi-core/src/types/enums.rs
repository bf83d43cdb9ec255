//! Enumerations used throughout the bot.
//!
//! Each enum knows its exchange wire spelling via `as_str()` and parses the
//! friendly input accepted from front-ends via [`FromStr`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FapiError;

// ---------------------------------------------------------------------------
// Order side
// ---------------------------------------------------------------------------

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Wire spelling (`BUY` / `SELL`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl FromStr for Side {
    type Err = FapiError;

    /// Case-insensitive; surrounding whitespace is not tolerated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("BUY") {
            Ok(Self::Buy)
        } else if s.eq_ignore_ascii_case("SELL") {
            Ok(Self::Sell)
        } else {
            Err(FapiError::Parse(format!("invalid side {s:?}, use one of: BUY, SELL")))
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Time in force
// ---------------------------------------------------------------------------

/// Order lifetime policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    /// Good-Til-Cancelled.
    #[default]
    Gtc,
    /// Immediate-Or-Cancel.
    Ioc,
    /// Fill-Or-Kill.
    Fok,
}

impl TimeInForce {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gtc => "GTC",
            Self::Ioc => "IOC",
            Self::Fok => "FOK",
        }
    }
}

impl FromStr for TimeInForce {
    type Err = FapiError;

    /// Exact match only: the exchange itself is case-sensitive here.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GTC" => Ok(Self::Gtc),
            "IOC" => Ok(Self::Ioc),
            "FOK" => Ok(Self::Fok),
            other => Err(FapiError::Parse(format!(
                "invalid timeInForce {other:?}, must be one of GTC, IOC, FOK"
            ))),
        }
    }
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Which Binance USDT-M futures deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Testnet,
    Production,
}

impl Environment {
    /// REST base URL for this environment.
    pub fn rest_base_url(self) -> &'static str {
        match self {
            Self::Testnet => "https://testnet.binancefuture.com",
            Self::Production => "https://fapi.binance.com",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Testnet => "testnet",
            Self::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = FapiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "testnet" | "test" => Ok(Self::Testnet),
            "production" | "prod" | "mainnet" => Ok(Self::Production),
            other => Err(FapiError::Parse(format!("unknown environment {other:?}"))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
