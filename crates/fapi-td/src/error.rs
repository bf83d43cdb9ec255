//! Error taxonomy for the trading core.
//!
//! Callers must be able to tell three failure classes apart:
//!
//! | Variant      | Meaning                                   | Network touched? |
//! |--------------|-------------------------------------------|------------------|
//! | `Validation` | input rejected locally                    | never            |
//! | `Transport`  | exchange could not be reached / timed out | attempted        |
//! | `Rejected`   | exchange answered with a non-200 status   | yes              |
//!
//! A cancelled TWAP run is not an error; see [`TwapState`](crate::twap::TwapState).

use fapi_core::error::FapiError;
use thiserror::Error;

/// Boxed error source for transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the signer/transport, order builder and TWAP planner.
#[derive(Debug, Error)]
pub enum TdError {
    /// Malformed order or plan parameters. Raised before any request is built.
    #[error("validation error: {0}")]
    Validation(String),

    /// Network, TLS or timeout failure reaching the exchange.
    #[error("transport error ({context}): {source}")]
    Transport {
        /// What was being attempted, e.g. `POST /fapi/v1/order`.
        context: String,
        #[source]
        source: BoxError,
    },

    /// The exchange answered with a non-200 status.
    #[error("exchange rejected request (HTTP {status}): {body}")]
    Rejected {
        status: u16,
        /// Decoded response body, usually `{"code": .., "msg": ..}`.
        body: serde_json::Value,
    },

    /// The client could not be constructed (bad header value, TLS backend).
    #[error("client error: {0}")]
    Client(String),
}

impl TdError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn transport(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Transport {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Short machine-readable class name, used in TWAP slice reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Transport { .. } => "transport",
            Self::Rejected { .. } => "rejected",
            Self::Client(_) => "client",
        }
    }
}

impl From<FapiError> for TdError {
    fn from(e: FapiError) -> Self {
        match e {
            FapiError::Parse(msg) => Self::Validation(msg),
            other => Self::Client(other.to_string()),
        }
    }
}
