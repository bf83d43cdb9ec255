//! Transport contract and Binance USDT-M futures REST operations.
//!
//! [`FuturesRest`] has a single required method, [`send`](FuturesRest::send);
//! every endpoint below is a provided method on top of it. The production
//! implementation is [`FuturesClient`](crate::client::FuturesClient); tests
//! plug in a recording stub and get the same endpoint logic.
//!
//! # REST endpoints
//!
//! | Operation      | Method | Path                    | Signed |
//! |----------------|--------|-------------------------|--------|
//! | Ping           | GET    | `/fapi/v1/ping`         | no     |
//! | Server time    | GET    | `/fapi/v1/time`         | no     |
//! | Place order    | POST   | `/fapi/v1/order`        | yes    |
//! | Query order    | GET    | `/fapi/v1/order`        | yes    |
//! | Cancel order   | DELETE | `/fapi/v1/order`        | yes    |
//! | Account info   | GET    | `/fapi/v2/account`      | yes    |
//! | Balances       | GET    | `/fapi/v2/balance`      | yes    |
//! | Positions      | GET    | `/fapi/v2/positionRisk` | yes    |
//! | Income history | GET    | `/fapi/v1/income`       | yes    |
//!
//! Endpoints return the raw [`ApiResponse`]; deciding success from the status
//! code is the caller's job.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::auth;
use crate::error::TdError;

pub const PING_PATH: &str = "/fapi/v1/ping";
pub const TIME_PATH: &str = "/fapi/v1/time";
pub const ORDER_PATH: &str = "/fapi/v1/order";
pub const ACCOUNT_PATH: &str = "/fapi/v2/account";
pub const BALANCE_PATH: &str = "/fapi/v2/balance";
pub const POSITION_RISK_PATH: &str = "/fapi/v2/positionRisk";
pub const INCOME_PATH: &str = "/fapi/v1/income";

/// Default page size for income history.
pub const DEFAULT_INCOME_LIMIT: u32 = 50;

// ---------------------------------------------------------------------------
// Request parameters
// ---------------------------------------------------------------------------

/// Ordered request parameters.
///
/// Insertion order is the canonical encoding order and repeated keys are
/// kept, so what is signed is exactly what was built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.push((key.into(), value.to_string()));
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.push(key, value);
        self
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Renders the URL-encoded form, e.g. for logging.
impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&auth::encode_query(self))
    }
}

// ---------------------------------------------------------------------------
// Method / options / response
// ---------------------------------------------------------------------------

/// HTTP method of a REST call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// GET and DELETE carry parameters in the query string; the others in a
    /// form-encoded body.
    pub fn uses_query(self) -> bool {
        matches!(self, Self::Get | Self::Delete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call transport options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SendOptions {
    /// Stamp with timestamp/recvWindow and append an HMAC signature.
    pub signed: bool,
    /// Overrides the client's default `recvWindow` for this call.
    pub recv_window: Option<u64>,
}

impl SendOptions {
    pub fn signed() -> Self {
        Self {
            signed: true,
            recv_window: None,
        }
    }

    pub fn unsigned() -> Self {
        Self::default()
    }

    pub fn with_recv_window(mut self, recv_window: u64) -> Self {
        self.recv_window = Some(recv_window);
        self
    }
}

/// Status code plus decoded body of one round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Body on HTTP 200, [`TdError::Rejected`] otherwise.
    pub fn into_result(self) -> Result<Value, TdError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(TdError::Rejected {
                status: self.status,
                body: self.body,
            })
        }
    }
}

/// Parse a response body as JSON, falling back to `{"raw": text}`.
pub fn decode_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::json!({ "raw": text }))
}

/// Identifies an existing order: exchange id or the client-supplied id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderRef {
    Id(u64),
    ClientId(String),
}

impl OrderRef {
    fn push_into(&self, params: &mut Params) {
        match self {
            Self::Id(id) => params.push("orderId", id),
            Self::ClientId(cid) => params.push("origClientOrderId", cid),
        }
    }
}

/// Keep only position entries for `symbol`. Non-array bodies pass through.
pub fn filter_positions(body: Value, symbol: &str) -> Value {
    match body {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|p| p.get("symbol").and_then(Value::as_str) == Some(symbol))
                .collect(),
        ),
        other => other,
    }
}

// ---------------------------------------------------------------------------
// FuturesRest
// ---------------------------------------------------------------------------

/// Signer/transport contract plus the typed endpoints built on it.
///
/// Implementations perform exactly one round trip per `send` and never retry.
/// A network failure is `Err(TdError::Transport)`; any HTTP answer, including
/// a rejection, is `Ok(ApiResponse)`.
#[async_trait]
pub trait FuturesRest: Send + Sync {
    /// Dispatch one request.
    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        params: Params,
        opts: SendOptions,
    ) -> Result<ApiResponse, TdError>;

    async fn ping(&self) -> Result<ApiResponse, TdError> {
        self.send(HttpMethod::Get, PING_PATH, Params::new(), SendOptions::unsigned())
            .await
    }

    /// `{"serverTime": <ms>}`.
    async fn server_time(&self) -> Result<ApiResponse, TdError> {
        self.send(HttpMethod::Get, TIME_PATH, Params::new(), SendOptions::unsigned())
            .await
    }

    /// Submit pre-built order parameters.
    async fn place_order(&self, params: Params) -> Result<ApiResponse, TdError> {
        self.send(HttpMethod::Post, ORDER_PATH, params, SendOptions::signed())
            .await
    }

    async fn query_order(&self, symbol: &str, order: &OrderRef) -> Result<ApiResponse, TdError> {
        let mut params = Params::new().with("symbol", symbol);
        order.push_into(&mut params);
        self.send(HttpMethod::Get, ORDER_PATH, params, SendOptions::signed())
            .await
    }

    async fn cancel_order(&self, symbol: &str, order: &OrderRef) -> Result<ApiResponse, TdError> {
        let mut params = Params::new().with("symbol", symbol);
        order.push_into(&mut params);
        self.send(HttpMethod::Delete, ORDER_PATH, params, SendOptions::signed())
            .await
    }

    async fn account_info(&self) -> Result<ApiResponse, TdError> {
        self.send(HttpMethod::Get, ACCOUNT_PATH, Params::new(), SendOptions::signed())
            .await
    }

    async fn balances(&self) -> Result<ApiResponse, TdError> {
        self.send(HttpMethod::Get, BALANCE_PATH, Params::new(), SendOptions::signed())
            .await
    }

    /// All positions, filtered client-side when `symbol` is given.
    ///
    /// The symbol is never sent to the server.
    async fn position_risk(&self, symbol: Option<&str>) -> Result<ApiResponse, TdError> {
        let mut resp = self
            .send(HttpMethod::Get, POSITION_RISK_PATH, Params::new(), SendOptions::signed())
            .await?;
        if let Some(sym) = symbol.filter(|s| !s.is_empty()) {
            resp.body = filter_positions(resp.body, sym);
        }
        Ok(resp)
    }

    async fn income_history(
        &self,
        symbol: Option<&str>,
        income_type: Option<&str>,
        limit: u32,
    ) -> Result<ApiResponse, TdError> {
        let mut params = Params::new();
        if let Some(sym) = symbol.filter(|s| !s.is_empty()) {
            params.push("symbol", sym);
        }
        if let Some(kind) = income_type.filter(|s| !s.is_empty()) {
            params.push("incomeType", kind);
        }
        params.push("limit", limit);
        self.send(HttpMethod::Get, INCOME_PATH, params, SendOptions::signed())
            .await
    }
}
