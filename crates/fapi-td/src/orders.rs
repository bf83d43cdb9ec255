//! Order construction, validation and submission.
//!
//! An order is an [`OrderRequest`] whose [`OrderKind`] carries the
//! kind-specific fields. Validation and the mapping to wire parameters are
//! pure; [`submit_order`] is the only function that touches the transport.
//!
//! | Kind         | Wire `type` | Extra fields                         |
//! |--------------|-------------|--------------------------------------|
//! | `Market`     | `MARKET`    | none                                 |
//! | `Limit`      | `LIMIT`     | `price`, `timeInForce`               |
//! | `StopLimit`  | `STOP`      | `stopPrice`, `price`, `timeInForce`  |
//!
//! Invalid input fails with [`TdError::Validation`] before any request is
//! built. Each submission is logged at INFO (params, then status + body); any
//! failure is logged at ERROR with the same context before it is returned.

use fapi_core::{Side, TimeInForce};
use serde_json::Value;
use tracing::{error, info};

use crate::error::TdError;
use crate::rest::{FuturesRest, Params};

/// Kind-specific order fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderKind {
    Market,
    Limit {
        price: f64,
        time_in_force: TimeInForce,
    },
    /// Exchange `STOP` order: triggers at `stop_price`, then rests at `limit_price`.
    StopLimit {
        stop_price: f64,
        limit_price: f64,
        time_in_force: TimeInForce,
    },
}

impl OrderKind {
    /// Value of the wire `type` parameter.
    pub fn wire_type(&self) -> &'static str {
        match self {
            Self::Market => "MARKET",
            Self::Limit { .. } => "LIMIT",
            Self::StopLimit { .. } => "STOP",
        }
    }

    /// User-facing name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Market => "MARKET",
            Self::Limit { .. } => "LIMIT",
            Self::StopLimit { .. } => "STOP_LIMIT",
        }
    }

    fn validate(&self) -> Result<(), TdError> {
        match *self {
            Self::Market => Ok(()),
            Self::Limit { price, .. } => {
                if !is_positive(price) {
                    return Err(TdError::validation("price must be positive for LIMIT orders"));
                }
                Ok(())
            }
            Self::StopLimit {
                stop_price,
                limit_price,
                ..
            } => {
                if !is_positive(stop_price) || !is_positive(limit_price) {
                    return Err(TdError::validation("stop_price and limit_price must be positive"));
                }
                Ok(())
            }
        }
    }
}

/// A fully typed order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub kind: OrderKind,
    pub reduce_only: bool,
}

impl OrderRequest {
    pub fn market(symbol: impl Into<String>, side: Side, quantity: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            kind: OrderKind::Market,
            reduce_only: false,
        }
    }

    pub fn limit(symbol: impl Into<String>, side: Side, quantity: f64, price: f64, time_in_force: TimeInForce) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            kind: OrderKind::Limit { price, time_in_force },
            reduce_only: false,
        }
    }

    pub fn stop_limit(
        symbol: impl Into<String>,
        side: Side,
        quantity: f64,
        stop_price: f64,
        limit_price: f64,
        time_in_force: TimeInForce,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            kind: OrderKind::StopLimit {
                stop_price,
                limit_price,
                time_in_force,
            },
            reduce_only: false,
        }
    }

    pub fn reduce_only(mut self, reduce_only: bool) -> Self {
        self.reduce_only = reduce_only;
        self
    }

    pub fn validate(&self) -> Result<(), TdError> {
        validate_symbol(&self.symbol)?;
        validate_quantity(self.quantity)?;
        self.kind.validate()
    }

    /// Wire parameters in the order they are sent (and signed).
    pub fn to_params(&self) -> Params {
        let mut params = Params::new()
            .with("symbol", self.symbol.to_ascii_uppercase())
            .with("side", self.side.as_str())
            .with("type", self.kind.wire_type())
            .with("quantity", format_decimal(self.quantity));

        match self.kind {
            OrderKind::Market => {}
            OrderKind::Limit { price, time_in_force } => {
                params.push("price", format_decimal(price));
                params.push("timeInForce", time_in_force.as_str());
            }
            OrderKind::StopLimit {
                stop_price,
                limit_price,
                time_in_force,
            } => {
                params.push("stopPrice", format_decimal(stop_price));
                params.push("price", format_decimal(limit_price));
                params.push("timeInForce", time_in_force.as_str());
            }
        }

        params.push("reduceOnly", if self.reduce_only { "true" } else { "false" });
        params
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn is_positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

/// Non-empty, ASCII letters and digits only.
pub fn validate_symbol(symbol: &str) -> Result<(), TdError> {
    if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(TdError::validation(format!("invalid symbol {symbol:?}, example: BTCUSDT")));
    }
    Ok(())
}

pub fn validate_quantity(quantity: f64) -> Result<(), TdError> {
    if !is_positive(quantity) {
        return Err(TdError::validation("quantity must be positive"));
    }
    Ok(())
}

/// Log an order that never left the process. Every local rejection goes
/// through here, whichever entry point caught it.
pub(crate) fn log_local_rejection(kind: &str, symbol: &str, e: &TdError) {
    error!(kind, symbol, error = %e, "order rejected locally");
}

/// Parse user-supplied `side`, logging a failure like any other local rejection.
pub(crate) fn parse_side(kind: &str, symbol: &str, side: &str) -> Result<Side, TdError> {
    side.parse::<Side>()
        .map_err(TdError::from)
        .inspect_err(|e| log_local_rejection(kind, symbol, e))
}

fn parse_tif(kind: &str, symbol: &str, tif: &str) -> Result<TimeInForce, TdError> {
    tif.parse::<TimeInForce>()
        .map_err(TdError::from)
        .inspect_err(|e| log_local_rejection(kind, symbol, e))
}

/// Shortest decimal that round-trips, never in exponent form.
pub fn format_decimal(v: f64) -> String {
    format!("{v}")
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// Validate, log and place `request`. Non-200 answers become
/// [`TdError::Rejected`]; the 200 body is returned verbatim.
pub async fn submit_order<A>(api: &A, request: &OrderRequest) -> Result<Value, TdError>
where
    A: FuturesRest + ?Sized,
{
    let kind = request.kind.label();
    if let Err(e) = request.validate() {
        log_local_rejection(kind, &request.symbol, &e);
        return Err(e);
    }

    let params = request.to_params();
    info!(kind, %params, "placing order");

    let resp = match api.place_order(params.clone()).await {
        Ok(resp) => resp,
        Err(e) => {
            error!(kind, %params, error = %e, "order request failed");
            return Err(e);
        }
    };

    info!(kind, status = resp.status, body = %resp.body, "order response");
    if !resp.is_success() {
        error!(kind, %params, status = resp.status, body = %resp.body, "order failed");
    }
    resp.into_result()
}

/// Place a MARKET order from user input.
pub async fn market_order<A>(api: &A, symbol: &str, side: &str, quantity: f64, reduce_only: bool) -> Result<Value, TdError>
where
    A: FuturesRest + ?Sized,
{
    let side = parse_side("MARKET", symbol, side)?;
    let request = OrderRequest::market(symbol, side, quantity).reduce_only(reduce_only);
    submit_order(api, &request).await
}

/// Place a LIMIT order from user input. `tif` must be `GTC`, `IOC` or `FOK`.
pub async fn limit_order<A>(
    api: &A,
    symbol: &str,
    side: &str,
    quantity: f64,
    price: f64,
    tif: &str,
    reduce_only: bool,
) -> Result<Value, TdError>
where
    A: FuturesRest + ?Sized,
{
    let side = parse_side("LIMIT", symbol, side)?;
    let tif = parse_tif("LIMIT", symbol, tif)?;
    let request = OrderRequest::limit(symbol, side, quantity, price, tif).reduce_only(reduce_only);
    submit_order(api, &request).await
}

/// Place a STOP_LIMIT order (exchange `STOP`) from user input.
#[allow(clippy::too_many_arguments)]
pub async fn stop_limit_order<A>(
    api: &A,
    symbol: &str,
    side: &str,
    quantity: f64,
    stop_price: f64,
    limit_price: f64,
    tif: &str,
    reduce_only: bool,
) -> Result<Value, TdError>
where
    A: FuturesRest + ?Sized,
{
    let side = parse_side("STOP_LIMIT", symbol, side)?;
    let tif = parse_tif("STOP_LIMIT", symbol, tif)?;
    let request =
        OrderRequest::stop_limit(symbol, side, quantity, stop_price, limit_price, tif).reduce_only(reduce_only);
    submit_order(api, &request).await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::rest::{HttpMethod, ORDER_PATH};
    use crate::testing::{LogCapture, StubRest};

    #[tokio::test]
    async fn market_order_wire_params() {
        let ack = json!({"orderId": 4049, "status": "NEW", "origQty": "0.001"});
        let stub = StubRest::new().reply(200, ack.clone());

        let body = market_order(&stub, "BTCUSDT", "BUY", 0.001, false).await.unwrap();
        assert_eq!(body, ack);

        let calls = stub.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, HttpMethod::Post);
        assert_eq!(calls[0].path, ORDER_PATH);
        assert!(calls[0].opts.signed);
        let expected = Params::new()
            .with("symbol", "BTCUSDT")
            .with("side", "BUY")
            .with("type", "MARKET")
            .with("quantity", "0.001")
            .with("reduceOnly", "false");
        assert_eq!(calls[0].params, expected);
    }

    #[tokio::test]
    async fn side_and_symbol_are_normalized() {
        let stub = StubRest::new();
        market_order(&stub, "btcusdt", "sell", 1.5, true).await.unwrap();
        let params = &stub.calls()[0].params;
        assert_eq!(params.get("symbol"), Some("BTCUSDT"));
        assert_eq!(params.get("side"), Some("SELL"));
        assert_eq!(params.get("reduceOnly"), Some("true"));
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_transport() {
        let stub = StubRest::new();
        let cases = [
            market_order(&stub, "BTCUSDT", "BUY", 0.0, false).await,
            market_order(&stub, "BTCUSDT", "BUY", -1.0, false).await,
            market_order(&stub, "BTCUSDT", "BUY", f64::NAN, false).await,
            market_order(&stub, "BTCUSDT", "HOLD", 1.0, false).await,
            market_order(&stub, "BTC/USDT", "BUY", 1.0, false).await,
            market_order(&stub, "BTC USDT", "BUY", 1.0, false).await,
            market_order(&stub, "", "BUY", 1.0, false).await,
            limit_order(&stub, "BTCUSDT", "BUY", 1.0, 0.0, "GTC", false).await,
            limit_order(&stub, "BTCUSDT", "BUY", 1.0, -5.0, "GTC", false).await,
            limit_order(&stub, "BTCUSDT", "BUY", 1.0, 100.0, "GTX", false).await,
            limit_order(&stub, "BTCUSDT", "BUY", 1.0, 100.0, "gtc", false).await,
            stop_limit_order(&stub, "BTCUSDT", "SELL", 1.0, 0.0, 100.0, "GTC", false).await,
            stop_limit_order(&stub, "BTCUSDT", "SELL", 1.0, 100.0, -1.0, "GTC", false).await,
            stop_limit_order(&stub, "BTCUSDT", "SELL", 1.0, 100.0, 99.0, "DAY", false).await,
        ];
        for (i, result) in cases.into_iter().enumerate() {
            let err = result.unwrap_err();
            assert!(err.is_validation(), "case {i}: {err}");
        }
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn limit_order_never_sets_stop_price() {
        let stub = StubRest::new();
        limit_order(&stub, "ETHUSDT", "BUY", 0.5, 2500.5, "IOC", false)
            .await
            .unwrap();
        let params = &stub.calls()[0].params;
        assert_eq!(params.get("type"), Some("LIMIT"));
        assert_eq!(params.get("price"), Some("2500.5"));
        assert_eq!(params.get("timeInForce"), Some("IOC"));
        assert!(!params.contains("stopPrice"));
    }

    #[tokio::test]
    async fn stop_limit_sets_both_prices() {
        let stub = StubRest::new();
        stop_limit_order(&stub, "BTCUSDT", "SELL", 0.01, 19950.0, 19900.0, "GTC", true)
            .await
            .unwrap();
        let params = &stub.calls()[0].params;
        assert_eq!(
            params.keys().collect::<Vec<_>>(),
            ["symbol", "side", "type", "quantity", "stopPrice", "price", "timeInForce", "reduceOnly"]
        );
        assert_eq!(params.get("type"), Some("STOP"));
        assert_eq!(params.get("stopPrice"), Some("19950"));
        assert_eq!(params.get("price"), Some("19900"));
    }

    #[tokio::test]
    async fn rejection_carries_decoded_body() {
        let stub = StubRest::new().reply(400, json!({"code": -2019, "msg": "Margin is insufficient."}));
        let err = market_order(&stub, "BTCUSDT", "BUY", 1.0, false).await.unwrap_err();
        match err {
            TdError::Rejected { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body["msg"], "Margin is insufficient.");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_failure_is_distinct() {
        let stub = StubRest::new().unreachable("connection refused");
        let err = market_order(&stub, "BTCUSDT", "BUY", 1.0, false).await.unwrap_err();
        assert!(err.is_transport());
        assert!(!err.is_rejection());
    }

    #[tokio::test]
    async fn typed_request_is_validated_too() {
        let stub = StubRest::new();
        let request = OrderRequest::limit("BTCUSDT", Side::Buy, 1.0, f64::INFINITY, TimeInForce::Gtc);
        assert!(submit_order(&stub, &request).await.unwrap_err().is_validation());
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn local_rejections_are_logged_from_every_entry_point() {
        let (logs, _guard) = LogCapture::install();
        let stub = StubRest::new();

        limit_order(&stub, "BTCUSDT", "BUY", 1.0, 100.0, "GTX", false).await.unwrap_err();
        market_order(&stub, "BTCUSDT", "HOLD", 1.0, false).await.unwrap_err();
        stop_limit_order(&stub, "ETHUSDT", "SELL", 1.0, 0.0, 100.0, "GTC", false)
            .await
            .unwrap_err();
        limit_order(&stub, "BTCUSDT", "BUY", 1.0, -5.0, "GTC", false).await.unwrap_err();

        let out = logs.contents();
        let rejected: Vec<_> = out.lines().filter(|l| l.contains("order rejected locally")).collect();
        assert_eq!(rejected.len(), 4, "{out}");
        assert!(rejected.iter().all(|l| l.contains("ERROR")));
        assert!(rejected[0].contains("GTX"));
        assert!(rejected[1].contains("HOLD"));
        assert!(rejected[2].contains("stop_price and limit_price must be positive"));
        assert!(rejected[3].contains("price must be positive for LIMIT orders"));
        assert_eq!(stub.call_count(), 0);
    }

    #[test]
    fn decimals_have_no_exponent() {
        assert_eq!(format_decimal(0.00000001), "0.00000001");
        assert_eq!(format_decimal(0.002), "0.002");
        assert_eq!(format_decimal(20000.0), "20000");
    }
}
