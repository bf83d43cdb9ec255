//! Binance request signing.
//!
//! Signed endpoints take a `signature` parameter: the lowercase hex
//! HMAC-SHA256 of the exact query string (or form body) that is sent, keyed by
//! the API secret. Any reordering or extra field after signing invalidates it,
//! so the string produced here is the one that goes on the wire.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::rest::Params;

type HmacSha256 = Hmac<Sha256>;

/// Parameter name carrying the client timestamp (ms).
pub const TIMESTAMP: &str = "timestamp";
/// Parameter name carrying the receive window (ms).
pub const RECV_WINDOW: &str = "recvWindow";
/// Parameter name carrying the signature. Always last.
pub const SIGNATURE: &str = "signature";

/// Compute an HMAC-SHA256 signature and return it as a lowercase hex string.
///
/// # Example
///
/// ```ignore
/// let sig = hmac_sha256_sign("my_secret", "symbol=BTCUSDT&timestamp=1234567890");
/// assert_eq!(sig.len(), 64); // 32 bytes → 64 hex chars
/// ```
pub fn hmac_sha256_sign(secret: &str, message: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// URL-encode `params` in insertion order as `k1=v1&k2=v2`.
///
/// Repeated keys are emitted once per occurrence.
pub fn encode_query(params: &Params) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Stamp `params` with `timestamp` (and `recvWindow` unless the caller already
/// set one), encode them, and append the signature.
///
/// Pure function of its inputs: same params, secret and timestamp give the
/// same string.
pub fn stamp_and_sign(mut params: Params, secret: &str, timestamp_ms: u64, recv_window: u64) -> String {
    params.push(TIMESTAMP, timestamp_ms);
    if !params.contains(RECV_WINDOW) {
        params.push(RECV_WINDOW, recv_window);
    }
    let query = encode_query(&params);
    let signature = hmac_sha256_sign(secret, &query);
    format!("{query}&{SIGNATURE}={signature}")
}

#[cfg(test)]
mod tests {
    use super::*;

    // Example key and request from the Binance API documentation.
    const DOC_SECRET: &str = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";

    #[test]
    fn hmac_sha256_known_vector() {
        let message = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1\
                       &price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            hmac_sha256_sign(DOC_SECRET, message),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn encoding_keeps_order_and_repeats() {
        let params = Params::new()
            .with("symbol", "BTCUSDT")
            .with("note", "a b&c")
            .with("id", 1)
            .with("id", 2);
        assert_eq!(encode_query(&params), "symbol=BTCUSDT&note=a%20b%26c&id=1&id=2");
    }

    #[test]
    fn stamp_and_sign_is_deterministic() {
        let params = Params::new().with("symbol", "BTCUSDT").with("side", "BUY");
        let a = stamp_and_sign(params.clone(), "secret", 1_700_000_000_000, 5000);
        let b = stamp_and_sign(params, "secret", 1_700_000_000_000, 5000);
        assert_eq!(a, b);
        assert!(a.starts_with("symbol=BTCUSDT&side=BUY&timestamp=1700000000000&recvWindow=5000&signature="));
    }

    #[test]
    fn signature_covers_exactly_the_prefix() {
        let signed = stamp_and_sign(Params::new().with("symbol", "ETHUSDT"), "k", 42, 5000);
        let (query, sig) = signed.rsplit_once("&signature=").unwrap();
        assert_eq!(sig, hmac_sha256_sign("k", query));
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn signature_changes_with_any_field() {
        let base = Params::new().with("symbol", "BTCUSDT");
        let sig = |p: Params, ts| stamp_and_sign(p, "k", ts, 5000);
        assert_ne!(sig(base.clone(), 1), sig(base.clone(), 2));
        assert_ne!(sig(base.clone(), 1), sig(base.with("side", "BUY"), 1));
    }

    #[test]
    fn caller_recv_window_wins() {
        let params = Params::new().with("symbol", "BTCUSDT").with(RECV_WINDOW, 2000);
        let signed = stamp_and_sign(params, "k", 7, 5000);
        assert!(signed.starts_with("symbol=BTCUSDT&recvWindow=2000&timestamp=7&signature="));
        assert_eq!(signed.matches("recvWindow").count(), 1);
    }
}
