//! reqwest-backed [`FuturesRest`] implementation.
//!
//! The API key is installed once as a default `X-MBX-APIKEY` header, so it is
//! attached to every request, signed or not. Signed calls are stamped with the
//! current time (optionally corrected by a server offset measured at connect)
//! and the HMAC signature is appended last. The encoded string that was signed
//! is sent verbatim: as the query string for GET/DELETE, as the
//! form-urlencoded body otherwise.
//!
//! The client holds no mutable state after construction and can be shared
//! across tasks behind an `Arc`; reqwest's connection pool is thread-safe.

use async_trait::async_trait;
use fapi_core::time_util;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth;
use crate::config::{ClientConfig, Credentials, TimeSyncPolicy};
use crate::error::TdError;
use crate::rest::{ApiResponse, FuturesRest, HttpMethod, Params, SendOptions, decode_body};

/// Header carrying the API key (`X-MBX-APIKEY`; header names are case-insensitive).
pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-mbx-apikey");

/// Binance USDT-M futures REST client.
pub struct FuturesClient {
    http: reqwest::Client,
    credentials: Credentials,
    config: ClientConfig,
    /// Server minus local clock, in ms. Zero unless measured at connect.
    time_offset_ms: i64,
}

impl FuturesClient {
    /// Create a client without touching the network.
    pub fn new(credentials: Credentials, config: ClientConfig) -> Result<Self, TdError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(credentials.api_key())
            .map_err(|e| TdError::Client(format!("api key is not a valid header value: {e}")))?;
        headers.insert(API_KEY_HEADER, key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| TdError::Client(format!("failed to build http client: {e}")))?;

        Ok(Self {
            http,
            credentials,
            config,
            time_offset_ms: 0,
        })
    }

    /// Create a client and apply its [`TimeSyncPolicy`].
    pub async fn connect(credentials: Credentials, config: ClientConfig) -> Result<Self, TdError> {
        let mut client = Self::new(credentials, config)?;
        if client.config.time_sync == TimeSyncPolicy::ServerOffset {
            client.sync_time().await?;
        }
        info!(
            base_url = %client.config.base_url,
            recv_window = client.config.recv_window,
            time_offset_ms = client.time_offset_ms,
            "futures client ready"
        );
        Ok(client)
    }

    /// Measure `serverTime - local clock` once and use it for later timestamps.
    ///
    /// Takes `&mut self`: run it before the client is shared.
    pub async fn sync_time(&mut self) -> Result<i64, TdError> {
        let before = time_util::now_ms();
        let body = self.server_time().await?.into_result()?;
        let after = time_util::now_ms();

        let server = body
            .get("serverTime")
            .and_then(Value::as_u64)
            .ok_or_else(|| TdError::Client(format!("serverTime missing in {body}")))?;
        let local_mid = before + (after - before) / 2;
        let offset = server as i64 - local_mid as i64;

        if offset.unsigned_abs() >= self.config.recv_window {
            warn!(offset_ms = offset, recv_window = self.config.recv_window, "local clock skew exceeds recvWindow");
        }
        self.time_offset_ms = offset;
        debug!(offset_ms = offset, "server time offset measured");
        Ok(offset)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn time_offset_ms(&self) -> i64 {
        self.time_offset_ms
    }

    fn timestamp_ms(&self) -> u64 {
        time_util::now_ms_with_offset(self.time_offset_ms)
    }

    /// Encoded payload for a call: plain query, or stamped + signed.
    fn payload(&self, params: Params, opts: SendOptions) -> String {
        if opts.signed {
            let recv_window = opts.recv_window.unwrap_or(self.config.recv_window);
            auth::stamp_and_sign(params, self.credentials.secret_key(), self.timestamp_ms(), recv_window)
        } else {
            auth::encode_query(&params)
        }
    }
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl FuturesRest for FuturesClient {
    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        params: Params,
        opts: SendOptions,
    ) -> Result<ApiResponse, TdError> {
        let payload = self.payload(params, opts);
        let url = format!("{}{}", self.config.base_url, path);

        let request = if method.uses_query() {
            let url = if payload.is_empty() { url } else { format!("{url}?{payload}") };
            self.http.request(reqwest_method(method), url)
        } else {
            self.http
                .request(reqwest_method(method), url)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(payload)
        };

        debug!(%method, path, signed = opts.signed, "sending request");
        let resp = request
            .send()
            .await
            .map_err(|e| TdError::transport(format!("{method} {path}"), e))?;

        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| TdError::transport(format!("read body of {method} {path}"), e))?;
        debug!(%method, path, status, "response received");

        Ok(ApiResponse::new(status, decode_body(&text)))
    }
}
