//! Recording [`FuturesRest`] stub for unit tests.
//!
//! Every `send` is recorded with its unsigned parameters. Replies are popped
//! from a script; once the script is exhausted the stub answers HTTP 200 with
//! a synthetic order acknowledgment.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

use crate::error::TdError;
use crate::rest::{ApiResponse, FuturesRest, HttpMethod, Params, SendOptions};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: HttpMethod,
    pub path: String,
    pub params: Params,
    pub opts: SendOptions,
}

enum Reply {
    Response(ApiResponse),
    Unreachable(String),
}

type Hook = Box<dyn Fn(usize) + Send + Sync>;

#[derive(Default)]
pub struct StubRest {
    calls: Mutex<Vec<RecordedCall>>,
    script: Mutex<VecDeque<Reply>>,
    after_call: Option<Hook>,
}

impl StubRest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an HTTP answer.
    pub fn reply(self, status: u16, body: Value) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Reply::Response(ApiResponse::new(status, body)));
        self
    }

    /// Queue a network failure.
    pub fn unreachable(self, reason: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Reply::Unreachable(reason.to_string()));
        self
    }

    /// Run `hook(n)` after the n-th call (1-based) has been recorded.
    pub fn after_call(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.after_call = Some(Box::new(hook));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl FuturesRest for StubRest {
    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        params: Params,
        opts: SendOptions,
    ) -> Result<ApiResponse, TdError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(RecordedCall {
                method,
                path: path.to_string(),
                params,
                opts,
            });
            calls.len()
        };

        let reply = self.script.lock().unwrap().pop_front();
        let result = match reply {
            Some(Reply::Response(resp)) => Ok(resp),
            Some(Reply::Unreachable(reason)) => Err(TdError::transport(
                format!("{method} {path}"),
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, reason),
            )),
            None => Ok(ApiResponse::new(200, json!({ "orderId": n, "status": "NEW" }))),
        };

        if let Some(hook) = &self.after_call {
            hook(n);
        }
        result
    }
}

/// In-memory log sink, installed as the thread's default subscriber.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Capture everything logged on this thread until the guard drops.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
