//! TWAP executor: split a total quantity into equal MARKET slices.
//!
//! Slices run strictly one after another. Before each slice the
//! [`CancelHandle`] is checked; between slices the executor sleeps for the
//! plan's interval, but that sleep wakes early when the handle is cancelled.
//! A failed slice is recorded in the [`TwapReport`] and the run moves on.
//!
//! ```text
//! Idle ──start──▶ Running ──all slices attempted──▶ Completed
//!                    │
//!                    └──cancel seen at a slice boundary──▶ Cancelled
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use fapi_core::Side;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::error::TdError;
use crate::orders::{OrderRequest, log_local_rejection, parse_side, submit_order, validate_quantity, validate_symbol};
use crate::rest::FuturesRest;

/// Decimal places kept on every slice quantity.
pub const QUANTITY_DECIMALS: i32 = 8;

/// Round to [`QUANTITY_DECIMALS`] places, half away from zero.
pub fn round_quantity(v: f64) -> f64 {
    let scale = 10f64.powi(QUANTITY_DECIMALS);
    (v * scale).round() / scale
}

/// What happens to the rounding remainder when the total does not split evenly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    /// Slices `0..n-1` get `round(total / n)`; the last gets what is left, so
    /// the sum equals the total up to one rounding step. When the first `n-1`
    /// slices already exceed the total, the last one keeps the base size.
    #[default]
    LastSliceAbsorbs,
    /// Every slice gets `round(total / n)`; the sum may drift by up to
    /// `n * 1e-8` from the total.
    Independent,
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct TwapPlan {
    symbol: String,
    side: Side,
    total: f64,
    slices: usize,
    interval: Duration,
    remainder: RemainderPolicy,
}

impl TwapPlan {
    /// Plan with the default [`RemainderPolicy`]. See [`with_policy`](Self::with_policy).
    pub fn new(
        symbol: impl Into<String>,
        side: Side,
        total: f64,
        slices: usize,
        interval: Duration,
    ) -> Result<Self, TdError> {
        Self::with_policy(symbol, side, total, slices, interval, RemainderPolicy::default())
    }

    /// Validates the whole plan up front, so a bad plan never submits anything.
    pub fn with_policy(
        symbol: impl Into<String>,
        side: Side,
        total: f64,
        slices: usize,
        interval: Duration,
        remainder: RemainderPolicy,
    ) -> Result<Self, TdError> {
        let plan = Self {
            symbol: symbol.into(),
            side,
            total,
            slices,
            interval,
            remainder,
        };
        plan.validate()?;
        Ok(plan)
    }

    fn validate(&self) -> Result<(), TdError> {
        validate_symbol(&self.symbol)?;
        validate_quantity(self.total)?;
        if self.slices == 0 {
            return Err(TdError::validation("slices must be >= 1"));
        }
        // Every slice is either the base size or a positive last slice.
        if self.base_quantity() <= 0.0 {
            return Err(TdError::validation(format!(
                "total {} split into {} slices rounds each slice to zero",
                self.total, self.slices
            )));
        }
        Ok(())
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn slices(&self) -> usize {
        self.slices
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn remainder(&self) -> RemainderPolicy {
        self.remainder
    }

    fn base_quantity(&self) -> f64 {
        round_quantity(self.total / self.slices as f64)
    }

    /// Quantity of slice `index` (0-based).
    pub fn quantity_for(&self, index: usize) -> f64 {
        let base = self.base_quantity();
        match self.remainder {
            RemainderPolicy::LastSliceAbsorbs if index + 1 == self.slices => {
                let rest = round_quantity(self.total - base * (self.slices - 1) as f64);
                // Rounding the base up can overshoot the total before the last slice.
                if rest > 0.0 { rest } else { base }
            }
            _ => base,
        }
    }

    pub fn slice_quantities(&self) -> Vec<f64> {
        (0..self.slices).map(|i| self.quantity_for(i)).collect()
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CancelInner {
    flag: AtomicBool,
    notify: Notify,
}

/// Shared cancellation signal for a TWAP run.
///
/// Cloning yields another handle to the same signal. Cancelling is sticky.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    inner: Arc<CancelInner>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel is not lost.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for `duration` unless cancelled first. Returns `true` if woken by
    /// cancellation.
    pub async fn wait(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_cancelled(),
            _ = self.cancelled() => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TwapState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// Result of one slice, in JSON as `"status": "ok" | "failed"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SliceResult {
    Ok {
        response: Value,
    },
    Failed {
        /// [`TdError::kind`] of the failure.
        kind: &'static str,
        error: String,
        /// Exchange body, for rejections.
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<Value>,
    },
}

impl SliceResult {
    fn from_submission(result: Result<Value, TdError>) -> Self {
        match result {
            Ok(response) => Self::Ok { response },
            Err(e) => {
                let kind = e.kind();
                let error = e.to_string();
                let body = match e {
                    TdError::Rejected { body, .. } => Some(body),
                    _ => None,
                };
                Self::Failed { kind, error, body }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliceOutcome {
    pub index: usize,
    pub quantity: f64,
    #[serde(flatten)]
    pub result: SliceResult,
}

impl SliceOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self.result, SliceResult::Ok { .. })
    }
}

/// Outcome of a TWAP run: terminal state plus one entry per attempted slice,
/// in slice order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TwapReport {
    pub state: TwapState,
    pub planned_slices: usize,
    pub slices: Vec<SliceOutcome>,
}

impl TwapReport {
    pub fn succeeded(&self) -> usize {
        self.slices.iter().filter(|s| s.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.slices.len() - self.succeeded()
    }

    /// Sum of quantities of accepted slices (accepted, not necessarily filled).
    pub fn submitted_quantity(&self) -> f64 {
        round_quantity(self.slices.iter().filter(|s| s.is_ok()).map(|s| s.quantity).sum())
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

struct TwapRun {
    state: TwapState,
    planned: usize,
    outcomes: Vec<SliceOutcome>,
}

impl TwapRun {
    fn new(plan: &TwapPlan) -> Self {
        Self {
            state: TwapState::Idle,
            planned: plan.slices(),
            outcomes: Vec::new(),
        }
    }

    fn start(&mut self) {
        self.state = TwapState::Running;
    }

    fn record(&mut self, index: usize, quantity: f64, result: Result<Value, TdError>) {
        self.outcomes.push(SliceOutcome {
            index,
            quantity,
            result: SliceResult::from_submission(result),
        });
    }

    fn finish(mut self, cancelled: bool) -> TwapReport {
        self.state = if cancelled {
            TwapState::Cancelled
        } else {
            TwapState::Completed
        };
        TwapReport {
            state: self.state,
            planned_slices: self.planned,
            slices: self.outcomes,
        }
    }
}

/// Run `plan` to completion or until `cancel` is observed at a slice boundary.
pub async fn execute<A>(api: &A, plan: &TwapPlan, cancel: &CancelHandle) -> TwapReport
where
    A: FuturesRest + ?Sized,
{
    let mut run = TwapRun::new(plan);
    run.start();
    info!(
        symbol = plan.symbol(),
        side = %plan.side(),
        total = plan.total(),
        slices = plan.slices(),
        interval_ms = plan.interval().as_millis() as u64,
        "twap started"
    );

    let mut cancelled = false;
    for index in 0..plan.slices() {
        if cancel.is_cancelled() {
            info!(next_slice = index, "twap cancelled");
            cancelled = true;
            break;
        }

        let quantity = plan.quantity_for(index);
        let request = OrderRequest::market(plan.symbol(), plan.side(), quantity);
        let result = submit_order(api, &request).await;
        match &result {
            Ok(_) => info!(slice = index, quantity, "twap slice submitted"),
            Err(e) => warn!(slice = index, quantity, error = %e, "twap slice failed, continuing"),
        }
        run.record(index, quantity, result);

        if index + 1 < plan.slices() && !plan.interval().is_zero() {
            cancel.wait(plan.interval()).await;
        }
    }

    let report = run.finish(cancelled);
    info!(
        state = ?report.state,
        attempted = report.slices.len(),
        succeeded = report.succeeded(),
        failed = report.failed(),
        "twap finished"
    );
    report
}

/// TWAP from user input: parses `side`, builds the plan, runs it.
///
/// Plan errors are returned before any slice is submitted; slice failures end
/// up in the report.
pub async fn twap_market<A>(
    api: &A,
    symbol: &str,
    side: &str,
    total: f64,
    slices: usize,
    interval: Duration,
    cancel: &CancelHandle,
) -> Result<TwapReport, TdError>
where
    A: FuturesRest + ?Sized,
{
    let side = parse_side("TWAP", symbol, side)?;
    let plan = TwapPlan::new(symbol, side, total, slices, interval)
        .inspect_err(|e| log_local_rejection("TWAP", symbol, e))?;
    Ok(execute(api, &plan, cancel).await)
}
