use crate::error::{EngineError, TransportError};
use common::{Order, OrderKind, Side, TimeInForce};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// What the caller wants traded, before any per-type validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: Side,
    pub kind: OrderKind,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
}

impl OrderIntent {
    pub fn new(symbol: impl AsRef<str>, side: Side, kind: OrderKind, quantity: Decimal) -> Self {
        Self {
            symbol: normalize_symbol(symbol.as_ref()),
            side,
            kind,
            quantity,
            price: None,
            stop_price: None,
        }
    }

    pub fn market(symbol: impl AsRef<str>, side: Side, quantity: Decimal) -> Self {
        Self::new(symbol, side, OrderKind::Market, quantity)
    }

    pub fn limit(symbol: impl AsRef<str>, side: Side, quantity: Decimal, price: Decimal) -> Self {
        Self::new(symbol, side, OrderKind::Limit, quantity).with_price(price)
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_stop_price(mut self, stop_price: Decimal) -> Self {
        self.stop_price = Some(stop_price);
        self
    }
}

pub(crate) fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

/// Per-type order fields. Each variant carries exactly the fields the
/// exchange accepts for that type, so `time_in_force` exists iff `price` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSpec {
    Market,
    Limit {
        price: Decimal,
        time_in_force: TimeInForce,
    },
    Stop {
        price: Decimal,
        stop_price: Decimal,
        time_in_force: TimeInForce,
    },
    StopMarket {
        stop_price: Decimal,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub spec: OrderSpec,
}

impl OrderRequest {
    pub fn kind(&self) -> OrderKind {
        match self.spec {
            OrderSpec::Market => OrderKind::Market,
            OrderSpec::Limit { .. } => OrderKind::Limit,
            OrderSpec::Stop { .. } => OrderKind::Stop,
            OrderSpec::StopMarket { .. } => OrderKind::StopMarket,
        }
    }

    pub fn price(&self) -> Option<Decimal> {
        match self.spec {
            OrderSpec::Limit { price, .. } | OrderSpec::Stop { price, .. } => Some(price),
            OrderSpec::Market | OrderSpec::StopMarket { .. } => None,
        }
    }

    pub fn stop_price(&self) -> Option<Decimal> {
        match self.spec {
            OrderSpec::Stop { stop_price, .. } | OrderSpec::StopMarket { stop_price } => {
                Some(stop_price)
            }
            OrderSpec::Market | OrderSpec::Limit { .. } => None,
        }
    }

    pub fn time_in_force(&self) -> Option<TimeInForce> {
        match self.spec {
            OrderSpec::Limit { time_in_force, .. } | OrderSpec::Stop { time_in_force, .. } => {
                Some(time_in_force)
            }
            OrderSpec::Market | OrderSpec::StopMarket { .. } => None,
        }
    }
}

impl fmt::Display for OrderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.kind(), self.side, self.quantity, self.symbol)?;
        if let Some(price) = self.price() {
            write!(f, " @ {}", price)?;
        }
        if let Some(stop_price) = self.stop_price() {
            write!(f, " stop {}", stop_price)?;
        }
        Ok(())
    }
}

/// Direction in which TWAP slice prices walk away from the base price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StepBias {
    /// BUY slices step up, SELL slices step down.
    #[default]
    WithSide,
    /// BUY slices step down, SELL slices step up.
    AgainstSide,
}

/// What a multi-order run does after a child order fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Attempt every planned order regardless of earlier failures.
    #[default]
    Continue,
    /// Stop submitting after the first failure; the rest are reported as skipped.
    StopOnFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwapPlan {
    pub symbol: String,
    pub side: Side,
    pub kind: OrderKind,
    pub total_quantity: Decimal,
    pub intervals: u32,
    pub delay: Duration,
    pub base_price: Option<Decimal>,
    pub price_step: Decimal,
    pub base_stop_price: Option<Decimal>,
    pub stop_step: Decimal,
    pub step_bias: StepBias,
    pub failure_policy: FailurePolicy,
}

impl TwapPlan {
    pub fn new(
        symbol: impl AsRef<str>,
        side: Side,
        kind: OrderKind,
        total_quantity: Decimal,
        intervals: u32,
    ) -> Self {
        Self {
            symbol: normalize_symbol(symbol.as_ref()),
            side,
            kind,
            total_quantity,
            intervals,
            delay: Duration::ZERO,
            base_price: None,
            price_step: Decimal::ZERO,
            base_stop_price: None,
            stop_step: Decimal::ZERO,
            step_bias: StepBias::default(),
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_price(mut self, base_price: Decimal, price_step: Decimal) -> Self {
        self.base_price = Some(base_price);
        self.price_step = price_step;
        self
    }

    pub fn with_stop_price(mut self, base_stop_price: Decimal, stop_step: Decimal) -> Self {
        self.base_stop_price = Some(base_stop_price);
        self.stop_step = stop_step;
        self
    }

    pub fn with_step_bias(mut self, step_bias: StepBias) -> Self {
        self.step_bias = step_bias;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }
}

/// Which side(s) of the base price a grid ladder covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridMode {
    /// Buys below the base price or sells above it, never both.
    Single(Side),
    /// One buy below and one sell above per level.
    TwoSided,
}

impl FromStr for GridMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(GridMode::Single(Side::Buy)),
            "SELL" => Ok(GridMode::Single(Side::Sell)),
            "BOTH" | "TWO_SIDED" | "TWO-SIDED" => Ok(GridMode::TwoSided),
            _ => Err(EngineError::invalid_plan(format!(
                "grid side must be BUY, SELL or BOTH, got {:?}",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPlan {
    pub symbol: String,
    pub mode: GridMode,
    pub base_price: Decimal,
    pub quantity: Decimal,
    pub grid_size: u32,
    /// Price offset per level, in percent of the base price.
    pub stop_percent: Decimal,
    pub delay: Duration,
    pub failure_policy: FailurePolicy,
}

impl GridPlan {
    pub fn new(
        symbol: impl AsRef<str>,
        mode: GridMode,
        base_price: Decimal,
        quantity: Decimal,
        grid_size: u32,
        stop_percent: Decimal,
    ) -> Self {
        Self {
            symbol: normalize_symbol(symbol.as_ref()),
            mode,
            base_price,
            quantity,
            grid_size,
            stop_percent,
            delay: Duration::ZERO,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The run was cancelled before this order was due.
    Cancelled,
    /// An earlier order failed under `FailurePolicy::StopOnFailure`.
    PriorFailure,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Cancelled => f.write_str("cancelled"),
            SkipReason::PriorFailure => f.write_str("stopped after earlier failure"),
        }
    }
}

#[derive(Debug)]
pub enum ExecutionResult {
    Placed {
        request: OrderRequest,
        order: Order,
    },
    Failed {
        request: OrderRequest,
        error: TransportError,
    },
    Skipped {
        request: OrderRequest,
        reason: SkipReason,
    },
}

impl ExecutionResult {
    pub fn request(&self) -> &OrderRequest {
        match self {
            ExecutionResult::Placed { request, .. }
            | ExecutionResult::Failed { request, .. }
            | ExecutionResult::Skipped { request, .. } => request,
        }
    }

    pub fn order(&self) -> Option<&Order> {
        match self {
            ExecutionResult::Placed { order, .. } => Some(order),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TransportError> {
        match self {
            ExecutionResult::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_placed(&self) -> bool {
        matches!(self, ExecutionResult::Placed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ExecutionResult::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ExecutionResult::Skipped { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Completed,
    Partial,
    NothingPlaced,
}

/// Ordered results of a TWAP or grid run, one entry per planned order.
#[derive(Debug)]
pub struct BatchReport {
    results: Vec<ExecutionResult>,
}

impl BatchReport {
    pub fn new(results: Vec<ExecutionResult>) -> Self {
        Self { results }
    }

    pub fn results(&self) -> &[ExecutionResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn placed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_placed()).count()
    }

    pub fn placed_indices(&self) -> Vec<usize> {
        self.indices(ExecutionResult::is_placed)
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.indices(ExecutionResult::is_failed)
    }

    pub fn skipped_indices(&self) -> Vec<usize> {
        self.indices(ExecutionResult::is_skipped)
    }

    fn indices(&self, pred: impl Fn(&ExecutionResult) -> bool) -> Vec<usize> {
        self.results
            .iter()
            .enumerate()
            .filter(|(_, r)| pred(*r))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn requested_quantity(&self) -> Decimal {
        self.results.iter().map(|r| r.request().quantity).sum()
    }

    pub fn outcome(&self) -> BatchOutcome {
        match self.placed_count() {
            n if n == self.results.len() && n > 0 => BatchOutcome::Completed,
            0 => BatchOutcome::NothingPlaced,
            _ => BatchOutcome::Partial,
        }
    }

    /// Collapses the report into the placed orders, or an error describing
    /// what went wrong. A run where nothing was placed surfaces the first
    /// transport error; a mixed run surfaces `PartialExecution`.
    pub fn into_result(self) -> Result<Vec<Order>, EngineError> {
        let total = self.results.len();
        let placed = self.placed_count();
        let not_placed: Vec<usize> = self
            .results
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_placed())
            .map(|(i, _)| i)
            .collect();

        if not_placed.is_empty() {
            return Ok(self
                .results
                .into_iter()
                .filter_map(|r| match r {
                    ExecutionResult::Placed { order, .. } => Some(order),
                    _ => None,
                })
                .collect());
        }

        if placed == 0 {
            if let Some(error) = self.results.into_iter().find_map(|r| match r {
                ExecutionResult::Failed { error, .. } => Some(error),
                _ => None,
            }) {
                return Err(EngineError::Transport(error));
            }
        }

        Err(EngineError::PartialExecution {
            total,
            placed,
            failed: not_placed,
        })
    }
}
