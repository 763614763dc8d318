use super::cancel::CancelSignal;
use super::dispatch::submit_sequence;
use super::order_builder::OrderRequestBuilder;
use super::types::*;
use crate::adapters::ExchangeClient;
use crate::error::EngineError;
use common::Side;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_QUANTITY_PRECISION: u32 = 6;

#[derive(Debug, Clone, Copy)]
pub struct TwapScheduler {
    builder: OrderRequestBuilder,
    quantity_precision: u32,
}

impl Default for TwapScheduler {
    fn default() -> Self {
        Self::new(OrderRequestBuilder::default(), DEFAULT_QUANTITY_PRECISION)
    }
}

impl TwapScheduler {
    pub fn new(builder: OrderRequestBuilder, quantity_precision: u32) -> Self {
        Self {
            builder,
            quantity_precision,
        }
    }

    /// Builds every slice of the plan up front. Nothing is submitted; any
    /// slice that would be invalid fails the whole plan.
    pub fn plan(&self, plan: &TwapPlan) -> Result<Vec<OrderRequest>, EngineError> {
        let quantities =
            slice_quantities(plan.total_quantity, plan.intervals, self.quantity_precision)?;

        let base_price = match (plan.kind.requires_price(), plan.base_price) {
            (true, None) => {
                return Err(EngineError::invalid_plan(format!(
                    "{} TWAP requires a base price",
                    plan.kind
                )))
            }
            (true, price) => price,
            (false, _) => None,
        };
        let base_stop_price = match (plan.kind.requires_stop_price(), plan.base_stop_price) {
            (true, None) => {
                return Err(EngineError::invalid_plan(format!(
                    "{} TWAP requires a base stop price",
                    plan.kind
                )))
            }
            (true, price) => price,
            (false, _) => None,
        };
        if plan.price_step < Decimal::ZERO || plan.stop_step < Decimal::ZERO {
            return Err(EngineError::invalid_plan(
                "price steps must not be negative; use the step bias to change direction",
            ));
        }

        let sign = step_sign(plan.side, plan.step_bias);

        quantities
            .into_iter()
            .enumerate()
            .map(|(i, quantity)| {
                let offset = sign * Decimal::from(i);
                let walk = |base: Option<Decimal>, step: Decimal| {
                    base.map(|p| {
                        offset
                            .checked_mul(step)
                            .and_then(|delta| p.checked_add(delta))
                            .ok_or_else(|| {
                                EngineError::invalid_plan(format!("slice {} price overflows", i + 1))
                            })
                    })
                    .transpose()
                };
                let intent = OrderIntent {
                    symbol: plan.symbol.clone(),
                    side: plan.side,
                    kind: plan.kind,
                    quantity,
                    price: walk(base_price, plan.price_step)?,
                    stop_price: walk(base_stop_price, plan.stop_step)?,
                };
                self.builder.build(&intent).map_err(|e| match e {
                    EngineError::InvalidIntent(msg) => {
                        EngineError::invalid_plan(format!("slice {}: {}", i + 1, msg))
                    }
                    other => other,
                })
            })
            .collect()
    }

    /// Plans and submits every slice, pausing `plan.delay` between them.
    ///
    /// Returns one result per slice. A failed slice does not stop the run
    /// unless the plan's failure policy says so.
    pub async fn run(
        &self,
        plan: &TwapPlan,
        client: &dyn ExchangeClient,
        mut cancel: CancelSignal,
    ) -> Result<BatchReport, EngineError> {
        let requests = self.plan(plan)?;
        info!(
            "Starting TWAP {} {} {} over {} slices, {:?} apart",
            plan.side, plan.total_quantity, plan.symbol, plan.intervals, plan.delay
        );

        let report =
            submit_sequence(client, requests, plan.delay, plan.failure_policy, &mut cancel).await;

        info!(
            "TWAP {} finished: {}/{} slices placed",
            plan.symbol,
            report.placed_count(),
            report.len()
        );
        Ok(report)
    }
}

/// Equal slices rounded to `precision` decimal places; the last slice takes
/// the remainder so the slices sum exactly to `total`.
pub fn slice_quantities(
    total: Decimal,
    intervals: u32,
    precision: u32,
) -> Result<Vec<Decimal>, EngineError> {
    if intervals == 0 {
        return Err(EngineError::invalid_plan("intervals must be at least 1"));
    }
    if total <= Decimal::ZERO {
        return Err(EngineError::invalid_plan(format!(
            "total quantity must be positive, got {}",
            total
        )));
    }

    let chunk = (total / Decimal::from(intervals)).round_dp(precision);
    let last = total - chunk * Decimal::from(intervals - 1);
    if chunk <= Decimal::ZERO || last <= Decimal::ZERO {
        return Err(EngineError::invalid_plan(format!(
            "total quantity {} is too small for {} slices at {} decimal places",
            total, intervals, precision
        )));
    }

    let mut slices = vec![chunk; intervals as usize - 1];
    slices.push(last);
    Ok(slices)
}

/// Converts a delay given in seconds, rejecting negative or non-finite values.
pub fn delay_from_secs(secs: f64) -> Result<Duration, EngineError> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| EngineError::invalid_plan(format!("delay must be >= 0 seconds, got {}", secs)))
}

fn step_sign(side: Side, bias: StepBias) -> Decimal {
    match (side, bias) {
        (Side::Buy, StepBias::WithSide) | (Side::Sell, StepBias::AgainstSide) => Decimal::ONE,
        (Side::Sell, StepBias::WithSide) | (Side::Buy, StepBias::AgainstSide) => {
            Decimal::NEGATIVE_ONE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderKind;
    use rust_decimal_macros::dec;

    #[test]
    fn test_equal_slices() {
        let slices = slice_quantities(dec!(1.0), 4, 6).unwrap();
        assert_eq!(slices, vec![dec!(0.25); 4]);
    }

    #[test]
    fn test_last_slice_absorbs_remainder() {
        let slices = slice_quantities(dec!(1), 3, 6).unwrap();
        assert_eq!(slices, vec![dec!(0.333333), dec!(0.333333), dec!(0.333334)]);
        assert_eq!(slices.iter().copied().sum::<Decimal>(), dec!(1));
    }

    #[test]
    fn test_slices_sum_to_total() {
        let totals = [dec!(0.001), dec!(1), dec!(7.123457), dec!(12345.6789), dec!(0.3)];
        for total in totals {
            for intervals in 1..=17u32 {
                let slices = match slice_quantities(total, intervals, 6) {
                    Ok(slices) => slices,
                    Err(_) => continue,
                };
                assert_eq!(slices.len(), intervals as usize);
                let sum: Decimal = slices.iter().copied().sum();
                assert!((sum - total).abs() <= dec!(0.000001));
                assert!(slices.iter().all(|q| *q > Decimal::ZERO));
            }
        }
    }

    #[test]
    fn test_invalid_slicing() {
        assert!(matches!(
            slice_quantities(dec!(1), 0, 6),
            Err(EngineError::InvalidPlan(_))
        ));
        assert!(matches!(
            slice_quantities(dec!(-1), 2, 6),
            Err(EngineError::InvalidPlan(_))
        ));
        assert!(matches!(
            slice_quantities(dec!(0.000003), 4, 6),
            Err(EngineError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_delay_from_secs() {
        assert_eq!(delay_from_secs(1.5).unwrap(), Duration::from_millis(1500));
        assert_eq!(delay_from_secs(0.0).unwrap(), Duration::ZERO);
        assert!(matches!(delay_from_secs(-1.0), Err(EngineError::InvalidPlan(_))));
        assert!(matches!(delay_from_secs(f64::NAN), Err(EngineError::InvalidPlan(_))));
    }

    #[test]
    fn test_market_plan() {
        let plan = TwapPlan::new("btcusdt", Side::Buy, OrderKind::Market, dec!(1.0), 4);
        let requests = TwapScheduler::default().plan(&plan).unwrap();

        assert_eq!(requests.len(), 4);
        for request in &requests {
            assert_eq!(request.symbol, "BTCUSDT");
            assert_eq!(request.quantity, dec!(0.25));
            assert_eq!(request.spec, OrderSpec::Market);
        }
    }

    #[test]
    fn test_buy_limit_walks_up() {
        let plan = TwapPlan::new("BTCUSDT", Side::Buy, OrderKind::Limit, dec!(3), 3)
            .with_price(dec!(100), dec!(0.5));
        let prices: Vec<_> = TwapScheduler::default()
            .plan(&plan)
            .unwrap()
            .iter()
            .map(|r| r.price().unwrap())
            .collect();

        assert_eq!(prices, vec![dec!(100), dec!(100.5), dec!(101)]);
    }

    #[test]
    fn test_sell_stop_walks_down() {
        let plan = TwapPlan::new("BTCUSDT", Side::Sell, OrderKind::Stop, dec!(2), 2)
            .with_price(dec!(100), dec!(1))
            .with_stop_price(dec!(101), dec!(2));
        let requests = TwapScheduler::default().plan(&plan).unwrap();

        assert_eq!(requests[0].price(), Some(dec!(100)));
        assert_eq!(requests[0].stop_price(), Some(dec!(101)));
        assert_eq!(requests[1].price(), Some(dec!(99)));
        assert_eq!(requests[1].stop_price(), Some(dec!(99)));
    }

    #[test]
    fn test_against_side_bias_reverses_direction() {
        let plan = TwapPlan::new("BTCUSDT", Side::Buy, OrderKind::Limit, dec!(2), 2)
            .with_price(dec!(100), dec!(1))
            .with_step_bias(StepBias::AgainstSide);
        let requests = TwapScheduler::default().plan(&plan).unwrap();

        assert_eq!(requests[1].price(), Some(dec!(99)));
    }

    #[test]
    fn test_stop_market_plan_ignores_price() {
        let plan = TwapPlan::new("BTCUSDT", Side::Buy, OrderKind::StopMarket, dec!(2), 2)
            .with_price(dec!(100), dec!(1))
            .with_stop_price(dec!(105), dec!(1));
        let requests = TwapScheduler::default().plan(&plan).unwrap();

        assert_eq!(requests[1].spec, OrderSpec::StopMarket { stop_price: dec!(106) });
    }

    #[test]
    fn test_priced_plan_requires_base_price() {
        let plan = TwapPlan::new("BTCUSDT", Side::Buy, OrderKind::Limit, dec!(1), 2);
        let err = TwapScheduler::default().plan(&plan).unwrap_err();
        assert!(err.to_string().contains("requires a base price"));

        let plan = TwapPlan::new("BTCUSDT", Side::Buy, OrderKind::Stop, dec!(1), 2)
            .with_price(dec!(100), dec!(0));
        let err = TwapScheduler::default().plan(&plan).unwrap_err();
        assert!(err.to_string().contains("requires a base stop price"));
    }

    #[test]
    fn test_sell_ladder_below_zero_is_rejected_up_front() {
        let plan = TwapPlan::new("BTCUSDT", Side::Sell, OrderKind::Limit, dec!(4), 4)
            .with_price(dec!(3), dec!(1));
        let err = TwapScheduler::default().plan(&plan).unwrap_err();

        assert!(matches!(err, EngineError::InvalidPlan(_)));
        assert!(err.to_string().contains("slice 4"));
    }

    #[test]
    fn test_negative_step_rejected() {
        let plan = TwapPlan::new("BTCUSDT", Side::Buy, OrderKind::Limit, dec!(1), 2)
            .with_price(dec!(100), dec!(-1));
        assert!(matches!(
            TwapScheduler::default().plan(&plan),
            Err(EngineError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_price_walk_overflow_is_an_invalid_plan() {
        let huge_step = Decimal::from_i128_with_scale(10_i128.pow(28), 0);
        let plan = TwapPlan::new("BTCUSDT", Side::Buy, OrderKind::Limit, dec!(10), 10)
            .with_price(dec!(100), huge_step);
        let err = TwapScheduler::default().plan(&plan).unwrap_err();

        assert!(matches!(err, EngineError::InvalidPlan(_)));
        assert!(err.to_string().contains("price overflows"));
    }
}
