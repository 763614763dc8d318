use super::order_builder::OrderRequestBuilder;
use super::types::*;
use crate::error::EngineError;
use common::Side;
use rust_decimal::Decimal;

pub const DEFAULT_PRICE_PRECISION: u32 = 2;

/// Lays out limit orders at fixed percentage steps around a base price.
#[derive(Debug, Clone, Copy)]
pub struct GridLadderGenerator {
    builder: OrderRequestBuilder,
    price_precision: u32,
}

impl Default for GridLadderGenerator {
    fn default() -> Self {
        Self::new(OrderRequestBuilder::default(), DEFAULT_PRICE_PRECISION)
    }
}

impl GridLadderGenerator {
    pub fn new(builder: OrderRequestBuilder, price_precision: u32) -> Self {
        Self {
            builder,
            price_precision,
        }
    }

    /// Level `i` (1-based) sits `base × stop_percent/100 × i` away from the
    /// base price. Single-sided plans yield `grid_size` orders; two-sided
    /// plans yield a buy then a sell per level.
    pub fn generate(&self, plan: &GridPlan) -> Result<Vec<OrderRequest>, EngineError> {
        if plan.grid_size == 0 {
            return Err(EngineError::invalid_plan("grid size must be at least 1"));
        }
        if plan.stop_percent <= Decimal::ZERO {
            return Err(EngineError::invalid_plan(format!(
                "stop percent must be positive, got {}",
                plan.stop_percent
            )));
        }
        if plan.base_price <= Decimal::ZERO {
            return Err(EngineError::invalid_plan(format!(
                "base price must be positive, got {}",
                plan.base_price
            )));
        }

        let fraction = plan.stop_percent / Decimal::ONE_HUNDRED;
        let base = plan.base_price.round_dp(self.price_precision);
        let mut last_buy = base;
        let mut last_sell = base;

        let per_level = if plan.mode == GridMode::TwoSided { 2 } else { 1 };
        let mut orders = Vec::with_capacity(plan.grid_size as usize * per_level);

        for level in 1..=plan.grid_size {
            let offset = plan
                .base_price
                .checked_mul(fraction)
                .and_then(|step| step.checked_mul(Decimal::from(level)))
                .ok_or_else(|| overflow(level))?;

            if matches!(plan.mode, GridMode::Single(Side::Buy) | GridMode::TwoSided) {
                let buy_price = plan
                    .base_price
                    .checked_sub(offset)
                    .ok_or_else(|| overflow(level))?
                    .round_dp(self.price_precision);
                ensure_distinct(level, last_buy, buy_price)?;
                orders.push(self.level_order(plan, level, Side::Buy, buy_price)?);
                last_buy = buy_price;
            }
            if matches!(plan.mode, GridMode::Single(Side::Sell) | GridMode::TwoSided) {
                let sell_price = plan
                    .base_price
                    .checked_add(offset)
                    .ok_or_else(|| overflow(level))?
                    .round_dp(self.price_precision);
                ensure_distinct(level, last_sell, sell_price)?;
                orders.push(self.level_order(plan, level, Side::Sell, sell_price)?);
                last_sell = sell_price;
            }
        }

        Ok(orders)
    }

    fn level_order(
        &self,
        plan: &GridPlan,
        level: u32,
        side: Side,
        price: Decimal,
    ) -> Result<OrderRequest, EngineError> {
        let intent = OrderIntent::limit(&plan.symbol, side, plan.quantity, price);
        self.builder.build(&intent).map_err(|e| match e {
            EngineError::InvalidIntent(msg) => {
                EngineError::invalid_plan(format!("level {} {}: {}", level, side, msg))
            }
            other => other,
        })
    }
}

fn overflow(level: u32) -> EngineError {
    EngineError::invalid_plan(format!("level {} price overflows", level))
}

fn ensure_distinct(level: u32, previous: Decimal, price: Decimal) -> Result<(), EngineError> {
    if previous == price {
        return Err(EngineError::invalid_plan(format!(
            "level {} rounds to {}, same as the level before it; widen the step",
            level, price
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderKind;
    use rust_decimal_macros::dec;

    fn plan(mode: GridMode, base: Decimal, size: u32, pct: Decimal) -> GridPlan {
        GridPlan::new("BTCUSDT", mode, base, dec!(0.01), size, pct)
    }

    #[test]
    fn test_buy_ladder() {
        let orders = GridLadderGenerator::default()
            .generate(&plan(GridMode::Single(Side::Buy), dec!(100), 3, dec!(1)))
            .unwrap();

        let prices: Vec<_> = orders.iter().map(|o| o.price().unwrap()).collect();
        assert_eq!(prices, vec![dec!(99), dec!(98), dec!(97)]);
        for order in &orders {
            assert_eq!(order.side, Side::Buy);
            assert_eq!(order.kind(), OrderKind::Limit);
            assert_eq!(order.quantity, dec!(0.01));
            assert!(order.time_in_force().is_some());
        }
    }

    #[test]
    fn test_sell_ladder() {
        let orders = GridLadderGenerator::default()
            .generate(&plan(GridMode::Single(Side::Sell), dec!(64000), 2, dec!(0.5)))
            .unwrap();

        let prices: Vec<_> = orders.iter().map(|o| o.price().unwrap()).collect();
        assert_eq!(prices, vec![dec!(64320), dec!(64640)]);
        assert!(orders.iter().all(|o| o.side == Side::Sell));
    }

    #[test]
    fn test_two_sided_ladder() {
        let orders = GridLadderGenerator::default()
            .generate(&plan(GridMode::TwoSided, dec!(100), 2, dec!(2)))
            .unwrap();

        let legs: Vec<_> = orders.iter().map(|o| (o.side, o.price().unwrap())).collect();
        assert_eq!(
            legs,
            vec![
                (Side::Buy, dec!(98)),
                (Side::Sell, dec!(102)),
                (Side::Buy, dec!(96)),
                (Side::Sell, dec!(104)),
            ]
        );
    }

    #[test]
    fn test_distance_strictly_increases() {
        let cases = [
            (GridMode::Single(Side::Buy), dec!(27123.45), 10, dec!(0.25)),
            (GridMode::Single(Side::Sell), dec!(1.2345), 5, dec!(3)),
            (GridMode::Single(Side::Buy), dec!(500), 20, dec!(4.5)),
        ];
        for (mode, base, size, pct) in cases {
            let orders = GridLadderGenerator::default()
                .generate(&plan(mode, base, size, pct))
                .unwrap();
            assert_eq!(orders.len(), size as usize);

            let distances: Vec<_> = orders
                .iter()
                .map(|o| (o.price().unwrap() - base).abs())
                .collect();
            assert!(distances.windows(2).all(|w| w[0] < w[1]), "{:?}", distances);
        }
    }

    #[test]
    fn test_rounding_applies_price_precision() {
        let orders = GridLadderGenerator::new(OrderRequestBuilder::default(), 1)
            .generate(&plan(GridMode::Single(Side::Buy), dec!(123.45), 1, dec!(1)))
            .unwrap();

        // 123.45 - 1.2345 = 122.2155
        assert_eq!(orders[0].price(), Some(dec!(122.2)));
    }

    #[test]
    fn test_invalid_plans() {
        let generator = GridLadderGenerator::default();
        let bad = [
            plan(GridMode::Single(Side::Buy), dec!(100), 0, dec!(1)),
            plan(GridMode::Single(Side::Buy), dec!(100), 3, dec!(0)),
            plan(GridMode::Single(Side::Buy), dec!(100), 3, dec!(-1)),
            plan(GridMode::Single(Side::Buy), dec!(0), 3, dec!(1)),
        ];
        for p in bad {
            assert!(matches!(generator.generate(&p), Err(EngineError::InvalidPlan(_))));
        }
    }

    #[test]
    fn test_buy_levels_must_stay_positive() {
        let err = GridLadderGenerator::default()
            .generate(&plan(GridMode::Single(Side::Buy), dec!(100), 3, dec!(40)))
            .unwrap_err();

        assert!(matches!(err, EngineError::InvalidPlan(_)));
        assert!(err.to_string().contains("level 3 BUY"));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let mut p = plan(GridMode::Single(Side::Sell), dec!(100), 2, dec!(1));
        p.quantity = Decimal::ZERO;
        assert!(matches!(
            GridLadderGenerator::default().generate(&p),
            Err(EngineError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_collapsed_levels_rejected() {
        let err = GridLadderGenerator::default()
            .generate(&plan(GridMode::Single(Side::Buy), dec!(1), 3, dec!(0.1)))
            .unwrap_err();

        assert!(err.to_string().contains("level 1 rounds to 1"));
    }

    #[test]
    fn test_price_overflow_is_an_invalid_plan() {
        let err = GridLadderGenerator::default()
            .generate(&plan(GridMode::Single(Side::Sell), Decimal::MAX, 1, dec!(1)))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPlan(_)));
        assert!(err.to_string().contains("level 1 price overflows"));

        // The buy side of the same base still fits
        let orders = GridLadderGenerator::default()
            .generate(&plan(GridMode::Single(Side::Buy), Decimal::MAX, 1, dec!(1)))
            .unwrap();
        assert_eq!(orders.len(), 1);
    }
}
