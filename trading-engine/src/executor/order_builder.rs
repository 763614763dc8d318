use super::types::*;
use crate::error::EngineError;
use common::{OrderKind, TimeInForce};
use rust_decimal::Decimal;
use tracing::debug;

/// Turns an [`OrderIntent`] into an [`OrderRequest`], applying the field rules
/// of each order type. Every execution path (single order, TWAP slice, grid
/// level) goes through here.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderRequestBuilder {
    time_in_force: TimeInForce,
}

impl OrderRequestBuilder {
    pub fn new(time_in_force: TimeInForce) -> Self {
        Self { time_in_force }
    }

    pub fn time_in_force(&self) -> TimeInForce {
        self.time_in_force
    }

    pub fn build(&self, intent: &OrderIntent) -> Result<OrderRequest, EngineError> {
        let symbol = normalize_symbol(&intent.symbol);
        if symbol.is_empty() {
            return Err(EngineError::invalid_intent("symbol must not be empty"));
        }

        let kind = intent.kind;
        let quantity = require_positive(kind, "quantity", Some(intent.quantity))?;

        let spec = match kind {
            OrderKind::Market => {
                ignore(kind, "price", intent.price);
                ignore(kind, "stop price", intent.stop_price);
                OrderSpec::Market
            }
            OrderKind::Limit => {
                ignore(kind, "stop price", intent.stop_price);
                OrderSpec::Limit {
                    price: require_positive(kind, "price", intent.price)?,
                    time_in_force: self.time_in_force,
                }
            }
            OrderKind::Stop => OrderSpec::Stop {
                price: require_positive(kind, "price", intent.price)?,
                stop_price: require_positive(kind, "stop price", intent.stop_price)?,
                time_in_force: self.time_in_force,
            },
            OrderKind::StopMarket => {
                ignore(kind, "price", intent.price);
                OrderSpec::StopMarket {
                    stop_price: require_positive(kind, "stop price", intent.stop_price)?,
                }
            }
        };

        Ok(OrderRequest {
            symbol,
            side: intent.side,
            quantity,
            spec,
        })
    }
}

fn require_positive(
    kind: OrderKind,
    field: &str,
    value: Option<Decimal>,
) -> Result<Decimal, EngineError> {
    match value {
        None => Err(EngineError::invalid_intent(format!(
            "{} order requires {}",
            kind, field
        ))),
        Some(v) if v <= Decimal::ZERO => Err(EngineError::invalid_intent(format!(
            "{} must be positive, got {}",
            field, v
        ))),
        Some(v) => Ok(v),
    }
}

fn ignore(kind: OrderKind, field: &str, value: Option<Decimal>) {
    if let Some(v) = value {
        debug!("Ignoring {} {} on {} order", field, v, kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Side;
    use rust_decimal_macros::dec;

    fn builder() -> OrderRequestBuilder {
        OrderRequestBuilder::default()
    }

    #[test]
    fn test_market_has_no_price_or_time_in_force() {
        let intent = OrderIntent::market("BTCUSDT", Side::Buy, dec!(0.01));
        let request = builder().build(&intent).unwrap();

        assert_eq!(request.symbol, "BTCUSDT");
        assert_eq!(request.kind(), OrderKind::Market);
        assert_eq!(request.quantity, dec!(0.01));
        assert_eq!(request.price(), None);
        assert_eq!(request.time_in_force(), None);
        assert_eq!(request.stop_price(), None);
    }

    #[test]
    fn test_market_drops_price_fields() {
        let intent = OrderIntent::market("BTCUSDT", Side::Sell, dec!(1))
            .with_price(dec!(100))
            .with_stop_price(dec!(90));
        let request = builder().build(&intent).unwrap();

        assert_eq!(request.spec, OrderSpec::Market);
    }

    #[test]
    fn test_limit_carries_gtc() {
        let intent = OrderIntent::limit("ethusdt", Side::Sell, dec!(2), dec!(3100.5));
        let request = builder().build(&intent).unwrap();

        assert_eq!(request.symbol, "ETHUSDT");
        assert_eq!(
            request.spec,
            OrderSpec::Limit {
                price: dec!(3100.5),
                time_in_force: TimeInForce::GTC,
            }
        );
    }

    #[test]
    fn test_limit_without_price_is_rejected() {
        let intent = OrderIntent::new("BTCUSDT", Side::Buy, OrderKind::Limit, dec!(1));
        let err = builder().build(&intent).unwrap_err();

        assert!(matches!(err, EngineError::InvalidIntent(_)));
        assert!(err.to_string().contains("LIMIT order requires price"));
    }

    #[test]
    fn test_stop_requires_both_prices() {
        let missing_stop =
            OrderIntent::new("BTCUSDT", Side::Buy, OrderKind::Stop, dec!(1)).with_price(dec!(100));
        assert!(matches!(
            builder().build(&missing_stop),
            Err(EngineError::InvalidIntent(_))
        ));

        let missing_price = OrderIntent::new("BTCUSDT", Side::Buy, OrderKind::Stop, dec!(1))
            .with_stop_price(dec!(99));
        assert!(matches!(
            builder().build(&missing_price),
            Err(EngineError::InvalidIntent(_))
        ));

        let complete = missing_stop.with_stop_price(dec!(99));
        let request = builder().build(&complete).unwrap();
        assert_eq!(request.price(), Some(dec!(100)));
        assert_eq!(request.stop_price(), Some(dec!(99)));
        assert_eq!(request.time_in_force(), Some(TimeInForce::GTC));
    }

    #[test]
    fn test_stop_market_has_no_time_in_force() {
        let intent = OrderIntent::new("BTCUSDT", Side::Sell, OrderKind::StopMarket, dec!(1))
            .with_price(dec!(101))
            .with_stop_price(dec!(95));
        let request = builder().build(&intent).unwrap();

        assert_eq!(request.spec, OrderSpec::StopMarket { stop_price: dec!(95) });
        assert_eq!(request.time_in_force(), None);
    }

    #[test]
    fn test_non_positive_values_rejected() {
        let zero_qty = OrderIntent::market("BTCUSDT", Side::Buy, Decimal::ZERO);
        assert!(matches!(
            builder().build(&zero_qty),
            Err(EngineError::InvalidIntent(_))
        ));

        let negative_price = OrderIntent::limit("BTCUSDT", Side::Buy, dec!(1), dec!(-5));
        let err = builder().build(&negative_price).unwrap_err();
        assert!(err.to_string().contains("price must be positive"));

        let empty_symbol = OrderIntent::market("   ", Side::Buy, dec!(1));
        assert!(matches!(
            builder().build(&empty_symbol),
            Err(EngineError::InvalidIntent(_))
        ));
    }

    #[test]
    fn test_build_is_idempotent() {
        let intent = OrderIntent::new("BTCUSDT", Side::Buy, OrderKind::Stop, dec!(0.5))
            .with_price(dec!(64000))
            .with_stop_price(dec!(63900));
        let b = builder();

        assert_eq!(b.build(&intent).unwrap(), b.build(&intent).unwrap());
    }

    #[test]
    fn test_configured_time_in_force() {
        let b = OrderRequestBuilder::new(TimeInForce::GTX);
        let intent = OrderIntent::limit("BTCUSDT", Side::Buy, dec!(1), dec!(100));

        assert_eq!(b.build(&intent).unwrap().time_in_force(), Some(TimeInForce::GTX));
    }
}
