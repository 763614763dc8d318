use super::adapter::ExchangeClient;
use super::idempotent::ClientOrderIds;
use crate::error::TransportError;
use crate::executor::types::OrderRequest;
use async_trait::async_trait;
use chrono::Utc;
use common::{Balance, Order, OrderKind, OrderStatus, Side, SymbolInfo};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::info;

/// Acknowledges orders locally without touching the network.
///
/// Market orders fill immediately at an unknown price (`avgPrice` 0); every
/// other type rests as NEW until cancelled.
#[derive(Debug)]
pub struct DryRunClient {
    next_order_id: AtomicI64,
    orders: Mutex<Vec<Order>>,
    order_ids: ClientOrderIds,
}

impl Default for DryRunClient {
    fn default() -> Self {
        Self::new("dry")
    }
}

impl DryRunClient {
    pub fn new(client_order_id_prefix: &str) -> Self {
        Self {
            next_order_id: AtomicI64::new(1),
            orders: Mutex::new(Vec::new()),
            order_ids: ClientOrderIds::new(client_order_id_prefix),
        }
    }

    pub fn orders(&self) -> Vec<Order> {
        self.orders.lock().clone()
    }
}

#[async_trait]
impl ExchangeClient for DryRunClient {
    fn exchange_name(&self) -> &str {
        "dry-run"
    }

    async fn ping(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<Order, TransportError> {
        let filled = request.kind() == OrderKind::Market;
        let order = Order {
            order_id: self.next_order_id.fetch_add(1, Ordering::Relaxed),
            symbol: request.symbol.clone(),
            status: if filled {
                OrderStatus::Filled
            } else {
                OrderStatus::New
            },
            client_order_id: self.order_ids.next_id(),
            side: request.side,
            order_type: request.kind().as_str().to_string(),
            price: request.price().unwrap_or_default(),
            stop_price: request.stop_price().unwrap_or_default(),
            avg_price: Decimal::ZERO,
            orig_qty: request.quantity,
            executed_qty: if filled { request.quantity } else { Decimal::ZERO },
            time_in_force: request.time_in_force(),
            update_time: Utc::now().timestamp_millis(),
        };

        info!("[dry-run] accepted {} as order {}", request, order.order_id);
        self.orders.lock().push(order.clone());
        Ok(order)
    }

    async fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<Order, TransportError> {
        let mut orders = self.orders.lock();
        let order = orders
            .iter_mut()
            .find(|o| o.order_id == order_id && o.symbol == symbol && o.status.is_open())
            .ok_or_else(|| {
                TransportError::NotFound(format!("open order {} on {}", order_id, symbol))
            })?;

        order.status = OrderStatus::Canceled;
        order.update_time = Utc::now().timestamp_millis();
        Ok(order.clone())
    }

    async fn open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, TransportError> {
        Ok(self
            .orders
            .lock()
            .iter()
            .filter(|o| o.status.is_open() && symbol.map_or(true, |s| o.symbol == s))
            .cloned()
            .collect())
    }

    async fn all_orders(&self, symbol: &str) -> Result<Vec<Order>, TransportError> {
        Ok(self
            .orders
            .lock()
            .iter()
            .filter(|o| o.symbol == symbol)
            .cloned()
            .collect())
    }

    async fn balances(&self) -> Result<Vec<Balance>, TransportError> {
        Ok(Vec::new())
    }

    async fn symbols(&self) -> Result<Vec<SymbolInfo>, TransportError> {
        Ok(Vec::new())
    }

    async fn position(&self, symbol: &str) -> Result<Decimal, TransportError> {
        Ok(self
            .orders
            .lock()
            .iter()
            .filter(|o| o.symbol == symbol)
            .map(|o| match o.side {
                Side::Buy => o.executed_qty,
                Side::Sell => -o.executed_qty,
            })
            .sum())
    }
}
