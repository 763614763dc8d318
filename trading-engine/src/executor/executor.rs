use super::{
    cancel::{cancellation, CancelHandle, CancelSignal},
    dispatch::submit_sequence,
    grid::GridLadderGenerator,
    order_builder::OrderRequestBuilder,
    twap::TwapScheduler,
    types::*,
};
use crate::adapters::ExchangeClient;
use crate::config::ExecutorConfig;
use crate::error::EngineError;
use common::{Balance, Order};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};

#[derive(Clone)]
pub struct OrderExecutor {
    client: Arc<dyn ExchangeClient>,
    builder: OrderRequestBuilder,
    twap: TwapScheduler,
    grid: GridLadderGenerator,
}

impl OrderExecutor {
    pub fn new(client: Arc<dyn ExchangeClient>, config: &ExecutorConfig) -> Self {
        let builder = OrderRequestBuilder::new(config.time_in_force);

        Self {
            client,
            builder,
            twap: TwapScheduler::new(builder, config.quantity_precision),
            grid: GridLadderGenerator::new(builder, config.price_precision),
        }
    }

    pub fn client(&self) -> &Arc<dyn ExchangeClient> {
        &self.client
    }

    pub fn builder(&self) -> &OrderRequestBuilder {
        &self.builder
    }

    pub fn twap_scheduler(&self) -> &TwapScheduler {
        &self.twap
    }

    pub fn grid_generator(&self) -> &GridLadderGenerator {
        &self.grid
    }

    pub async fn place(&self, intent: &OrderIntent) -> Result<Order, EngineError> {
        let request = self.builder.build(intent)?;
        info!("Placing order: {}", request);

        match self.client.submit_order(&request).await {
            Ok(order) => {
                info!("Order placed: id {} {}", order.order_id, order.status);
                Ok(order)
            }
            Err(e) => {
                error!("Error placing order {}: {}", request, e);
                Err(e.into())
            }
        }
    }

    pub async fn run_twap(
        &self,
        plan: &TwapPlan,
        cancel: CancelSignal,
    ) -> Result<BatchReport, EngineError> {
        self.twap.run(plan, self.client.as_ref(), cancel).await
    }

    pub async fn run_grid(
        &self,
        plan: &GridPlan,
        mut cancel: CancelSignal,
    ) -> Result<BatchReport, EngineError> {
        let requests = self.grid.generate(plan)?;
        info!(
            "Starting grid on {} around {}: {} orders",
            plan.symbol,
            plan.base_price,
            requests.len()
        );

        let report = submit_sequence(
            self.client.as_ref(),
            requests,
            plan.delay,
            plan.failure_policy,
            &mut cancel,
        )
        .await;

        info!(
            "Grid {} finished: {}/{} orders placed",
            plan.symbol,
            report.placed_count(),
            report.len()
        );
        Ok(report)
    }

    pub fn spawn_twap(&self, plan: TwapPlan) -> Result<ExecutionHandle, EngineError> {
        let requests = self.twap.plan(&plan)?;
        info!(
            "Spawning TWAP {} {} {} over {} slices, {:?} apart",
            plan.side, plan.total_quantity, plan.symbol, plan.intervals, plan.delay
        );
        Ok(self.spawn_sequence(requests, &plan.symbol, plan.delay, plan.failure_policy))
    }

    pub fn spawn_grid(&self, plan: GridPlan) -> Result<ExecutionHandle, EngineError> {
        let requests = self.grid.generate(&plan)?;
        info!(
            "Spawning grid on {} around {}: {} orders",
            plan.symbol,
            plan.base_price,
            requests.len()
        );
        Ok(self.spawn_sequence(requests, &plan.symbol, plan.delay, plan.failure_policy))
    }

    fn spawn_sequence(
        &self,
        requests: Vec<OrderRequest>,
        symbol: &str,
        delay: Duration,
        policy: FailurePolicy,
    ) -> ExecutionHandle {
        let client = self.client.clone();
        let symbol = symbol.to_string();
        let (handle, mut signal) = cancellation();

        let task = tokio::spawn(async move {
            let report =
                submit_sequence(client.as_ref(), requests, delay, policy, &mut signal).await;
            info!(
                "Run on {} finished: {}/{} orders placed",
                symbol,
                report.placed_count(),
                report.len()
            );
            report
        });

        ExecutionHandle { cancel: handle, task }
    }

    pub async fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<Order, EngineError> {
        let symbol = normalize_symbol(symbol);
        match self.client.cancel_order(&symbol, order_id).await {
            Ok(order) => {
                info!("Order cancelled: {} {}", symbol, order_id);
                Ok(order)
            }
            Err(e) => {
                error!("Error cancelling order {} {}: {}", symbol, order_id, e);
                Err(e.into())
            }
        }
    }

    pub async fn ping(&self) -> Result<(), EngineError> {
        Ok(self.client.ping().await?)
    }

    pub async fn open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, EngineError> {
        let symbol = symbol.map(normalize_symbol);
        Ok(self.client.open_orders(symbol.as_deref()).await?)
    }

    pub async fn all_orders(&self, symbol: &str) -> Result<Vec<Order>, EngineError> {
        Ok(self.client.all_orders(&normalize_symbol(symbol)).await?)
    }

    pub async fn balances(&self) -> Result<Vec<Balance>, EngineError> {
        Ok(self.client.balances().await?)
    }

    pub async fn balance(&self, asset: &str) -> Result<Option<Balance>, EngineError> {
        Ok(self.client.balance(asset).await?)
    }

    pub async fn tradable_pairs(&self, quote_asset: &str) -> Result<Vec<String>, EngineError> {
        Ok(self.client.tradable_pairs(quote_asset).await?)
    }

    pub async fn position(&self, symbol: &str) -> Result<Decimal, EngineError> {
        Ok(self.client.position(&normalize_symbol(symbol)).await?)
    }
}

#[derive(Debug)]
pub struct ExecutionHandle {
    cancel: CancelHandle,
    task: JoinHandle<BatchReport>,
}

impl ExecutionHandle {
    /// Stops further submissions. Orders already placed are left alone.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(self) -> Result<BatchReport, JoinError> {
        self.task.await
    }
}
