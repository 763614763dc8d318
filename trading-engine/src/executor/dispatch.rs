use super::cancel::CancelSignal;
use super::types::*;
use crate::adapters::ExchangeClient;
use std::time::Duration;
use tracing::{info, warn};

/// Submits `requests` one after another, pausing `delay` between submissions.
///
/// Every request produces exactly one result, in order. The pause is raced
/// against `cancel`; once cancelled (or halted by `policy`) the remaining
/// requests are recorded as skipped without reaching the client.
pub(crate) async fn submit_sequence(
    client: &dyn ExchangeClient,
    requests: Vec<OrderRequest>,
    delay: Duration,
    policy: FailurePolicy,
    cancel: &mut CancelSignal,
) -> BatchReport {
    let total = requests.len();
    let mut results = Vec::with_capacity(total);
    let mut halted: Option<SkipReason> = None;

    let mut pending = requests.into_iter().enumerate().peekable();
    while let Some((index, request)) = pending.next() {
        if halted.is_none() && cancel.is_cancelled() {
            info!("Run cancelled before order {}/{}", index + 1, total);
            halted = Some(SkipReason::Cancelled);
        }
        if let Some(reason) = halted {
            results.push(ExecutionResult::Skipped { request, reason });
            continue;
        }

        let result = match client.submit_order(&request).await {
            Ok(order) => {
                info!(
                    "Order {}/{} placed: {} -> id {} {}",
                    index + 1,
                    total,
                    request,
                    order.order_id,
                    order.status
                );
                ExecutionResult::Placed { request, order }
            }
            Err(error) => {
                warn!("Order {}/{} failed: {}: {}", index + 1, total, request, error);
                if policy == FailurePolicy::StopOnFailure {
                    halted = Some(SkipReason::PriorFailure);
                }
                ExecutionResult::Failed { request, error }
            }
        };
        results.push(result);

        if halted.is_none() && pending.peek().is_some() && !delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    info!("Run cancelled after order {}/{}", index + 1, total);
                    halted = Some(SkipReason::Cancelled);
                }
            }
        }
    }

    BatchReport::new(results)
}
