//! Turning trade signals into broker orders

use super::AlertLog;
use crate::execution::{Broker, Order, OrderModification, OrderRequest};
use crate::signal::TradeSignal;
use crate::telemetry::{self, CounterMetric, LatencyMetric};
use std::time::Instant;

/// Decides which signals become orders and how they are shaped
pub trait OrderRouting: Send + Sync {
    /// Order for a signal, or `None` to drop it
    fn route(&self, signal: &TradeSignal) -> Option<OrderRequest>;

    /// Follow-up change for an accepted order
    fn after_fill(&self, _order: &Order) -> Option<OrderModification> {
        None
    }
}

/// Places every signal as-is
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectRouting;

impl OrderRouting for DirectRouting {
    fn route(&self, signal: &TradeSignal) -> Option<OrderRequest> {
        Some(OrderRequest::from(signal))
    }
}

/// Place routed signals on every account.
///
/// Each account's orders go through one [`Broker::submit_batch`] call.
/// Rejections and failed follow-up modifications become alerts and the
/// broker's activity log is recorded as output; nothing here aborts the
/// caller.
pub async fn place_signals(
    broker: &dyn Broker,
    accounts: &[String],
    routing: &dyn OrderRouting,
    signals: &[TradeSignal],
    alerts: &AlertLog,
    operation: &str,
) -> Vec<Order> {
    let requests: Vec<OrderRequest> = signals.iter().filter_map(|s| routing.route(s)).collect();
    if requests.is_empty() {
        return Vec::new();
    }

    let mut placed = Vec::new();
    for account in accounts {
        let start = Instant::now();
        let outcome = broker.submit_batch(account, requests.clone()).await;
        telemetry::record_latency(LatencyMetric::OrderPlacement, start.elapsed());

        for (request, error) in &outcome.rejections {
            alerts.alert(
                operation,
                format!(
                    "{} {} {} on {} rejected: {}",
                    request.side, request.quantity, request.symbol, account, error
                ),
            );
        }

        for order in outcome.orders {
            if let Some(modification) = routing.after_fill(&order) {
                match broker.modify_order(account, order.id, modification).await {
                    Ok(modified) => {
                        placed.push(modified);
                        continue;
                    }
                    Err(e) => alerts.alert(operation, format!("modify {} failed: {}", order.id, e)),
                }
            }
            placed.push(order);
        }

        tracing::debug!(
            account = %account,
            open_positions = outcome.positions.len(),
            "Orders placed"
        );
    }

    for line in broker.drain_activity().await {
        alerts.output(operation, line);
    }

    telemetry::increment(CounterMetric::TradeSignals, signals.len() as u64);
    placed
}
