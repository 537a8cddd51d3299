//! Execution module
//!
//! Broker contract consumed by strategies, and the simulation broker used for
//! paper runs and backtests

mod paper;
mod types;

pub use paper::SimulationBroker;
pub use types::{
    Account, BatchOutcome, BrokerError, Order, OrderId, OrderModification, OrderRequest, Position,
};

use crate::market::Bar;
use async_trait::async_trait;

/// Order placement and position queries against named accounts.
///
/// Each method is atomic on its own. [`Broker::submit_batch`] additionally
/// guarantees that no other writer touches the account between the batch's
/// orders and the position read that follows them.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Names of all accounts
    async fn accounts(&self) -> Vec<String>;
    /// Place an order
    async fn place_order(&self, account: &str, request: OrderRequest) -> Result<Order, BrokerError>;
    /// Open positions of an account in a symbol
    async fn positions(&self, account: &str, symbol: &str) -> Result<Vec<Position>, BrokerError>;
    /// Change an order's SL/TP and visibility
    async fn modify_order(
        &self,
        account: &str,
        id: OrderId,
        modification: OrderModification,
    ) -> Result<Order, BrokerError>;
    /// Per-bar bookkeeping during backtests
    async fn process_bar(&self, symbol: &str, bar: &Bar);
    /// Place several orders and read the account's positions as one step
    async fn submit_batch(&self, account: &str, requests: Vec<OrderRequest>) -> BatchOutcome;
    /// Take the human-readable activity log accumulated since the last call
    async fn drain_activity(&self) -> Vec<String> {
        Vec::new()
    }
}
