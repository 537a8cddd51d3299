//! Simulation broker with immediate fills

use super::{
    Account, BatchOutcome, Broker, BrokerError, Order, OrderId, OrderModification, OrderRequest,
    Position,
};
use crate::market::Bar;
use crate::signal::Side;
use crate::telemetry::{self, CounterMetric, GaugeMetric};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

/// Signed net position (positive = long)
#[derive(Debug, Clone, Default)]
struct Holding {
    net: Decimal,
    average_price: Decimal,
    realized_pnl: Decimal,
}

impl Holding {
    /// Apply a signed fill, returning the P&L it realised
    fn apply(&mut self, delta: Decimal, price: Decimal) -> Decimal {
        if self.net.is_zero() || self.net.is_sign_positive() == delta.is_sign_positive() {
            let total = self.net.abs() + delta.abs();
            self.average_price = (self.net.abs() * self.average_price + delta.abs() * price) / total;
            self.net += delta;
            return Decimal::ZERO;
        }

        let closing = delta.abs().min(self.net.abs());
        let direction = if self.net.is_sign_positive() {
            Decimal::ONE
        } else {
            Decimal::NEGATIVE_ONE
        };
        let realized = closing * (price - self.average_price) * direction;
        self.realized_pnl += realized;

        let before = self.net;
        self.net += delta;
        if self.net.is_zero() {
            self.average_price = Decimal::ZERO;
        } else if before.is_sign_positive() != self.net.is_sign_positive() {
            // flipped through zero
            self.average_price = price;
        }
        realized
    }
}

#[derive(Default)]
struct BrokerState {
    accounts: BTreeMap<String, Account>,
    holdings: BTreeMap<(String, String), Holding>,
    orders: Vec<Order>,
    last_prices: HashMap<String, Decimal>,
    activity: Vec<String>,
}

impl BrokerState {
    fn place(&mut self, account: &str, request: OrderRequest, fee_rate: Decimal) -> Result<Order, BrokerError> {
        if !self.accounts.contains_key(account) {
            return Err(BrokerError::UnknownAccount(account.to_string()));
        }
        if request.quantity <= Decimal::ZERO {
            return Err(BrokerError::InvalidQuantity(request.quantity));
        }

        let price = if request.price > Decimal::ZERO {
            request.price
        } else {
            *self
                .last_prices
                .get(&request.symbol)
                .ok_or_else(|| BrokerError::NoPrice(request.symbol.clone()))?
        };

        let fees = request.quantity * price * fee_rate;
        let delta = match request.side {
            Side::Buy => request.quantity,
            Side::Sell => -request.quantity,
        };
        let realized = self
            .holdings
            .entry((account.to_string(), request.symbol.clone()))
            .or_default()
            .apply(delta, price);

        if let Some(acc) = self.accounts.get_mut(account) {
            acc.balance += realized - fees;
        }

        let order = Order {
            id: OrderId::new_v4(),
            account: account.to_string(),
            symbol: request.symbol,
            side: request.side,
            quantity: request.quantity,
            price,
            kind: request.kind,
            time_in_force: request.time_in_force,
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
            hidden: request.hidden,
            fees,
            timestamp: request.timestamp,
        };

        self.activity.push(format!(
            "{} {} {} {} @ {} on {}",
            order.id, order.side, order.quantity, order.symbol, order.price, order.account
        ));
        self.orders.push(order.clone());
        Ok(order)
    }

    fn positions(&self, account: &str, symbol: Option<&str>) -> Result<Vec<Position>, BrokerError> {
        if !self.accounts.contains_key(account) {
            return Err(BrokerError::UnknownAccount(account.to_string()));
        }

        Ok(self
            .holdings
            .iter()
            .filter(|((acc, sym), h)| {
                acc == account && symbol.map_or(true, |s| s == sym) && !h.net.is_zero()
            })
            .map(|((acc, sym), h)| {
                let last_price = self
                    .last_prices
                    .get(sym)
                    .copied()
                    .unwrap_or(h.average_price);
                Position {
                    account: acc.clone(),
                    symbol: sym.clone(),
                    side: if h.net.is_sign_positive() { Side::Buy } else { Side::Sell },
                    quantity: h.net.abs(),
                    average_price: h.average_price,
                    last_price,
                    unrealized_pnl: (last_price - h.average_price) * h.net,
                    realized_pnl: h.realized_pnl,
                }
            })
            .collect())
    }

    fn open_positions(&self) -> usize {
        self.holdings.values().filter(|h| !h.net.is_zero()).count()
    }
}

/// Broker that fills every accepted order immediately at its price.
///
/// Market orders without a price fill at the mean close of the last bar
/// processed for the symbol. Positions are netted per account and symbol.
pub struct SimulationBroker {
    fee_rate: Decimal,
    state: Mutex<BrokerState>,
}

impl SimulationBroker {
    /// Create a new simulation broker charging `fee_rate` of notional per fill
    pub fn new(fee_rate: Decimal) -> Self {
        Self {
            fee_rate,
            state: Mutex::new(BrokerState::default()),
        }
    }

    /// Add an account (builder style)
    pub fn with_account(
        mut self,
        name: impl Into<String>,
        data_feed: impl Into<String>,
        balance: Decimal,
    ) -> Self {
        let name = name.into();
        let account = Account {
            name: name.clone(),
            data_feed: data_feed.into(),
            balance,
        };
        self.state.get_mut().accounts.insert(name, account);
        self
    }

    pub async fn account(&self, name: &str) -> Option<Account> {
        self.state.lock().await.accounts.get(name).cloned()
    }

    /// All filled orders
    pub async fn orders(&self) -> Vec<Order> {
        self.state.lock().await.orders.clone()
    }

}

#[async_trait]
impl Broker for SimulationBroker {
    async fn accounts(&self) -> Vec<String> {
        self.state.lock().await.accounts.keys().cloned().collect()
    }

    async fn place_order(&self, account: &str, request: OrderRequest) -> Result<Order, BrokerError> {
        let mut state = self.state.lock().await;
        let result = state.place(account, request, self.fee_rate);
        match &result {
            Ok(order) => tracing::debug!(order_id = %order.id, account, "Simulated order filled"),
            Err(e) => {
                telemetry::increment(CounterMetric::BrokerRejections, 1);
                tracing::debug!(account, error = %e, "Simulated order rejected");
            }
        }
        telemetry::set_gauge(GaugeMetric::OpenPositions, state.open_positions() as f64);
        result
    }

    async fn positions(&self, account: &str, symbol: &str) -> Result<Vec<Position>, BrokerError> {
        self.state.lock().await.positions(account, Some(symbol))
    }

    async fn modify_order(
        &self,
        account: &str,
        id: OrderId,
        modification: OrderModification,
    ) -> Result<Order, BrokerError> {
        let mut state = self.state.lock().await;
        if !state.accounts.contains_key(account) {
            return Err(BrokerError::UnknownAccount(account.to_string()));
        }

        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == id && o.account == account)
            .ok_or(BrokerError::UnknownOrder(id))?;
        order.stop_loss = modification.stop_loss;
        order.take_profit = modification.take_profit;
        order.hidden = modification.hidden;
        let order = order.clone();

        state
            .activity
            .push(format!("{} modified (hidden = {})", id, modification.hidden));
        Ok(order)
    }

    async fn process_bar(&self, symbol: &str, bar: &Bar) {
        let price = bar.mean_close();
        if price.is_zero() {
            return;
        }
        self.state
            .lock()
            .await
            .last_prices
            .insert(symbol.to_string(), price);
    }

    async fn submit_batch(&self, account: &str, requests: Vec<OrderRequest>) -> BatchOutcome {
        let mut state = self.state.lock().await;
        let mut outcome = BatchOutcome::default();

        for request in requests {
            match state.place(account, request.clone(), self.fee_rate) {
                Ok(order) => outcome.orders.push(order),
                Err(e) => {
                    telemetry::increment(CounterMetric::BrokerRejections, 1);
                    outcome.rejections.push((request, e));
                }
            }
        }

        outcome.positions = state.positions(account, None).unwrap_or_default();
        telemetry::set_gauge(GaugeMetric::OpenPositions, state.open_positions() as f64);
        outcome
    }

    async fn drain_activity(&self) -> Vec<String> {
        std::mem::take(&mut self.state.lock().await.activity)
    }
}
