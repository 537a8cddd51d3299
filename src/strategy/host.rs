//! Generic strategy host around a pluggable signal detector

use super::{
    apply_values, place_signals, OrderRouting, ParameterDescriptor, ParameterValue, RunState,
    StartMethod, StrategyControl, StrategyError, StrategyHost,
};
use crate::backtest::{BacktestScanner, BacktestSettings, ScanReport};
use crate::execution::{Broker, Order, OrderModification, OrderRequest};
use crate::market::{MarketData, Selection, Tick};
use crate::provider::DataProvider;
use crate::segmentation::PriceMode;
use crate::signal::{OrderKind, Side, TimeInForce, TradeSignal};
use crate::telemetry::{self, LatencyMetric};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

const START_EVENT: u32 = 0;
const START_PERIOD: u32 = 1;
const TRADE_SLOT: u32 = 2;
const ORDER_TYPE: u32 = 3;
const TIF: u32 = 4;
const HIDE_ORDER: u32 = 5;
const PRICE_ELEMENT: u32 = 6;
const HIDE_SL: u32 = 7;
const HIDE_TP: u32 = 8;
const QUANTITY: u32 = 9;
const SELL_OFFSET: u32 = 10;
const BUY_OFFSET: u32 = 11;
const SL_OFFSET: u32 = 12;
const TP_OFFSET: u32 = 13;
const BACKTEST_BATCH: u32 = 14;

const ON_OFF: &[&str] = &["ON", "OFF"];

const START_OPERATION: &str = "start";

/// Price of one offset point
fn point() -> Decimal {
    Decimal::new(1, 5)
}

/// What a detector sees besides the bars
#[derive(Debug, Clone, Default)]
pub struct DetectContext {
    /// Host state at evaluation time
    pub state: RunState,
    /// Selection whose event caused a live step
    pub trigger: Option<Selection>,
    /// Ticks collected since the previous live step
    pub ticks: Vec<Tick>,
    /// Configured order quantity
    pub quantity: Decimal,
}

/// Trading rules evaluated against market data
pub trait SignalDetector: Send + Sync {
    fn name(&self) -> &str;

    /// Forget accumulated history before a new backtest
    fn reset(&mut self) {}

    fn detect(
        &mut self,
        data: &MarketData,
        context: &DetectContext,
    ) -> Result<Vec<TradeSignal>, StrategyError>;
}

/// Host settings parsed from the parameter list
#[derive(Debug, Clone, PartialEq)]
pub struct HostSettings {
    pub start_method: StartMethod,
    pub execution_period: Duration,
    /// Only selections in this slot are traded
    pub trade_slot: u32,
    pub order_kind: OrderKind,
    pub time_in_force: TimeInForce,
    pub hide_order: bool,
    pub price_mode: PriceMode,
    pub hide_stop_loss: bool,
    pub hide_take_profit: bool,
    pub quantity: Decimal,
    pub sell_price_offset: Decimal,
    pub buy_price_offset: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub batch_size: usize,
}

impl HostSettings {
    /// Default parameter list of a signal host
    pub fn default_parameters() -> Vec<ParameterDescriptor> {
        vec![
            ParameterDescriptor::choice(
                START_EVENT,
                "Start Event: ",
                "Event that triggers a live evaluation",
                "Periodical",
                &["New Bar", "New Tick", "Periodical"],
            ),
            ParameterDescriptor::int(
                START_PERIOD,
                "Start Event Frequency: ",
                "Periodical start interval in ms",
                5000,
                1,
                1_000_000,
            ),
            ParameterDescriptor::int(
                TRADE_SLOT,
                "Trade Slot: ",
                "Instruments in this slot are traded",
                1,
                0,
                100,
            ),
            ParameterDescriptor::choice(
                ORDER_TYPE,
                "Order Type: ",
                "",
                "Market",
                &["Market", "Limit", "Stop Market"],
            ),
            ParameterDescriptor::choice(TIF, "TIF: ", "Time in force", "FOK", &["FOK", "GFD", "IOC", "GTC"]),
            ParameterDescriptor::choice(
                HIDE_ORDER,
                "Hide Order: ",
                "Limit and stop orders are not shown to the broker",
                "OFF",
                ON_OFF,
            ),
            ParameterDescriptor::choice(
                PRICE_ELEMENT,
                "BackTest Price Element: ",
                "Intrabar path replayed during backtests",
                "CLOSE",
                &["OPEN", "HIGH", "LOW", "CLOSE", "OHLC", "OLHC"],
            ),
            ParameterDescriptor::choice(HIDE_SL, "Hide SL ", "Stop loss is not shown to the broker", "OFF", ON_OFF),
            ParameterDescriptor::choice(HIDE_TP, "Hide TP ", "Take profit is not shown to the broker", "OFF", ON_OFF),
            ParameterDescriptor::int(QUANTITY, "Quantity: ", "", 1, 0, 100),
            ParameterDescriptor::int(SELL_OFFSET, "Sell Price Offset: ", "For 1 pip enter 10", 50, 0, 10_000),
            ParameterDescriptor::int(BUY_OFFSET, "Buy Price Offset: ", "For 1 pip enter 10", 50, 0, 10_000),
            ParameterDescriptor::int(SL_OFFSET, "Stop Loss Offset: ", "For 1 pip enter 10", 0, 0, 10_000),
            ParameterDescriptor::int(TP_OFFSET, "Take Profit Offset: ", "For 1 pip enter 10", 0, 0, 10_000),
            ParameterDescriptor::int(
                BACKTEST_BATCH,
                "Backtest Batch: ",
                "Bars per backtest evaluation window",
                1,
                0,
                1_000_000_000,
            ),
        ]
    }

    pub fn from_parameters(parameters: &[ParameterDescriptor]) -> Result<Self, StrategyError> {
        let start_method = match text(parameters, START_EVENT)?.as_str() {
            "New Bar" => StartMethod::NewBar,
            "New Tick" => StartMethod::NewTick,
            "Periodical" => StartMethod::Periodic,
            other => return Err(invalid("Start Event", other)),
        };

        let offset = |id| -> Result<Option<Decimal>, StrategyError> {
            let points = int(parameters, id)?;
            Ok((points > 0).then(|| Decimal::from(points) * point()))
        };

        Ok(Self {
            start_method,
            execution_period: Duration::from_millis(int(parameters, START_PERIOD)?.max(1) as u64),
            trade_slot: int(parameters, TRADE_SLOT)? as u32,
            order_kind: text(parameters, ORDER_TYPE)?
                .parse()
                .map_err(StrategyError::Configuration)?,
            time_in_force: text(parameters, TIF)?
                .parse()
                .map_err(StrategyError::Configuration)?,
            hide_order: on_off(parameters, HIDE_ORDER, "Hide Order")?,
            price_mode: text(parameters, PRICE_ELEMENT)?
                .parse()
                .map_err(StrategyError::Configuration)?,
            hide_stop_loss: on_off(parameters, HIDE_SL, "Hide SL")?,
            hide_take_profit: on_off(parameters, HIDE_TP, "Hide TP")?,
            quantity: Decimal::from(int(parameters, QUANTITY)?),
            sell_price_offset: Decimal::from(int(parameters, SELL_OFFSET)?) * point(),
            buy_price_offset: Decimal::from(int(parameters, BUY_OFFSET)?) * point(),
            stop_loss: offset(SL_OFFSET)?,
            take_profit: offset(TP_OFFSET)?,
            batch_size: int(parameters, BACKTEST_BATCH)?.max(0) as usize,
        })
    }
}

fn find(parameters: &[ParameterDescriptor], id: u32) -> Result<&ParameterDescriptor, StrategyError> {
    parameters
        .iter()
        .find(|p| p.id == id)
        .ok_or_else(|| StrategyError::Configuration(format!("Missing parameter {}", id)))
}

fn text(parameters: &[ParameterDescriptor], id: u32) -> Result<String, StrategyError> {
    let descriptor = find(parameters, id)?;
    match descriptor.value() {
        ParameterValue::Text(value) => Ok(value),
        _ => Err(StrategyError::Configuration(format!(
            "Parameter '{}' is not a text parameter",
            descriptor.name.trim()
        ))),
    }
}

fn int(parameters: &[ParameterDescriptor], id: u32) -> Result<i64, StrategyError> {
    let descriptor = find(parameters, id)?;
    descriptor.value().as_int().ok_or_else(|| {
        StrategyError::Configuration(format!(
            "Parameter '{}' is not an int parameter",
            descriptor.name.trim()
        ))
    })
}

fn on_off(parameters: &[ParameterDescriptor], id: u32, label: &str) -> Result<bool, StrategyError> {
    match text(parameters, id)?.as_str() {
        "ON" => Ok(true),
        "OFF" => Ok(false),
        other => Err(invalid(label, other)),
    }
}

fn invalid(label: &str, value: &str) -> StrategyError {
    StrategyError::Configuration(format!("Invalid {} parameter '{}'", label, value))
}

/// Order shaping from host settings.
///
/// Signals for symbols outside the trade slot are dropped. Limit and stop
/// orders are priced off the latest quote, falling back to the signal price
/// when no quote source is attached or it has no tick.
pub struct HostRouting<'a> {
    settings: HostSettings,
    tradeable: HashSet<String>,
    quotes: Option<&'a dyn DataProvider>,
}

impl<'a> HostRouting<'a> {
    pub fn new(settings: HostSettings, selections: &[Selection]) -> Self {
        let tradeable = selections
            .iter()
            .filter(|s| s.slot == Some(settings.trade_slot))
            .map(|s| s.symbol.clone())
            .collect();
        Self {
            settings,
            tradeable,
            quotes: None,
        }
    }

    /// Price limit and stop orders from this provider's last ticks
    pub fn with_quotes(mut self, quotes: &'a dyn DataProvider) -> Self {
        self.quotes = Some(quotes);
        self
    }

    fn order_price(&self, signal: &TradeSignal) -> Decimal {
        let kind = self.settings.order_kind;
        if kind == OrderKind::Market {
            return signal.price;
        }

        let quote = self
            .quotes
            .and_then(|q| q.last_tick(&signal.instrument.data_feed, &signal.instrument.symbol));
        let (bid, ask) = quote
            .map(|t| (t.bid, t.ask))
            .unwrap_or((signal.price, signal.price));

        match (signal.side, kind) {
            (Side::Buy, OrderKind::Limit) => ask - self.settings.buy_price_offset,
            (Side::Buy, _) => ask + self.settings.buy_price_offset,
            (Side::Sell, OrderKind::Limit) => bid + self.settings.sell_price_offset,
            (Side::Sell, _) => bid - self.settings.sell_price_offset,
        }
    }
}

impl OrderRouting for HostRouting<'_> {
    fn route(&self, signal: &TradeSignal) -> Option<OrderRequest> {
        if !self.tradeable.contains(&signal.instrument.symbol) {
            return None;
        }

        let settings = &self.settings;
        let mut request = OrderRequest::from(signal);
        request.quantity = settings.quantity;
        request.kind = settings.order_kind;
        request.time_in_force = settings.time_in_force;
        request.price = self.order_price(signal);
        request.stop_loss = settings.stop_loss.filter(|_| !settings.hide_stop_loss);
        request.take_profit = settings.take_profit.filter(|_| !settings.hide_take_profit);
        request.hidden = settings.hide_order;
        Some(request)
    }

    fn after_fill(&self, _order: &Order) -> Option<OrderModification> {
        let settings = &self.settings;
        (settings.hide_stop_loss || settings.hide_take_profit).then(|| OrderModification {
            stop_loss: settings.stop_loss,
            take_profit: settings.take_profit,
            hidden: settings.hide_stop_loss,
        })
    }
}

/// Strategy host that evaluates a [`SignalDetector`] live and in backtests
pub struct SignalHost {
    name: String,
    detector: Box<dyn SignalDetector>,
    provider: Arc<dyn DataProvider>,
    broker: Arc<dyn Broker>,
    control: StrategyControl,
    parameters: Vec<ParameterDescriptor>,
    settings: HostSettings,
    selections: Vec<Selection>,
    accounts: Vec<String>,
    backtest: BacktestSettings,
    initialized: bool,
}

impl SignalHost {
    pub fn new(
        detector: Box<dyn SignalDetector>,
        provider: Arc<dyn DataProvider>,
        broker: Arc<dyn Broker>,
    ) -> Result<Self, StrategyError> {
        let parameters = HostSettings::default_parameters();
        let settings = HostSettings::from_parameters(&parameters)?;
        Ok(Self {
            name: detector.name().to_string(),
            detector,
            provider,
            broker,
            control: StrategyControl::new(),
            parameters,
            settings,
            selections: Vec::new(),
            accounts: Vec::new(),
            backtest: BacktestSettings::default(),
            initialized: false,
        })
    }

    /// Accounts to trade on; defaults to every broker account
    pub fn with_accounts(mut self, accounts: Vec<String>) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn with_backtest_settings(mut self, settings: BacktestSettings) -> Self {
        self.backtest = settings;
        self
    }

    pub fn settings(&self) -> &HostSettings {
        &self.settings
    }

    /// Run a full backtest over the initialised selections.
    ///
    /// Moves the host to `Backtesting` for the duration of the scan, so the
    /// configured price mode applies, and back to `Stopped` afterwards.
    pub async fn backtest(&mut self) -> Result<ScanReport, StrategyError> {
        if !self.initialized {
            return Err(StrategyError::NotInitialized);
        }
        if !self.control.transition(RunState::Stopped, RunState::Backtesting) {
            return Err(StrategyError::Configuration(format!(
                "Cannot backtest while {}",
                self.control.state()
            )));
        }
        self.control.set_progress(0);

        let selections = self.selections.clone();
        let settings = self.settings.clone();
        let report = self.scan(&selections, settings).await;

        self.control.transition(RunState::Backtesting, RunState::Stopped);
        Ok(report)
    }

    async fn trading_accounts(&self) -> Vec<String> {
        if self.accounts.is_empty() {
            self.broker.accounts().await
        } else {
            self.accounts.clone()
        }
    }

    async fn scan(&mut self, selections: &[Selection], settings: HostSettings) -> ScanReport {
        let accounts = self.trading_accounts().await;
        let context = DetectContext {
            state: self.control.state(),
            quantity: settings.quantity,
            ..DetectContext::default()
        };
        let batch_size = settings.batch_size;
        let price_mode = settings.price_mode;
        let routing = HostRouting::new(settings, selections);

        let mut scanner = BacktestScanner::new(
            self.provider.as_ref(),
            self.broker.as_ref(),
            &routing,
            &self.control,
        )
        .with_settings(self.backtest.clone())
        .with_accounts(accounts);
        if context.state == RunState::Backtesting {
            scanner = scanner.with_segmentation(price_mode);
        }

        let detector = &mut self.detector;
        detector.reset();
        scanner
            .run(selections, batch_size, |data| detector.detect(data, &context))
            .await
    }
}

#[async_trait]
impl StrategyHost for SignalHost {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, selections: Vec<Selection>) -> Result<(), StrategyError> {
        if selections.is_empty() {
            return Err(StrategyError::Configuration(
                "At least one selection is required".to_string(),
            ));
        }

        let tradeable = selections
            .iter()
            .filter(|s| s.slot == Some(self.settings.trade_slot))
            .count();
        tracing::info!(
            strategy = %self.name,
            selections = selections.len(),
            tradeable,
            start_method = ?self.settings.start_method,
            "Strategy initialized"
        );

        self.selections = selections;
        self.initialized = true;
        self.control.set_ready(true);
        Ok(())
    }

    fn parameters(&self) -> Vec<ParameterDescriptor> {
        self.parameters.clone()
    }

    fn set_parameters(&mut self, values: &[ParameterValue]) -> Result<(), StrategyError> {
        let mut staged = self.parameters.clone();
        apply_values(&mut staged, values)?;
        let settings = HostSettings::from_parameters(&staged)?;

        self.parameters = staged;
        self.settings = settings;
        Ok(())
    }

    async fn start(
        &mut self,
        trigger: Option<&Selection>,
        ticks: Option<&[Tick]>,
    ) -> Result<Vec<TradeSignal>, StrategyError> {
        if !self.initialized {
            return Err(StrategyError::NotInitialized);
        }

        let started = Instant::now();
        let data = match trigger {
            Some(selection) if self.settings.start_method == StartMethod::NewBar => {
                self.provider.market_data(std::slice::from_ref(selection))
            }
            _ => self.provider.market_data(&self.selections),
        };
        let context = DetectContext {
            state: self.control.state(),
            trigger: trigger.cloned(),
            ticks: ticks.map(<[Tick]>::to_vec).unwrap_or_default(),
            quantity: self.settings.quantity,
        };

        let signals = self.detector.detect(&data, &context);
        telemetry::record_latency(LatencyMetric::StrategyInvocation, started.elapsed());
        let signals = signals?;

        if !signals.is_empty() {
            let accounts = self.trading_accounts().await;
            let routing =
                HostRouting::new(self.settings.clone(), &self.selections).with_quotes(self.provider.as_ref());
            place_signals(
                self.broker.as_ref(),
                &accounts,
                &routing,
                &signals,
                self.control.alerts(),
                START_OPERATION,
            )
            .await;
        }

        Ok(signals)
    }

    async fn backtest_slot_item(
        &mut self,
        selections: &[Selection],
        values: &[ParameterValue],
    ) -> Result<Vec<TradeSignal>, StrategyError> {
        let settings = if values.is_empty() {
            self.settings.clone()
        } else {
            let mut staged = self.parameters.clone();
            apply_values(&mut staged, values)?;
            HostSettings::from_parameters(&staged)?
        };

        Ok(self.scan(selections, settings).await.signals)
    }

    fn control(&self) -> StrategyControl {
        self.control.clone()
    }

    fn start_method(&self) -> StartMethod {
        self.settings.start_method
    }

    fn execution_period(&self) -> Duration {
        self.settings.execution_period
    }

    fn selections(&self) -> Vec<Selection> {
        self.selections.clone()
    }
}
