//! Bollinger band breakout detector
//!
//! Opens a position when the previous close breaks out of the bands while the
//! fast moving average confirms the direction, and closes it when price
//! crosses back over the band's middle line.

use super::{DetectContext, RunState, SignalDetector, StrategyError};
use crate::market::{Bar, MarketData, Selection};
use crate::signal::{Side, TradeSignal};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// Configuration for the breakout detector
#[derive(Debug, Clone)]
pub struct BreakoutConfig {
    /// Moving average period (default: 9)
    pub ma_period: usize,
    /// Bollinger band period (default: 28)
    pub bands_period: usize,
    /// Band width in standard deviations (default: 2)
    pub deviation: Decimal,
    /// Bars needed before any signal (default: 30)
    pub required_bars: usize,
}

impl Default for BreakoutConfig {
    fn default() -> Self {
        Self {
            ma_period: 9,
            bands_period: 28,
            deviation: dec!(2),
            required_bars: 30,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Bands {
    middle: Decimal,
    upper: Decimal,
    lower: Decimal,
}

/// Breakout detector with per-selection bar history.
///
/// Live evaluations see the full history in every call. Backtest windows
/// only carry the latest bars, so the detector keeps what it has seen; a bar
/// with the timestamp of the last stored one replaces it, which lets each
/// segmentation pass update the forming bar.
pub struct BreakoutDetector {
    config: BreakoutConfig,
    history: HashMap<Selection, Vec<Bar>>,
    positions: HashMap<String, Side>,
}

impl BreakoutDetector {
    pub fn new(config: BreakoutConfig) -> Self {
        Self {
            config,
            history: HashMap::new(),
            positions: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(BreakoutConfig::default())
    }

    /// Open position per symbol as tracked by the detector
    pub fn position(&self, symbol: &str) -> Option<Side> {
        self.positions.get(symbol).copied()
    }

    fn capacity(&self) -> usize {
        self.config.required_bars.max(self.config.bands_period + 2) * 2
    }

    fn remember(&mut self, selection: &Selection, bars: &[Bar]) {
        let capacity = self.capacity();
        let stored = self.history.entry(selection.clone()).or_default();
        for bar in bars {
            match stored.last().map(|b| b.timestamp) {
                Some(last) if bar.timestamp < last => {}
                Some(last) if bar.timestamp == last => {
                    if let Some(forming) = stored.last_mut() {
                        *forming = bar.clone();
                    }
                }
                _ => stored.push(bar.clone()),
            }
        }
        if stored.len() > capacity {
            stored.drain(..stored.len() - capacity);
        }
    }

    fn evaluate(
        &mut self,
        selection: &Selection,
        bars: &[Bar],
        quantity: Decimal,
    ) -> Option<TradeSignal> {
        if bars.len() < self.config.required_bars {
            return None;
        }
        let closes: Vec<Decimal> = bars.iter().map(Bar::mean_close).collect();
        let current = bars.last()?;

        let close = |shift: usize| closes.get(closes.len().checked_sub(shift + 1)?).copied();
        let ma_fast = sma(&closes, self.config.ma_period, 1)?;
        let ma_slow = sma(&closes, self.config.ma_period, 4)?;
        let bands = bands(&closes, self.config.bands_period, 1, self.config.deviation)?;
        let (previous, earlier) = (close(1)?, close(4)?);

        let symbol = &selection.symbol;
        let signal = |side: Side| {
            let price = match side {
                Side::Buy => current.close_ask,
                Side::Sell => current.close_bid,
            };
            TradeSignal::market(selection.clone(), side, price, quantity, current.timestamp)
        };

        match self.positions.get(symbol).copied() {
            Some(Side::Buy) if previous < bands.middle => {
                self.positions.remove(symbol);
                tracing::debug!(symbol = %symbol, "Long closed below middle band");
                Some(signal(Side::Sell))
            }
            Some(Side::Sell) if previous > bands.middle => {
                self.positions.remove(symbol);
                tracing::debug!(symbol = %symbol, "Short closed above middle band");
                Some(signal(Side::Buy))
            }
            Some(_) => None,
            None if earlier < bands.upper && previous > bands.upper && ma_fast > ma_slow => {
                self.positions.insert(symbol.clone(), Side::Buy);
                tracing::debug!(symbol = %symbol, upper = %bands.upper, "Upper band breakout");
                Some(signal(Side::Buy))
            }
            None if earlier > bands.lower && previous < bands.lower && ma_fast < ma_slow => {
                self.positions.insert(symbol.clone(), Side::Sell);
                tracing::debug!(symbol = %symbol, lower = %bands.lower, "Lower band breakout");
                Some(signal(Side::Sell))
            }
            None => None,
        }
    }
}

/// Simple moving average of `period` values ending `shift` values before the last
fn sma(values: &[Decimal], period: usize, shift: usize) -> Option<Decimal> {
    let window = window(values, period, shift)?;
    Some(window.iter().sum::<Decimal>() / Decimal::from(period))
}

fn bands(values: &[Decimal], period: usize, shift: usize, deviation: Decimal) -> Option<Bands> {
    let window = window(values, period, shift)?;
    let n = Decimal::from(period);
    let middle = window.iter().sum::<Decimal>() / n;
    let variance = window.iter().map(|v| (v - middle) * (v - middle)).sum::<Decimal>() / n;

    let std_dev: f64 = f64::try_from(variance).ok()?.sqrt();
    let width = Decimal::try_from(std_dev).ok()? * deviation;
    Some(Bands {
        middle,
        upper: middle + width,
        lower: middle - width,
    })
}

fn window(values: &[Decimal], period: usize, shift: usize) -> Option<&[Decimal]> {
    if period == 0 {
        return None;
    }
    let end = values.len().checked_sub(shift)?;
    let start = end.checked_sub(period)?;
    values.get(start..end)
}

impl SignalDetector for BreakoutDetector {
    fn name(&self) -> &str {
        "breakout"
    }

    fn reset(&mut self) {
        self.history.clear();
        self.positions.clear();
    }

    fn detect(
        &mut self,
        data: &MarketData,
        context: &DetectContext,
    ) -> Result<Vec<TradeSignal>, StrategyError> {
        let quantity = if context.quantity > Decimal::ZERO {
            context.quantity
        } else {
            Decimal::ONE
        };

        let mut signals = Vec::new();
        for (selection, bars) in data.iter() {
            let signal = if context.state == RunState::Backtesting {
                self.remember(selection, bars);
                let stored = self.history.get(selection).cloned().unwrap_or_default();
                self.evaluate(selection, &stored, quantity)
            } else {
                self.evaluate(selection, bars, quantity)
            };
            signals.extend(signal);
        }
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Timeframe;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(m: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(m)
    }

    fn selection() -> Selection {
        Selection::new("EURUSD", "sim", Timeframe::minutes(1))
    }

    /// 30 flat bars at 1.0 followed by the given closes
    fn series(tail: &[Decimal]) -> Vec<Bar> {
        let mut closes = vec![dec!(1.0); 30];
        closes.extend_from_slice(tail);
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| Bar::flat(t(i as i64), *c, *c))
            .collect()
    }

    fn data(bars: Vec<Bar>) -> MarketData {
        let mut data = MarketData::new();
        data.insert(selection(), bars);
        data
    }

    fn live() -> DetectContext {
        DetectContext {
            state: RunState::Running,
            quantity: dec!(2),
            ..DetectContext::default()
        }
    }

    #[test]
    fn test_sma_and_bands() {
        let values = vec![dec!(1), dec!(2), dec!(3), dec!(4), dec!(100)];
        assert_eq!(sma(&values, 2, 1), Some(dec!(3.5)));
        assert_eq!(sma(&values, 5, 1), None);

        let flat = vec![dec!(2); 5];
        let b = bands(&flat, 4, 0, dec!(2)).unwrap();
        assert_eq!(b.upper, dec!(2));
        assert_eq!(b.lower, dec!(2));
    }

    #[test]
    fn test_needs_required_bars() {
        let mut detector = BreakoutDetector::with_defaults();
        let bars: Vec<Bar> = series(&[]).into_iter().take(20).collect();
        assert!(detector.detect(&data(bars), &live()).unwrap().is_empty());
    }

    #[test]
    fn test_upper_breakout_opens_long_then_closes() {
        let mut detector = BreakoutDetector::with_defaults();

        let signals = detector
            .detect(&data(series(&[dec!(1.1), dec!(1.1)])), &live())
            .unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, Side::Buy);
        assert_eq!(signals[0].quantity, dec!(2));
        assert_eq!(detector.position("EURUSD"), Some(Side::Buy));

        let signals = detector
            .detect(
                &data(series(&[dec!(1.1), dec!(1.1), dec!(0.9), dec!(0.9)])),
                &live(),
            )
            .unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, Side::Sell);
        assert_eq!(detector.position("EURUSD"), None);
    }

    #[test]
    fn test_lower_breakout_opens_short() {
        let mut detector = BreakoutDetector::with_defaults();
        let signals = detector
            .detect(&data(series(&[dec!(0.9), dec!(0.9)])), &live())
            .unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, Side::Sell);
    }

    #[test]
    fn test_backtest_windows_accumulate() {
        let mut detector = BreakoutDetector::with_defaults();
        let context = DetectContext {
            state: RunState::Backtesting,
            ..DetectContext::default()
        };

        let bars = series(&[dec!(1.1), dec!(1.1)]);
        let mut emitted = Vec::new();
        for bar in &bars {
            emitted.extend(detector.detect(&data(vec![bar.clone()]), &context).unwrap());
        }
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].quantity, dec!(1));

        detector.reset();
        assert_eq!(detector.position("EURUSD"), None);
    }

    #[test]
    fn test_forming_bar_is_replaced() {
        let mut detector = BreakoutDetector::with_defaults();
        let sel = selection();
        detector.remember(&sel, &[Bar::flat(t(0), dec!(1), dec!(1))]);
        detector.remember(&sel, &[Bar::flat(t(0), dec!(2), dec!(2))]);
        detector.remember(&sel, &[Bar::flat(t(1), dec!(3), dec!(3))]);

        let stored = &detector.history[&sel];
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].close_bid, dec!(2));
    }
}
