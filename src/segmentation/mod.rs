//! Price-path segmentation
//!
//! Replays the trigger bar (last bar of the last selection) as a sequence of
//! intrabar states so a detector never sees a price the bar may not yet have
//! reached. Each state is derived from the original bar:
//!
//! | Point | Rewrite |
//! |-------|---------|
//! | Open  | high, low, close := open |
//! | High  | low, close := high |
//! | Low   | close := low |
//! | Close | unchanged |
//!
//! Both sides are rewritten from their own original values, so a side that
//! was never populated stays zero.

mod types;

pub use types::PriceMode;

use crate::market::{Bar, MarketData, PricePoint};
use crate::signal::TradeSignal;

/// Rewrite a bar to its state at a price point
pub fn sub_bar(original: &Bar, point: PricePoint) -> Bar {
    let mut bar = original.clone();
    match point {
        PricePoint::Open => {
            bar.high_bid = original.open_bid;
            bar.high_ask = original.open_ask;
            bar.low_bid = original.open_bid;
            bar.low_ask = original.open_ask;
            bar.close_bid = original.open_bid;
            bar.close_ask = original.open_ask;
        }
        PricePoint::High => {
            bar.low_bid = original.high_bid;
            bar.low_ask = original.high_ask;
            bar.close_bid = original.high_bid;
            bar.close_ask = original.high_ask;
        }
        PricePoint::Low => {
            bar.close_bid = original.low_bid;
            bar.close_ask = original.low_ask;
        }
        PricePoint::Close => {}
    }
    bar
}

/// Build the rewritten market data for every pass of `mode`.
///
/// The input is never modified. Without a trigger bar a single unmodified
/// copy is returned, labelled [`PricePoint::Close`].
pub fn segment(mode: PriceMode, data: &MarketData) -> Vec<(MarketData, PricePoint)> {
    let Some(original) = data.trigger_bar() else {
        return vec![(data.clone(), PricePoint::Close)];
    };

    mode.passes()
        .iter()
        .map(|&point| {
            let mut copy = data.clone();
            if let Some(bar) = copy.trigger_bar_mut() {
                *bar = sub_bar(original, point);
            }
            (copy, point)
        })
        .collect()
}

/// Run `detect` once per pass, in order, and concatenate the signals.
///
/// The first detector error abandons the remaining passes.
pub fn run_segmented<E>(
    mode: PriceMode,
    data: &MarketData,
    mut detect: impl FnMut(&MarketData) -> Result<Vec<TradeSignal>, E>,
) -> Result<Vec<TradeSignal>, E> {
    let mut signals = Vec::new();
    for (pass, point) in segment(mode, data) {
        tracing::trace!(?point, "Segment pass");
        signals.extend(detect(&pass)?);
    }
    Ok(signals)
}
