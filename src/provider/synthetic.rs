//! Seeded synthetic bar and tick generator

use crate::market::{Bar, DepthLevel, SeriesKey, Tick, Timeframe};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

fn default_bars() -> usize {
    500
}

fn default_ticks() -> usize {
    100
}

fn default_seed() -> u64 {
    42
}

/// Definition of one synthetic instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticParams {
    pub symbol: String,
    pub data_feed: String,
    pub timeframe: Timeframe,
    /// Number of bars
    #[serde(default = "default_bars")]
    pub bars: usize,
    /// Number of ticks following the last bar
    #[serde(default = "default_ticks")]
    pub ticks: usize,
    /// Depth levels attached to each tick
    #[serde(default)]
    pub depth_levels: u32,
    pub price_min: Decimal,
    pub price_max: Decimal,
    #[serde(default)]
    pub slot: Option<u32>,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl SyntheticParams {
    pub fn series_key(&self) -> SeriesKey {
        let key = SeriesKey::new(self.symbol.clone(), self.data_feed.clone(), self.timeframe);
        match self.slot {
            Some(slot) => key.with_slot(slot),
            None => key,
        }
    }
}

/// Generated history of one instrument
#[derive(Debug, Clone)]
pub struct SyntheticSeries {
    pub key: SeriesKey,
    pub bars: Vec<Bar>,
    pub ticks: Vec<Tick>,
}

/// Uniform prices in thousandths between min and max
struct PriceSampler {
    rng: StdRng,
    low: i64,
    high: i64,
}

impl PriceSampler {
    fn new(params: &SyntheticParams) -> Self {
        let scale = |d: Decimal| (d * Decimal::from(1000)).trunc().to_i64().unwrap_or(0);
        let low = scale(params.price_min.min(params.price_max));
        let high = scale(params.price_max.max(params.price_min));
        Self {
            rng: StdRng::seed_from_u64(params.seed),
            low,
            high,
        }
    }

    fn price(&mut self) -> Decimal {
        let milli = if self.high > self.low {
            self.rng.gen_range(self.low..self.high)
        } else {
            self.low
        };
        Decimal::new(milli, 3)
    }

    fn size(&mut self, low: i64, high: i64) -> Decimal {
        Decimal::from(self.rng.gen_range(low..high))
    }
}

/// Generate bars starting at `start`, followed by ticks.
///
/// The same parameters always produce the same series. Each bar opens at the
/// previous close, carries a spread of `max(2, i mod 10)` per mille and spans
/// two extra random excursions. Ticks step by a fifth of the bar width.
pub fn generate(params: &SyntheticParams, start: DateTime<Utc>) -> SyntheticSeries {
    let width = params.timeframe.bucket_width();
    let mut sampler = PriceSampler::new(params);
    let mut bars = Vec::with_capacity(params.bars);

    let mut last_bid = sampler.price();
    let mut timestamp = start;
    for i in 0..params.bars {
        let spread = Decimal::new((i as i64 % 10).max(2), 3);
        let close_bid = sampler.price();
        let excursion_a = sampler.price();
        let excursion_b = sampler.price();
        let open_ask = last_bid + last_bid * spread;
        let close_ask = close_bid + close_bid * spread;
        let far_high = excursion_a.max(excursion_b);
        let far_low = excursion_a.min(excursion_b);

        bars.push(Bar {
            timestamp,
            open_bid: last_bid,
            open_ask,
            high_bid: close_bid.max(last_bid).max(far_high),
            high_ask: close_ask.max(open_ask).max(far_high),
            low_bid: close_bid.min(last_bid).min(far_low),
            low_ask: close_ask.min(open_ask).min(far_low),
            close_bid,
            close_ask,
            volume_bid: sampler.size(10_000, 200_000),
            volume_ask: sampler.size(10_000, 200_000),
        });

        last_bid = close_bid;
        timestamp += width;
    }

    let step = width / 5;
    let mut tick_time = bars.last().map(|b| b.timestamp).unwrap_or(start) + step;
    let mut ticks = Vec::with_capacity(params.ticks);
    for _ in 0..params.ticks {
        let (a, b) = (sampler.price(), sampler.price());
        let bid_size = sampler.size(1_000, 20_000);
        let ask_size = sampler.size(1_000, 20_000);

        let depth = (1..=params.depth_levels)
            .map(|level| {
                let (la, lb) = (sampler.price(), sampler.price());
                let divisor = Decimal::from(level);
                DepthLevel {
                    level,
                    bid_price: la.min(lb),
                    bid_size: (bid_size / divisor).trunc() + Decimal::ONE,
                    ask_price: la.max(lb),
                    ask_size: (ask_size / divisor).trunc() + Decimal::ONE,
                }
            })
            .collect();

        ticks.push(
            Tick::new(tick_time, a.min(b), a.max(b))
                .with_sizes(bid_size, ask_size)
                .with_depth(depth),
        );
        tick_time += step;
    }

    SyntheticSeries {
        key: params.series_key(),
        bars,
        ticks,
    }
}
