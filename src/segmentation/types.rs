//! Segmentation modes

use crate::market::PricePoint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which intrabar path the trigger bar is replayed along
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriceMode {
    Open,
    High,
    Low,
    /// Bar as supplied
    #[default]
    Close,
    /// Open, high, low, close
    Ohlc,
    /// Open, low, high, close
    Olhc,
}

impl PriceMode {
    pub const ALL: [PriceMode; 6] = [
        PriceMode::Open,
        PriceMode::High,
        PriceMode::Low,
        PriceMode::Close,
        PriceMode::Ohlc,
        PriceMode::Olhc,
    ];

    /// Price points visited by this mode, in detection order
    pub fn passes(&self) -> &'static [PricePoint] {
        use PricePoint::*;
        match self {
            PriceMode::Open => &[Open],
            PriceMode::High => &[High],
            PriceMode::Low => &[Low],
            PriceMode::Close => &[Close],
            PriceMode::Ohlc => &[Open, High, Low, Close],
            PriceMode::Olhc => &[Open, Low, High, Close],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceMode::Open => "OPEN",
            PriceMode::High => "HIGH",
            PriceMode::Low => "LOW",
            PriceMode::Close => "CLOSE",
            PriceMode::Ohlc => "OHLC",
            PriceMode::Olhc => "OLHC",
        }
    }
}

impl fmt::Display for PriceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PriceMode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown price mode '{}'", s))
    }
}
