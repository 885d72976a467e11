use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Side of a submitted trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl TradeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeDirection::Buy => "buy",
            TradeDirection::Sell => "sell",
        }
    }

    /// +1 for buys, -1 for sells
    pub fn sign(&self) -> f64 {
        match self {
            TradeDirection::Buy => 1.0,
            TradeDirection::Sell => -1.0,
        }
    }
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(TradeDirection::Buy),
            "sell" => Ok(TradeDirection::Sell),
            _ => anyhow::bail!("Invalid trade direction: {}. Must be 'buy' or 'sell'", s),
        }
    }
}

/// OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Price-scale description of a tradable symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    pub symbol: String,
    pub point: f64,
    pub digits: u32,
}

impl InstrumentSpec {
    pub fn new(symbol: impl Into<String>, point: f64, digits: u32) -> Self {
        Self {
            symbol: symbol.into(),
            point,
            digits,
        }
    }

    /// One pip. Fractional-pip quotes (3 or 5 digits) use ten points per pip.
    pub fn pip_size(&self) -> f64 {
        if self.digits == 3 || self.digits == 5 {
            self.point * 10.0
        } else {
            self.point
        }
    }

    /// Signed pip distance of a move from `entry` to `exit` for a trade in `direction`.
    pub fn pips_between(&self, direction: TradeDirection, entry: f64, exit: f64) -> f64 {
        let pip = self.pip_size();
        if pip <= 0.0 || !pip.is_finite() {
            return 0.0;
        }
        (exit - entry) * direction.sign() / pip
    }
}
