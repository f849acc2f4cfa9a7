//! Point-in-time market data

use super::{Interval, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 24h ticker statistics for one pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSnapshot {
    pub symbol: Symbol,
    pub last_price: f64,
    pub price_change_percent: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub quote_volume: f64,
}

/// One OHLCV candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// A candle that closed above its open
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// Candles for one symbol and interval, most recent last
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleSet {
    pub symbol: Symbol,
    pub interval: Interval,
    pub candles: Vec<Candle>,
}

impl CandleSet {
    pub fn new(symbol: Symbol, interval: Interval, candles: Vec<Candle>) -> Self {
        Self {
            symbol,
            interval,
            candles,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }
}
