//! Market price models: top-of-book quotes and closed bars.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// A single price update (tick).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: Decimal,
    pub ask: Decimal,
    pub time: DateTime<Utc>,
}

impl Quote {
    pub fn new(bid: Decimal, ask: Decimal, time: DateTime<Utc>) -> Self {
        Self { bid, ask, time }
    }

    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / dec!(2)
    }
}

/// A closed OHLC bar built from bid prices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Number of ticks aggregated into the bar
    pub tick_volume: u64,
    /// Open time of the bar
    pub time: DateTime<Utc>,
}

impl Bar {
    /// Start a new bar from its first price.
    pub fn open_at(price: Decimal, time: DateTime<Utc>) -> Self {
        Self {
            open: price,
            high: price,
            low: price,
            close: price,
            tick_volume: 1,
            time,
        }
    }

    /// Fold another price into the bar.
    pub fn update(&mut self, price: Decimal) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.tick_volume += 1;
    }
}

/// Which bar price feeds the moving averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Open,
    High,
    Low,
    #[default]
    Close,
    /// (high + low) / 2
    Median,
    /// (high + low + close) / 3
    Typical,
}

impl PriceSource {
    pub fn of(&self, bar: &Bar) -> Decimal {
        match self {
            PriceSource::Open => bar.open,
            PriceSource::High => bar.high,
            PriceSource::Low => bar.low,
            PriceSource::Close => bar.close,
            PriceSource::Median => (bar.high + bar.low) / dec!(2),
            PriceSource::Typical => (bar.high + bar.low + bar.close) / dec!(3),
        }
    }
}
