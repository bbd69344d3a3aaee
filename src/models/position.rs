//! Position model representing one open trade on the venue.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Direction;

/// Venue-assigned position identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl std::fmt::Display for PositionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An open position.
///
/// Direction, entry price and volume are fixed when the venue opens the
/// position. Only the protective levels change afterwards (through
/// modify requests), plus the venue-maintained gross profit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Identifier assigned by the venue
    pub id: PositionId,

    /// Instrument the position is on
    pub symbol: String,

    /// Buy or sell
    pub direction: Direction,

    /// Fill price at open
    pub entry_price: Decimal,

    /// Size in units
    pub volume: u64,

    /// Absolute stop-loss price, if one is set
    #[serde(default)]
    pub stop_loss: Option<Decimal>,

    /// Absolute take-profit price, if one is set
    #[serde(default)]
    pub take_profit: Option<Decimal>,

    /// Tag identifying which strategy owns the position
    pub label: String,

    /// Gross profit as last reported by the venue
    #[serde(default)]
    pub gross_profit: Decimal,

    /// When the venue opened the position
    #[serde(default = "Utc::now")]
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// Create a freshly opened position with no protective levels.
    pub fn new(
        id: PositionId,
        symbol: impl Into<String>,
        direction: Direction,
        entry_price: Decimal,
        volume: u64,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            direction,
            entry_price,
            volume,
            stop_loss: None,
            take_profit: None,
            label: label.into(),
            gross_profit: Decimal::ZERO,
            opened_at: Utc::now(),
        }
    }

    /// Set protective levels at construction time.
    pub fn with_protection(mut self, stop_loss: Option<Decimal>, take_profit: Option<Decimal>) -> Self {
        self.stop_loss = stop_loss;
        self.take_profit = take_profit;
        self
    }

    /// Whether this position belongs to the given strategy label and instrument.
    pub fn is_owned_by(&self, label: &str, symbol: &str) -> bool {
        self.label == label && self.symbol == symbol
    }

    /// Price at which the position would close right now: bid for longs, ask for shorts.
    pub fn exit_price(&self, bid: Decimal, ask: Decimal) -> Decimal {
        match self.direction {
            Direction::Buy => bid,
            Direction::Sell => ask,
        }
    }

    /// Gross profit if closed at the given exit price.
    pub fn profit_at(&self, exit_price: Decimal) -> Decimal {
        let volume = Decimal::from(self.volume);
        match self.direction {
            Direction::Buy => (exit_price - self.entry_price) * volume,
            Direction::Sell => (self.entry_price - exit_price) * volume,
        }
    }
}
