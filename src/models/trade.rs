//! Trade direction and the record a venue emits when a position closes.

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Position;

/// Direction of a position or order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }

    /// The other side of the book.
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }

    /// Pick a direction uniformly at random.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen_bool(0.5) {
            Direction::Buy
        } else {
            Direction::Sell
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A position as it looked at the moment the venue closed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedPosition {
    /// Snapshot of the position, including its final protective levels
    pub position: Position,

    /// Price the position was closed at
    pub exit_price: Decimal,

    /// Realized gross profit; the win/loss discriminator
    pub gross_profit: Decimal,

    /// When the venue closed the position
    pub closed_at: DateTime<Utc>,
}

impl ClosedPosition {
    /// A close with strictly positive gross profit counts as a win.
    pub fn is_win(&self) -> bool {
        self.gross_profit > Decimal::ZERO
    }
}
