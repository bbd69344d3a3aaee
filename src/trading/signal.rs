//! Moving-average crossover entry signal.

use rust_decimal::Decimal;

use crate::indicators::{MovingAverage, MovingAverageType};
use crate::models::{Bar, Direction, PriceSource};

/// Entry decision for one closed bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    EnterBuy,
    EnterSell,
    NoSignal,
}

impl Signal {
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Signal::EnterBuy => Some(Direction::Buy),
            Signal::EnterSell => Some(Direction::Sell),
            Signal::NoSignal => None,
        }
    }
}

/// Fast and slow average values on one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaPair {
    pub fast: Decimal,
    pub slow: Decimal,
}

/// Classify the transition between two consecutive bars.
///
/// Buy when the slow average was strictly above the fast one and is now at
/// or below it; sell on the mirrored transition.
pub fn evaluate(previous: Option<MaPair>, current: Option<MaPair>) -> Signal {
    let (Some(prev), Some(cur)) = (previous, current) else {
        return Signal::NoSignal;
    };

    if prev.slow > prev.fast && cur.slow <= cur.fast {
        Signal::EnterBuy
    } else if prev.slow < prev.fast && cur.slow >= cur.fast {
        Signal::EnterSell
    } else {
        Signal::NoSignal
    }
}

/// Feeds closed bars into the two averages and evaluates the crossover.
#[derive(Debug, Clone)]
pub struct SignalEvaluator {
    source: PriceSource,
    fast: MovingAverage,
    slow: MovingAverage,
}

impl SignalEvaluator {
    pub fn new(kind: MovingAverageType, source: PriceSource, fast_periods: usize, slow_periods: usize) -> Self {
        Self {
            source,
            fast: MovingAverage::new(kind, fast_periods),
            slow: MovingAverage::new(kind, slow_periods),
        }
    }

    /// Add a closed bar and return the resulting signal.
    pub fn on_bar(&mut self, bar: &Bar) -> Signal {
        let price = self.source.of(bar);
        self.fast.push(price);
        self.slow.push(price);
        evaluate(self.pair_at(1), self.pair_at(0))
    }

    /// Averages `offset` bars back, once both are defined.
    pub fn pair_at(&self, offset: usize) -> Option<MaPair> {
        Some(MaPair {
            fast: self.fast.value_at(offset)?,
            slow: self.slow.value_at(offset)?,
        })
    }
}
