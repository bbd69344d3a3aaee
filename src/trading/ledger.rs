//! In-memory book of the strategy's open positions.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::models::{Direction, Position, PositionId};

/// Open positions keyed by venue id.
///
/// Ordered by id so iteration (and therefore the order of gateway requests)
/// is deterministic.
#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
    positions: BTreeMap<PositionId, Position>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a position. Applying the same snapshot twice is a no-op.
    pub fn upsert(&mut self, position: Position) {
        self.positions.insert(position.id, position);
    }

    /// Remove a position; unknown ids are ignored.
    pub fn remove(&mut self, id: PositionId) -> Option<Position> {
        self.positions.remove(&id)
    }

    pub fn get(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(&id)
    }

    /// Record protective levels the venue accepted.
    pub fn update_protection(
        &mut self,
        id: PositionId,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> bool {
        match self.positions.get_mut(&id) {
            Some(position) => {
                position.stop_loss = stop_loss;
                position.take_profit = take_profit;
                true
            }
            None => false,
        }
    }

    /// Apply a venue refresh to a known position.
    ///
    /// Profit is taken from the refresh. The stop only ever tightens and a
    /// recorded level is never cleared. Unknown ids are ignored.
    pub fn merge_update(&mut self, update: Position) -> bool {
        let Some(known) = self.positions.get_mut(&update.id) else {
            return false;
        };

        known.gross_profit = update.gross_profit;
        known.stop_loss = match (known.stop_loss, update.stop_loss) {
            (Some(current), Some(reported)) => Some(match known.direction {
                Direction::Buy => current.max(reported),
                Direction::Sell => current.min(reported),
            }),
            (current, reported) => current.or(reported),
        };
        known.take_profit = known.take_profit.or(update.take_profit);
        true
    }

    pub fn all(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn find_by_label<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a Position> + 'a {
        self.positions.values().filter(move |p| p.label == label)
    }

    pub fn find_by_label_direction<'a>(
        &'a self,
        label: &'a str,
        direction: Direction,
    ) -> impl Iterator<Item = &'a Position> + 'a {
        self.find_by_label(label).filter(move |p| p.direction == direction)
    }

    /// Positions with the label on one instrument, cloned as a snapshot.
    pub fn snapshot(&self, label: &str, symbol: &str) -> Vec<Position> {
        self.positions
            .values()
            .filter(|p| p.is_owned_by(label, symbol))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
