//! Bar-level risk rules: entry gate and forced closures.

use rust_decimal::Decimal;

use crate::models::{Position, PositionId};

/// Why a position is being force-closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Account balance fell below the configured minimum
    MinBalance,
    /// The position's gross profit fell below the configured minimum loss
    MinLoss,
}

/// A forced close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Closure {
    pub id: PositionId,
    pub reason: CloseReason,
}

/// Account and per-position loss limits.
#[derive(Debug, Clone)]
pub struct RiskGuard {
    min_balance: Decimal,
    min_loss: Decimal,
    max_positions: usize,
}

impl RiskGuard {
    pub fn new(min_balance: Decimal, min_loss: Decimal, max_positions: usize) -> Self {
        Self {
            min_balance,
            min_loss,
            max_positions,
        }
    }

    /// New signal entries are blocked only while the count exceeds the maximum.
    pub fn allows_entry(&self, open_positions: usize) -> bool {
        open_positions <= self.max_positions
    }

    pub fn balance_breached(&self, balance: Decimal) -> bool {
        balance < self.min_balance
    }

    /// Forced closures for one bar.
    ///
    /// The two rules are independent: a position can appear once for the
    /// balance rule and again for its own loss.
    pub fn closures(&self, balance: Decimal, positions: &[Position]) -> Vec<Closure> {
        let mut closures = Vec::new();

        if self.balance_breached(balance) {
            closures.extend(positions.iter().map(|p| Closure {
                id: p.id,
                reason: CloseReason::MinBalance,
            }));
        }

        closures.extend(
            positions
                .iter()
                .filter(|p| p.gross_profit < self.min_loss)
                .map(|p| Closure {
                    id: p.id,
                    reason: CloseReason::MinLoss,
                }),
        );

        closures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::models::Direction;

    fn guard() -> RiskGuard {
        RiskGuard::new(dec!(5000), dec!(-200), 3)
    }

    fn position(id: u64, gross_profit: Decimal) -> Position {
        let mut pos = Position::new(PositionId(id), "EURUSD", Direction::Buy, dec!(1.1), 10_000, "FasFox");
        pos.gross_profit = gross_profit;
        pos
    }

    #[test]
    fn test_entry_gate() {
        let guard = guard();
        assert!(guard.allows_entry(2));
        assert!(guard.allows_entry(3));
        assert!(!guard.allows_entry(4));
    }

    #[test]
    fn test_low_balance_closes_everything() {
        let positions = vec![position(1, dec!(10)), position(2, dec!(-5))];
        let closures = guard().closures(dec!(4999), &positions);

        assert_eq!(
            closures,
            vec![
                Closure { id: PositionId(1), reason: CloseReason::MinBalance },
                Closure { id: PositionId(2), reason: CloseReason::MinBalance },
            ]
        );
    }

    #[test]
    fn test_single_loser_is_closed() {
        let positions = vec![position(1, dec!(-150)), position(2, dec!(-250)), position(3, dec!(40))];
        let closures = guard().closures(dec!(10000), &positions);

        assert_eq!(closures, vec![Closure { id: PositionId(2), reason: CloseReason::MinLoss }]);
    }

    #[test]
    fn test_loss_threshold_is_strict() {
        let positions = vec![position(1, dec!(-200))];
        assert!(guard().closures(dec!(10000), &positions).is_empty());
    }

    #[test]
    fn test_rules_apply_independently() {
        let positions = vec![position(1, dec!(-300))];
        let closures = guard().closures(dec!(100), &positions);

        assert_eq!(closures.len(), 2);
        assert_eq!(closures[0].reason, CloseReason::MinBalance);
        assert_eq!(closures[1].reason, CloseReason::MinLoss);
    }
}
