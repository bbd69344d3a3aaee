//! Martingale re-entry after a managed position closes.
//!
//! A win resets to the initial volume in a random direction. A loss
//! re-enters in the same direction with the closed volume times the loss
//! multiplier. The robot this strategy is modelled on documents doubling
//! but multiplies by one, so the multiplier defaults to 1.

use rand::Rng;

use crate::models::{ClosedPosition, Direction};

/// Why a re-entry was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReentryReason {
    /// Previous position closed in profit
    Reset,
    /// Previous position closed flat or at a loss
    Recover,
}

/// The order the martingale wants next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reentry {
    pub direction: Direction,
    pub volume: u64,
    pub reason: ReentryReason,
}

/// Volume and direction policy for re-entries.
#[derive(Debug, Clone)]
pub struct MartingaleController {
    initial_volume: u64,
    loss_volume_multiplier: u64,
}

impl MartingaleController {
    pub fn new(initial_volume: u64, loss_volume_multiplier: u64) -> Self {
        Self {
            initial_volume,
            loss_volume_multiplier,
        }
    }

    /// Decide the next order from the close event payload.
    pub fn next_order<R: Rng + ?Sized>(&self, closed: &ClosedPosition, rng: &mut R) -> Reentry {
        if closed.is_win() {
            Reentry {
                direction: Direction::random(rng),
                volume: self.initial_volume,
                reason: ReentryReason::Reset,
            }
        } else {
            Reentry {
                direction: closed.position.direction,
                volume: closed.position.volume.saturating_mul(self.loss_volume_multiplier),
                reason: ReentryReason::Recover,
            }
        }
    }
}
