//! Data models for positions, closed trades and market prices.

mod market;
mod position;
mod trade;

pub use market::{Bar, PriceSource, Quote};
pub use position::{Position, PositionId};
pub use trade::{ClosedPosition, Direction};
