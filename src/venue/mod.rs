//! Simulated execution venue and market data feed for paper trading.

mod feed;
mod paper;

pub use feed::RandomWalkFeed;
pub use paper::{PaperConfig, PaperVenue};
