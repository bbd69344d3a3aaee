//! Trading logic: crossover entries, martingale re-entry, trailing stops,
//! risk closures and the controller that coordinates them.

mod config;
mod controller;
mod gateway;
mod ledger;
mod martingale;
mod risk;
mod signal;
mod trailing;

#[cfg(test)]
pub(crate) mod testing;

pub use config::StrategyConfig;
pub use controller::{ControllerStats, StrategyController};
pub use gateway::{AccountState, ExecutionGateway, MarketEvent, OrderRequest, VenueEvent};
