//! Contracts between the strategy and the execution venue.

use rust_decimal::Decimal;

use crate::error::GatewayError;
use crate::models::{Bar, ClosedPosition, Direction, Position, PositionId, Quote};

/// A market order to open a new position.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub direction: Direction,
    pub symbol: String,
    pub volume: u64,
    pub label: String,
    /// Stop-loss distance in pips from the fill price
    pub stop_loss_pips: Option<u32>,
    /// Take-profit distance in pips from the fill price
    pub take_profit_pips: Option<u32>,
}

/// Order entry on the venue.
///
/// Calls acknowledge the request immediately. Fills and closes are
/// reported later as [`VenueEvent`]s.
pub trait ExecutionGateway {
    /// Submit a market order; returns the id the venue assigned.
    fn open_market_order(&mut self, request: &OrderRequest) -> Result<PositionId, GatewayError>;

    /// Replace the protective levels of an open position.
    fn modify_position(
        &mut self,
        id: PositionId,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> Result<(), GatewayError>;

    /// Close an open position at market.
    fn close_position(&mut self, id: PositionId) -> Result<(), GatewayError>;
}

/// Read-only account information.
pub trait AccountState {
    fn balance(&self) -> Decimal;
}

/// Position lifecycle notifications from the venue.
#[derive(Debug, Clone)]
pub enum VenueEvent {
    PositionOpened(Position),
    /// Profit refresh or confirmed protective level change
    PositionUpdated(Position),
    PositionClosed(ClosedPosition),
}

/// Price notifications from the market data feed.
#[derive(Debug, Clone, Copy)]
pub enum MarketEvent {
    Tick(Quote),
    BarClose(Bar),
}
