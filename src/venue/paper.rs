//! Paper trading venue: fills market orders at the touch, enforces margin,
//! triggers stop-loss/take-profit levels and reports lifecycle events.

use std::collections::{BTreeMap, VecDeque};

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GatewayError;
use crate::models::{ClosedPosition, Direction, Position, PositionId, Quote};
use crate::trading::{AccountState, ExecutionGateway, OrderRequest, VenueEvent};

/// Paper trading configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    /// Starting account balance
    pub initial_balance: Decimal,

    /// Instrument quoted by the venue
    pub symbol: String,

    /// Price increment one pip represents
    pub pip_size: Decimal,

    /// First mid price of the synthetic feed
    pub start_price: Decimal,

    /// Bid/ask spread in pips
    pub spread_pips: u32,

    /// Largest per-tick move in pips
    pub max_step_pips: u32,

    /// Ticks aggregated into one bar
    pub ticks_per_bar: usize,

    /// Margin required per unit of notional (0.01 = 1:100 leverage)
    pub margin_rate: Decimal,

    /// Seed for the price path and the strategy's random source
    pub seed: u64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_balance: dec!(10000),
            symbol: "EURUSD".to_string(),
            pip_size: dec!(0.0001),
            start_price: dec!(1.1000),
            spread_pips: 1,
            max_step_pips: 2,
            ticks_per_bar: 30,
            margin_rate: dec!(0.01),
            seed: 42,
        }
    }
}

/// In-memory venue implementing the gateway and account contracts.
pub struct PaperVenue {
    config: PaperConfig,
    balance: Decimal,
    positions: BTreeMap<PositionId, Position>,
    next_id: u64,
    quote: Quote,
    events: VecDeque<VenueEvent>,
    closed: Vec<ClosedPosition>,
}

impl PaperVenue {
    /// New venue quoting `start_price` with the configured spread.
    pub fn new(config: PaperConfig) -> Self {
        let half_spread = config.pip_size * Decimal::from(config.spread_pips) / Decimal::TWO;
        let quote = Quote::new(
            config.start_price - half_spread,
            config.start_price + half_spread,
            Utc::now(),
        );

        Self {
            balance: config.initial_balance,
            positions: BTreeMap::new(),
            next_id: 0,
            quote,
            events: VecDeque::new(),
            closed: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &PaperConfig {
        &self.config
    }

    /// Open positions, e.g. those present before a strategy starts.
    pub fn positions(&self) -> Vec<Position> {
        self.positions.values().cloned().collect()
    }

    /// Last quote applied to the venue.
    pub fn quote(&self) -> Quote {
        self.quote
    }

    pub fn closed_positions(&self) -> &[ClosedPosition] {
        &self.closed
    }

    /// Balance plus unrealized gross profit.
    pub fn equity(&self) -> Decimal {
        self.balance + self.positions.values().map(|p| p.gross_profit).sum::<Decimal>()
    }

    /// Next pending lifecycle event, oldest first.
    pub fn next_event(&mut self) -> Option<VenueEvent> {
        self.events.pop_front()
    }

    /// Apply a new quote: trigger protective levels, then refresh profits.
    pub fn on_tick(&mut self, quote: Quote) {
        self.quote = quote;

        let mut triggered = Vec::new();
        for position in self.positions.values_mut() {
            match triggered_exit(position, &quote) {
                Some(level) => triggered.push((position.id, level)),
                None => {
                    position.gross_profit = position.profit_at(position.exit_price(quote.bid, quote.ask));
                    self.events.push_back(VenueEvent::PositionUpdated(position.clone()));
                }
            }
        }

        for (id, level) in triggered {
            self.realize(id, level);
        }
    }

    fn realize(&mut self, id: PositionId, exit_price: Decimal) {
        let Some(mut position) = self.positions.remove(&id) else {
            return;
        };

        let gross_profit = position.profit_at(exit_price);
        position.gross_profit = gross_profit;
        self.balance += gross_profit;

        debug!(position = %id, exit = %exit_price, gross_profit = %gross_profit, "Paper position closed");

        let closed = ClosedPosition {
            position,
            exit_price,
            gross_profit,
            closed_at: self.quote.time,
        };
        self.closed.push(closed.clone());
        self.events.push_back(VenueEvent::PositionClosed(closed));
    }

    fn used_margin(&self) -> Decimal {
        self.positions
            .values()
            .map(|p| Decimal::from(p.volume) * p.entry_price * self.config.margin_rate)
            .sum()
    }

    fn pips(&self, pips: u32) -> Decimal {
        self.config.pip_size * Decimal::from(pips)
    }
}

/// Protective level hit by the quote, if any. Stops take precedence.
fn triggered_exit(position: &Position, quote: &Quote) -> Option<Decimal> {
    match position.direction {
        Direction::Buy => {
            if let Some(stop) = position.stop_loss.filter(|s| quote.bid <= *s) {
                return Some(stop);
            }
            position.take_profit.filter(|t| quote.bid >= *t)
        }
        Direction::Sell => {
            if let Some(stop) = position.stop_loss.filter(|s| quote.ask >= *s) {
                return Some(stop);
            }
            position.take_profit.filter(|t| quote.ask <= *t)
        }
    }
}

impl ExecutionGateway for PaperVenue {
    fn open_market_order(&mut self, request: &OrderRequest) -> Result<PositionId, GatewayError> {
        let quote = self.quote;
        if quote.bid <= Decimal::ZERO || quote.ask < quote.bid {
            return Err(GatewayError::Venue(format!("no valid price ({} / {})", quote.bid, quote.ask)));
        }

        if request.symbol != self.config.symbol {
            return Err(GatewayError::Rejected(format!("unknown symbol {}", request.symbol)));
        }
        if request.volume == 0 {
            return Err(GatewayError::Rejected("volume must be positive".to_string()));
        }

        let entry_price = match request.direction {
            Direction::Buy => quote.ask,
            Direction::Sell => quote.bid,
        };

        let required = Decimal::from(request.volume) * entry_price * self.config.margin_rate;
        let free_margin = self.equity() - self.used_margin();
        if required > free_margin {
            return Err(GatewayError::InsufficientFunds);
        }

        let sign = match request.direction {
            Direction::Buy => Decimal::ONE,
            Direction::Sell => Decimal::NEGATIVE_ONE,
        };
        let stop_loss = request.stop_loss_pips.map(|p| entry_price - sign * self.pips(p));
        let take_profit = request.take_profit_pips.map(|p| entry_price + sign * self.pips(p));

        self.next_id += 1;
        let id = PositionId(self.next_id);
        let mut position = Position::new(
            id,
            request.symbol.clone(),
            request.direction,
            entry_price,
            request.volume,
            request.label.clone(),
        )
        .with_protection(stop_loss, take_profit);
        position.opened_at = quote.time;

        self.positions.insert(id, position.clone());
        self.events.push_back(VenueEvent::PositionOpened(position));
        Ok(id)
    }

    fn modify_position(
        &mut self,
        id: PositionId,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> Result<(), GatewayError> {
        let quote = self.quote;
        let position = self
            .positions
            .get_mut(&id)
            .ok_or(GatewayError::UnknownPosition(id))?;

        let exit = position.exit_price(quote.bid, quote.ask);
        let (stop_ok, take_ok) = match position.direction {
            Direction::Buy => (
                stop_loss.map_or(true, |s| s < exit),
                take_profit.map_or(true, |t| t > exit),
            ),
            Direction::Sell => (
                stop_loss.map_or(true, |s| s > exit),
                take_profit.map_or(true, |t| t < exit),
            ),
        };
        if !stop_ok {
            return Err(GatewayError::Rejected(format!("invalid stop loss {:?}", stop_loss)));
        }
        if !take_ok {
            return Err(GatewayError::Rejected(format!("invalid take profit {:?}", take_profit)));
        }

        position.stop_loss = stop_loss;
        position.take_profit = take_profit;
        self.events.push_back(VenueEvent::PositionUpdated(position.clone()));
        Ok(())
    }

    fn close_position(&mut self, id: PositionId) -> Result<(), GatewayError> {
        let position = self.positions.get(&id).ok_or(GatewayError::UnknownPosition(id))?;
        let exit_price = position.exit_price(self.quote.bid, self.quote.ask);
        self.realize(id, exit_price);
        Ok(())
    }
}

impl AccountState for PaperVenue {
    fn balance(&self) -> Decimal {
        self.balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn venue() -> PaperVenue {
        let mut venue = PaperVenue::new(PaperConfig::default());
        venue.on_tick(Quote::new(dec!(1.1000), dec!(1.1002), Utc::now()));
        venue
    }

    fn order(direction: Direction, volume: u64) -> OrderRequest {
        OrderRequest {
            direction,
            symbol: "EURUSD".to_string(),
            volume,
            label: "FasFox".to_string(),
            stop_loss_pips: Some(40),
            take_profit_pips: Some(40),
        }
    }

    fn drain(venue: &mut PaperVenue) -> Vec<VenueEvent> {
        std::iter::from_fn(|| venue.next_event()).collect()
    }

    #[test]
    fn test_buy_fills_at_ask_with_levels() {
        let mut venue = venue();
        let id = venue.open_market_order(&order(Direction::Buy, 10_000)).unwrap();

        let events = drain(&mut venue);
        let VenueEvent::PositionOpened(position) = &events[0] else {
            panic!("expected open event, got {:?}", events);
        };
        assert_eq!(position.id, id);
        assert_eq!(position.entry_price, dec!(1.1002));
        assert_eq!(position.stop_loss, Some(dec!(1.0962)));
        assert_eq!(position.take_profit, Some(dec!(1.1042)));
    }

    #[test]
    fn test_margin_exhaustion_reports_insufficient_funds() {
        let mut venue = venue();
        // 10_000_000 * 1.1 * 0.01 = 110_000 > 10_000 balance
        let result = venue.open_market_order(&order(Direction::Sell, 10_000_000));
        assert_eq!(result, Err(GatewayError::InsufficientFunds));
    }

    #[test]
    fn test_stop_loss_closes_at_level() {
        let mut venue = venue();
        venue.open_market_order(&order(Direction::Sell, 10_000)).unwrap();
        drain(&mut venue);

        // Sell at 1.1000, stop at 1.1040
        venue.on_tick(Quote::new(dec!(1.1040), dec!(1.1042), Utc::now()));

        let events = drain(&mut venue);
        let VenueEvent::PositionClosed(closed) = &events[0] else {
            panic!("expected close event, got {:?}", events);
        };
        assert_eq!(closed.exit_price, dec!(1.1040));
        assert_eq!(closed.gross_profit, dec!(-40));
        assert_eq!(venue.balance(), dec!(9960));
        assert!(venue.positions().is_empty());
    }

    #[test]
    fn test_tick_refreshes_gross_profit() {
        let mut venue = venue();
        venue.open_market_order(&order(Direction::Buy, 10_000)).unwrap();
        drain(&mut venue);

        venue.on_tick(Quote::new(dec!(1.1012), dec!(1.1014), Utc::now()));

        let events = drain(&mut venue);
        let VenueEvent::PositionUpdated(position) = &events[0] else {
            panic!("expected update event, got {:?}", events);
        };
        assert_eq!(position.gross_profit, dec!(10));
        assert_eq!(venue.equity(), dec!(10010));
    }

    #[test]
    fn test_modify_validates_levels() {
        let mut venue = venue();
        let id = venue.open_market_order(&order(Direction::Buy, 10_000)).unwrap();

        // Stop above the bid is invalid for a long
        let rejected = venue.modify_position(id, Some(dec!(1.1005)), None);
        assert!(matches!(rejected, Err(GatewayError::Rejected(_))));

        assert!(venue.modify_position(id, Some(dec!(1.0990)), Some(dec!(1.1042))).is_ok());
        assert_eq!(venue.positions()[0].stop_loss, Some(dec!(1.0990)));

        let unknown = venue.modify_position(PositionId(99), None, None);
        assert_eq!(unknown, Err(GatewayError::UnknownPosition(PositionId(99))));
    }

    #[test]
    fn test_close_twice_reports_unknown() {
        let mut venue = venue();
        let id = venue.open_market_order(&order(Direction::Buy, 10_000)).unwrap();

        assert!(venue.close_position(id).is_ok());
        assert_eq!(venue.close_position(id), Err(GatewayError::UnknownPosition(id)));
        // Bought at the ask, sold at the bid: lose the spread
        assert_eq!(venue.closed_positions()[0].gross_profit, dec!(-2));
        assert_eq!(venue.balance(), dec!(9998));
    }

    #[test]
    fn test_new_venue_quotes_start_price() {
        let mut venue = PaperVenue::new(PaperConfig::default());
        venue.open_market_order(&order(Direction::Sell, 10_000)).unwrap();

        // One pip spread around 1.1000
        assert_eq!(venue.positions()[0].entry_price, dec!(1.09995));
    }

    #[test]
    fn test_foreign_symbol_is_rejected() {
        let mut venue = venue();
        let mut request = order(Direction::Buy, 10_000);
        request.symbol = "GBPUSD".to_string();
        assert!(matches!(venue.open_market_order(&request), Err(GatewayError::Rejected(_))));
    }
}
