//! Paper trading session: feeds market events to the venue and the
//! strategy, then delivers venue lifecycle events back one at a time.

use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use crate::metrics::{MetricsCalculator, PerformanceMetrics};
use crate::trading::{AccountState, ControllerStats, MarketEvent, StrategyController, VenueEvent};
use crate::venue::PaperVenue;

/// Final state of a session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub metrics: PerformanceMetrics,
    pub stats: ControllerStats,
    pub equity: Decimal,
    pub open_positions: usize,
    pub bars: u64,
    pub ticks: u64,
    pub halted: bool,
}

impl std::fmt::Display for SessionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let return_pct = if self.metrics.initial_balance > Decimal::ZERO {
            (self.equity - self.metrics.initial_balance) / self.metrics.initial_balance * dec!(100)
        } else {
            Decimal::ZERO
        };

        writeln!(f, "\n{:=^50}", " FASFOX SESSION ")?;
        writeln!(f, "Bars: {}  Ticks: {}", self.bars, self.ticks)?;
        writeln!(f, "Equity:        {:.2} ({:.2}%)", self.equity, return_pct)?;
        writeln!(f, "Open Positions: {}", self.open_positions)?;
        writeln!(f, "Halted:        {}", if self.halted { "Yes" } else { "No" })?;
        writeln!(f)?;
        write!(f, "{}", self.metrics)?;
        writeln!(f)?;
        writeln!(f, "--- Requests ---")?;
        writeln!(f, "Orders:        {}", self.stats.orders_opened)?;
        writeln!(f, "Modifications: {}", self.stats.modifications)?;
        writeln!(f, "Closures:      {}", self.stats.closures)?;
        writeln!(f, "Rejections:    {}", self.stats.rejections)?;
        writeln!(f, "Suppressed:    {}", self.stats.suppressed_entries)?;
        writeln!(f, "{:=^50}", "")?;
        Ok(())
    }
}

/// Strategy controller bound to a paper venue.
pub struct Session<R> {
    controller: StrategyController<R>,
    venue: PaperVenue,
    bars: u64,
    ticks: u64,
}

impl<R: Rng> Session<R> {
    pub fn new(controller: StrategyController<R>, venue: PaperVenue) -> Self {
        Self {
            controller,
            venue,
            bars: 0,
            ticks: 0,
        }
    }

    #[cfg(test)]
    pub fn controller(&self) -> &StrategyController<R> {
        &self.controller
    }

    #[cfg(test)]
    pub fn venue(&self) -> &PaperVenue {
        &self.venue
    }

    pub fn is_halted(&self) -> bool {
        self.controller.is_halted()
    }

    /// Hand the venue's open positions to the strategy.
    pub fn start(&mut self) {
        let existing = self.venue.positions();
        self.controller.start(&existing, &mut self.venue);
        self.drain();
    }

    /// Process one market event to completion, including every venue
    /// event it causes.
    pub fn process(&mut self, event: MarketEvent) {
        match event {
            MarketEvent::Tick(quote) => {
                self.ticks += 1;
                self.venue.on_tick(quote);
                self.drain();
                self.controller.handle_tick(quote, &mut self.venue);
            }
            MarketEvent::BarClose(bar) => {
                self.bars += 1;
                self.controller.handle_bar_close(&bar, &mut self.venue);
            }
        }
        self.drain();
    }

    fn drain(&mut self) {
        while let Some(event) = self.venue.next_event() {
            match event {
                VenueEvent::PositionOpened(position) => self.controller.handle_position_opened(position),
                VenueEvent::PositionUpdated(position) => self.controller.handle_position_updated(position),
                VenueEvent::PositionClosed(closed) => {
                    self.controller.handle_position_closed(closed, &mut self.venue)
                }
            }
        }
    }

    pub fn report(&self) -> SessionReport {
        let pnls: Vec<Decimal> = self
            .venue
            .closed_positions()
            .iter()
            .map(|c| c.gross_profit)
            .collect();

        SessionReport {
            metrics: MetricsCalculator::calculate(self.venue.config().initial_balance, &pnls),
            stats: self.controller.stats().clone(),
            equity: self.venue.equity(),
            open_positions: self.venue.positions().len(),
            bars: self.bars,
            ticks: self.ticks,
            halted: self.controller.is_halted(),
        }
    }

    /// Log a one-line progress summary.
    pub fn log_progress(&self) {
        info!(
            symbol = %self.controller.config().symbol,
            bars = self.bars,
            price = %self.venue.quote().mid(),
            balance = %self.venue.balance(),
            equity = %self.venue.equity(),
            managed = self.controller.ledger().len(),
            closed = self.venue.closed_positions().len(),
            "Session progress"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::models::{Bar, Direction, Quote};
    use crate::trading::{ExecutionGateway, OrderRequest, StrategyConfig};
    use crate::venue::{PaperConfig, RandomWalkFeed};

    fn strategy() -> StrategyConfig {
        StrategyConfig {
            fast_periods: 2,
            slow_periods: 3,
            initial_volume: 10_000,
            volume: 10_000,
            ..StrategyConfig::default()
        }
    }

    fn session(strategy: StrategyConfig, paper: PaperConfig) -> Session<StdRng> {
        let controller = StrategyController::new(strategy, StdRng::seed_from_u64(paper.seed));
        Session::new(controller, PaperVenue::new(paper))
    }

    fn tick(session: &mut Session<StdRng>, bid: Decimal) {
        session.process(MarketEvent::Tick(Quote::new(bid, bid + dec!(0.0002), Utc::now())));
    }

    fn bar(session: &mut Session<StdRng>, close: Decimal) {
        let mut bar = Bar::open_at(close, Utc::now());
        bar.update(close);
        session.process(MarketEvent::BarClose(bar));
    }

    #[test]
    fn test_crossover_opens_protected_position() {
        let mut session = session(strategy(), PaperConfig::default());
        session.start();
        tick(&mut session, dec!(1.1000));

        for close in [dec!(1.1000), dec!(1.1000), dec!(1.0990), dec!(1.0980), dec!(1.1010)] {
            bar(&mut session, close);
        }

        let positions = session.venue().positions();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].direction, Direction::Buy);
        assert_eq!(positions[0].stop_loss, Some(dec!(1.0962)));
        assert_eq!(session.controller().ledger().len(), 1);
    }

    #[test]
    fn test_stop_out_triggers_martingale_reentry() {
        let mut session = session(strategy(), PaperConfig::default());
        session.start();
        tick(&mut session, dec!(1.1000));
        for close in [dec!(1.1000), dec!(1.1000), dec!(1.0990), dec!(1.0980), dec!(1.1010)] {
            bar(&mut session, close);
        }

        // Long from 1.1002 with stop at 1.0962
        tick(&mut session, dec!(1.0950));

        let closed = session.venue().closed_positions();
        assert_eq!(closed.len(), 1);
        assert!(closed[0].gross_profit < Decimal::ZERO);

        // Loss re-enters in the same direction with the same volume
        let positions = session.venue().positions();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].direction, Direction::Buy);
        assert_eq!(positions[0].volume, 10_000);
        assert_eq!(session.controller().ledger().len(), 1);
    }

    #[test]
    fn test_trailing_stop_reaches_venue() {
        let mut session = session(strategy(), PaperConfig::default());
        session.start();
        tick(&mut session, dec!(1.1000));
        for close in [dec!(1.1000), dec!(1.1000), dec!(1.0990), dec!(1.0980), dec!(1.1010)] {
            bar(&mut session, close);
        }

        // Entry 1.1002; bid 1.1020 is 18 pips up, stop trails 10 pips behind
        tick(&mut session, dec!(1.1020));

        let positions = session.venue().positions();
        assert_eq!(positions[0].stop_loss, Some(dec!(1.1010)));
        let managed: Vec<_> = session.controller().ledger().all().collect();
        assert_eq!(managed[0].stop_loss, Some(dec!(1.1010)));
    }

    #[test]
    fn test_insufficient_funds_halts_session() {
        let paper = PaperConfig {
            initial_balance: dec!(50),
            ..PaperConfig::default()
        };
        let strategy = StrategyConfig {
            // 100_000 * 1.1 * 0.01 = 1100 margin against a 50 balance
            volume: 100_000,
            ..strategy()
        };
        let mut session = session(strategy, paper);
        session.start();
        tick(&mut session, dec!(1.1000));
        for close in [dec!(1.1000), dec!(1.1000), dec!(1.0990), dec!(1.0980), dec!(1.1010)] {
            bar(&mut session, close);
        }

        assert!(session.is_halted());
        assert!(session.venue().positions().is_empty());
        assert!(session.report().halted);
    }

    #[test]
    fn test_existing_position_is_hedged_on_start() {
        let paper = PaperConfig::default();
        let mut venue = PaperVenue::new(paper.clone());
        venue.on_tick(Quote::new(dec!(1.1000), dec!(1.1002), Utc::now()));
        venue
            .open_market_order(&OrderRequest {
                direction: Direction::Sell,
                symbol: "EURUSD".to_string(),
                volume: 5_000,
                label: "Manual".to_string(),
                stop_loss_pips: None,
                take_profit_pips: None,
            })
            .unwrap();
        while venue.next_event().is_some() {}

        let controller = StrategyController::new(strategy(), StdRng::seed_from_u64(paper.seed));
        let mut session = Session::new(controller, venue);
        session.start();

        let positions = session.venue().positions();
        assert_eq!(positions.len(), 2);
        let hedge = &positions[1];
        assert_eq!(hedge.direction, Direction::Buy);
        assert_eq!(hedge.label, "FasFox");
        assert_eq!(hedge.volume, 10_000);
        assert_eq!(hedge.stop_loss, None);
        // Only the hedge is managed
        assert_eq!(session.controller().ledger().len(), 1);
    }

    #[test]
    fn test_random_walk_run_is_consistent() {
        let paper = PaperConfig {
            seed: 9,
            ticks_per_bar: 10,
            ..PaperConfig::default()
        };
        let mut feed = RandomWalkFeed::new(&paper);
        let mut session = session(strategy(), paper);
        session.start();

        for _ in 0..3_000 {
            for event in feed.next_events() {
                session.process(event);
            }
        }

        let report = session.report();
        assert_eq!(report.bars, 300);
        assert_eq!(report.ticks, 3_000);
        assert_eq!(report.metrics.total_trades as usize, session.venue().closed_positions().len());
        assert_eq!(report.open_positions, session.controller().ledger().len());
        assert_eq!(report.metrics.final_balance, session.venue().balance());
        assert!(!report.to_string().is_empty());
    }
}
