//! Strategy controller: dispatches market and position events to the
//! signal, martingale, trailing-stop and risk components.
//!
//! The controller is a single-threaded state machine. Callers deliver one
//! event at a time; each `handle_*` method applies all of its ledger
//! mutations before returning and never propagates gateway failures.

use std::collections::BTreeSet;

use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::error::GatewayError;
use crate::models::{Bar, ClosedPosition, Direction, Position, PositionId, Quote};

use super::gateway::{AccountState, ExecutionGateway, OrderRequest};
use super::ledger::PositionLedger;
use super::martingale::{MartingaleController, ReentryReason};
use super::risk::{Closure, RiskGuard};
use super::signal::{Signal, SignalEvaluator};
use super::trailing::{protective_levels, StopUpdate, TrailingStopEngine};
use super::StrategyConfig;

/// Counters for requests the controller has issued.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerStats {
    pub orders_opened: u64,
    pub modifications: u64,
    pub closures: u64,
    pub rejections: u64,
    pub suppressed_entries: u64,
}

/// The strategy's decision core.
pub struct StrategyController<R> {
    config: StrategyConfig,
    ledger: PositionLedger,
    signals: SignalEvaluator,
    martingale: MartingaleController,
    trailing: TrailingStopEngine,
    risk: RiskGuard,
    rng: R,
    last_quote: Option<Quote>,
    // Positions whose modification was rejected at the current quote
    rejected_this_tick: BTreeSet<PositionId>,
    halted: bool,
    stats: ControllerStats,
}

impl<R: Rng> StrategyController<R> {
    pub fn new(config: StrategyConfig, rng: R) -> Self {
        let signals = SignalEvaluator::new(
            config.ma_type,
            config.source,
            config.fast_periods,
            config.slow_periods,
        );
        let martingale = MartingaleController::new(config.initial_volume, config.loss_volume_multiplier);
        let trailing = TrailingStopEngine::new(
            config.pips(config.trigger_pips),
            config.pips(config.trailing_stop_pips),
        );
        let risk = RiskGuard::new(config.min_balance, config.min_loss, config.max_positions);

        Self {
            config,
            ledger: PositionLedger::new(),
            signals,
            martingale,
            trailing,
            risk,
            rng,
            last_quote: None,
            rejected_this_tick: BTreeSet::new(),
            halted: false,
            stats: ControllerStats::default(),
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn stats(&self) -> &ControllerStats {
        &self.stats
    }

    /// Whether trading stopped after a fatal gateway error.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    // ==================== Start-up ====================

    /// Run the start-up actions against positions already on the account.
    pub fn start<G: ExecutionGateway>(&mut self, existing: &[Position], gateway: &mut G) {
        info!(
            label = %self.config.label,
            symbol = %self.config.symbol,
            existing = existing.len(),
            "Strategy starting"
        );

        for position in existing {
            if position.is_owned_by(&self.config.label, &self.config.symbol) {
                self.ledger.upsert(position.clone());
            }
        }

        if self.config.hedge_on_start {
            // Only the first existing position is hedged
            if let Some(first) = existing.first() {
                let request = OrderRequest {
                    direction: first.direction.opposite(),
                    symbol: self.config.symbol.clone(),
                    volume: self.config.volume,
                    label: self.config.label.clone(),
                    stop_loss_pips: None,
                    take_profit_pips: None,
                };
                self.submit(gateway, request, "hedge");
            }
        }

        if self.config.seed_initial_order {
            let direction = Direction::random(&mut self.rng);
            let request = self.protected_order(direction, self.config.initial_volume);
            self.submit(gateway, request, "seed");
        }
    }

    // ==================== Event handlers ====================

    /// Every price update: initial protection, then trailing.
    pub fn handle_tick<G: ExecutionGateway>(&mut self, quote: Quote, gateway: &mut G) {
        self.last_quote = Some(quote);
        self.rejected_this_tick.clear();
        if self.halted {
            return;
        }

        self.protect_unguarded(gateway);
        self.trail(&quote, gateway);
    }

    /// Bar close: entry gate, crossover entry, balance closure, loss
    /// closure, trailing pass.
    pub fn handle_bar_close<G>(&mut self, bar: &Bar, gateway: &mut G)
    where
        G: ExecutionGateway + AccountState,
    {
        let signal = self.signals.on_bar(bar);
        if self.halted {
            return;
        }

        let managed = self.ledger.snapshot(&self.config.label, &self.config.symbol);

        if let Some(direction) = signal.direction() {
            if self.risk.allows_entry(managed.len()) {
                let request = self.protected_order(direction, self.config.volume);
                self.submit(gateway, request, "crossover");
            } else {
                self.stats.suppressed_entries += 1;
                debug!(
                    signal = ?signal,
                    open = managed.len(),
                    max = self.config.max_positions,
                    "Entry suppressed by position limit"
                );
            }
        }

        let balance = gateway.balance();
        if self.risk.balance_breached(balance) {
            warn!(
                balance = %balance,
                min_balance = %self.config.min_balance,
                "Balance below minimum, closing all positions"
            );
        }
        for closure in self.risk.closures(balance, &managed) {
            self.close(gateway, closure);
        }

        if let Some(quote) = self.last_quote {
            self.trail(&quote, gateway);
        }

        if signal != Signal::NoSignal {
            debug!(signal = ?signal, close = %bar.close, "Bar processed");
        }
    }

    /// Venue opened a position.
    pub fn handle_position_opened(&mut self, position: Position) {
        if !self.owns(&position) {
            debug!(position = %position.id, label = %position.label, "Ignoring foreign position");
            return;
        }

        info!(
            position = %position.id,
            direction = %position.direction,
            volume = position.volume,
            entry = %position.entry_price,
            "Position opened"
        );
        self.ledger.upsert(position);
    }

    /// Venue refreshed a position's profit or protective levels.
    ///
    /// Only positions still in the ledger are refreshed. A snapshot never
    /// loosens a stop the ledger already holds.
    pub fn handle_position_updated(&mut self, position: Position) {
        if !self.owns(&position) {
            return;
        }

        let id = position.id;
        if !self.ledger.merge_update(position) {
            debug!(position = %id, "Ignoring update for a position no longer managed");
        }
    }

    /// Venue closed a position: drop it and let the martingale re-enter.
    ///
    /// Decisions use the event payload, never the ledger entry.
    pub fn handle_position_closed<G: ExecutionGateway>(&mut self, closed: ClosedPosition, gateway: &mut G) {
        self.ledger.remove(closed.position.id);

        if !self.owns(&closed.position) {
            return;
        }

        info!(
            position = %closed.position.id,
            direction = %closed.position.direction,
            gross_profit = %closed.gross_profit,
            exit = %closed.exit_price,
            "Position closed"
        );

        if self.halted {
            return;
        }

        let next = self.martingale.next_order(&closed, &mut self.rng);
        let reason = match next.reason {
            ReentryReason::Reset => "martingale reset",
            ReentryReason::Recover => "martingale recover",
        };
        let request = self.protected_order(next.direction, next.volume);
        self.submit(gateway, request, reason);
    }

    // ==================== Gateway requests ====================

    fn owns(&self, position: &Position) -> bool {
        position.is_owned_by(&self.config.label, &self.config.symbol)
    }

    fn protected_order(&self, direction: Direction, volume: u64) -> OrderRequest {
        OrderRequest {
            direction,
            symbol: self.config.symbol.clone(),
            volume,
            label: self.config.label.clone(),
            stop_loss_pips: Some(self.config.stop_loss_pips),
            take_profit_pips: Some(self.config.take_profit_pips),
        }
    }

    fn submit<G: ExecutionGateway>(&mut self, gateway: &mut G, request: OrderRequest, reason: &str) {
        if self.halted {
            debug!(reason, "Strategy halted, order not sent");
            return;
        }

        match gateway.open_market_order(&request) {
            Ok(id) => {
                self.stats.orders_opened += 1;
                info!(
                    position = %id,
                    direction = %request.direction,
                    volume = request.volume,
                    reason,
                    "Market order sent"
                );
            }
            Err(e) if e.is_fatal() => self.halt(&e),
            Err(e) => {
                self.stats.rejections += 1;
                warn!(error = %e, direction = %request.direction, volume = request.volume, reason, "Order rejected");
            }
        }
    }

    fn modify<G: ExecutionGateway>(&mut self, gateway: &mut G, update: StopUpdate) {
        if self.halted {
            return;
        }
        if self.rejected_this_tick.contains(&update.id) {
            debug!(position = %update.id, "Modify not retried until the next tick");
            return;
        }

        match gateway.modify_position(update.id, update.stop_loss, update.take_profit) {
            Ok(()) => {
                self.stats.modifications += 1;
                self.ledger.update_protection(update.id, update.stop_loss, update.take_profit);
                info!(
                    position = %update.id,
                    stop_loss = ?update.stop_loss,
                    take_profit = ?update.take_profit,
                    "Protective levels updated"
                );
            }
            Err(GatewayError::UnknownPosition(id)) => {
                debug!(position = %id, "Modify skipped, position already closed");
            }
            Err(e) => {
                // Next tick recomputes and tries again if still warranted
                self.rejected_this_tick.insert(update.id);
                self.stats.rejections += 1;
                warn!(position = %update.id, error = %e, "Modification rejected");
            }
        }
    }

    fn close<G: ExecutionGateway>(&mut self, gateway: &mut G, closure: Closure) {
        if self.halted {
            return;
        }

        match gateway.close_position(closure.id) {
            Ok(()) => {
                self.stats.closures += 1;
                info!(position = %closure.id, reason = ?closure.reason, "Close requested");
            }
            Err(GatewayError::UnknownPosition(id)) => {
                debug!(position = %id, "Close skipped, position already closed");
            }
            Err(e) => {
                self.stats.rejections += 1;
                warn!(position = %closure.id, error = %e, "Close rejected");
            }
        }
    }

    /// Give managed positions without a stop their absolute protective levels.
    fn protect_unguarded<G: ExecutionGateway>(&mut self, gateway: &mut G) {
        let Some(pips) = self.config.protective_pips else {
            return;
        };
        let distance = self.config.pips(pips);

        let updates: Vec<StopUpdate> = self
            .ledger
            .all()
            .filter(|p| self.owns(p) && p.stop_loss.is_none())
            .map(|p| protective_levels(p, distance))
            .collect();

        for update in updates {
            self.modify(gateway, update);
        }
    }

    fn trail<G: ExecutionGateway>(&mut self, quote: &Quote, gateway: &mut G) {
        if self.ledger.is_empty() {
            return;
        }

        // Buys trail the bid, sells the ask
        let mut updates = Vec::new();
        for direction in [Direction::Buy, Direction::Sell] {
            let positions = self
                .ledger
                .find_by_label_direction(&self.config.label, direction)
                .filter(|p| p.symbol == self.config.symbol);
            updates.extend(self.trailing.plan(positions, quote));
        }

        for update in updates {
            self.modify(gateway, update);
        }
    }

    fn halt(&mut self, cause: &GatewayError) {
        self.halted = true;
        error!(error = %cause, "Fatal gateway error, strategy halted");
    }
}
