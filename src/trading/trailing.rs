//! Trailing stop-loss and initial protective levels.

use rust_decimal::Decimal;

use crate::models::{Direction, Position, PositionId, Quote};

/// A stop-loss change to request from the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopUpdate {
    pub id: PositionId,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
}

/// Tightens stops once price has moved far enough in the position's favour.
#[derive(Debug, Clone)]
pub struct TrailingStopEngine {
    /// Favourable move (price units) before trailing starts
    trigger_distance: Decimal,
    /// Gap (price units) kept between price and stop
    trailing_distance: Decimal,
}

impl TrailingStopEngine {
    pub fn new(trigger_distance: Decimal, trailing_distance: Decimal) -> Self {
        Self {
            trigger_distance,
            trailing_distance,
        }
    }

    /// New stop for the position, only if it is strictly tighter than the current one.
    ///
    /// Shorts are measured against the ask, longs against the bid.
    pub fn candidate(&self, position: &Position, quote: &Quote) -> Option<Decimal> {
        match position.direction {
            Direction::Sell => {
                let distance = position.entry_price - quote.ask;
                if distance < self.trigger_distance {
                    return None;
                }
                let stop = quote.ask + self.trailing_distance;
                match position.stop_loss {
                    Some(current) if stop >= current => None,
                    _ => Some(stop),
                }
            }
            Direction::Buy => {
                let distance = quote.bid - position.entry_price;
                if distance < self.trigger_distance {
                    return None;
                }
                let stop = quote.bid - self.trailing_distance;
                match position.stop_loss {
                    Some(current) if stop <= current => None,
                    _ => Some(stop),
                }
            }
        }
    }

    /// Stop updates for every position that can be tightened. Take-profit is kept.
    pub fn plan<'a>(&self, positions: impl IntoIterator<Item = &'a Position>, quote: &Quote) -> Vec<StopUpdate> {
        positions
            .into_iter()
            .filter_map(|position| {
                self.candidate(position, quote).map(|stop| StopUpdate {
                    id: position.id,
                    stop_loss: Some(stop),
                    take_profit: position.take_profit,
                })
            })
            .collect()
    }
}

/// Absolute stop-loss and take-profit `distance` away from the entry price.
pub fn protective_levels(position: &Position, distance: Decimal) -> StopUpdate {
    let (stop_loss, take_profit) = match position.direction {
        Direction::Buy => (position.entry_price - distance, position.entry_price + distance),
        Direction::Sell => (position.entry_price + distance, position.entry_price - distance),
    };
    StopUpdate {
        id: position.id,
        stop_loss: Some(stop_loss),
        take_profit: Some(take_profit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn engine() -> TrailingStopEngine {
        // 10 pips trigger, 10 pips trail
        TrailingStopEngine::new(dec!(0.0010), dec!(0.0010))
    }

    fn quote(bid: Decimal, ask: Decimal) -> Quote {
        Quote::new(bid, ask, Utc::now())
    }

    fn sell_at(entry: Decimal) -> Position {
        Position::new(PositionId(1), "EURUSD", Direction::Sell, entry, 100_000, "FasFox")
    }

    fn buy_at(entry: Decimal) -> Position {
        Position::new(PositionId(2), "EURUSD", Direction::Buy, entry, 100_000, "FasFox")
    }

    #[test]
    fn test_sell_below_trigger_is_ignored() {
        let pos = sell_at(dec!(1.1000));
        // Ask only 9 pips below entry
        assert_eq!(engine().candidate(&pos, &quote(dec!(1.0989), dec!(1.0991))), None);
    }

    #[test]
    fn test_sell_at_trigger_sets_stop() {
        let pos = sell_at(dec!(1.1000));
        let stop = engine().candidate(&pos, &quote(dec!(1.0988), dec!(1.0990)));
        assert_eq!(stop, Some(dec!(1.1000)));
    }

    #[test]
    fn test_sell_stop_only_moves_down() {
        let pos = sell_at(dec!(1.1000)).with_protection(Some(dec!(1.0995)), Some(dec!(1.0960)));

        // Candidate 1.1000 is looser than 1.0995
        assert_eq!(engine().candidate(&pos, &quote(dec!(1.0988), dec!(1.0990))), None);
        // Candidate 1.0995 is equal, not strictly better
        assert_eq!(engine().candidate(&pos, &quote(dec!(1.0983), dec!(1.0985))), None);
        // Candidate 1.0990 tightens
        assert_eq!(
            engine().candidate(&pos, &quote(dec!(1.0978), dec!(1.0980))),
            Some(dec!(1.0990))
        );
    }

    #[test]
    fn test_buy_stop_only_moves_up() {
        let pos = buy_at(dec!(1.1000)).with_protection(Some(dec!(1.1005)), None);

        assert_eq!(engine().candidate(&pos, &quote(dec!(1.1015), dec!(1.1017))), None);
        assert_eq!(
            engine().candidate(&pos, &quote(dec!(1.1020), dec!(1.1022))),
            Some(dec!(1.1010))
        );
    }

    #[test]
    fn test_plan_keeps_take_profit() {
        let pos = sell_at(dec!(1.1000)).with_protection(None, Some(dec!(1.0960)));
        let updates = engine().plan([&pos], &quote(dec!(1.0978), dec!(1.0980)));

        assert_eq!(
            updates,
            vec![StopUpdate {
                id: PositionId(1),
                stop_loss: Some(dec!(1.0990)),
                take_profit: Some(dec!(1.0960)),
            }]
        );
    }

    #[test]
    fn test_repeated_ticks_below_trigger_produce_nothing() {
        let pos = buy_at(dec!(1.1000));
        let engine = engine();
        for pips in 0..10 {
            let bid = dec!(1.1000) + Decimal::new(pips, 4);
            assert!(engine.plan([&pos], &quote(bid, bid + dec!(0.0002))).is_empty());
        }
    }

    #[test]
    fn test_protective_levels() {
        let long = protective_levels(&buy_at(dec!(1.1000)), dec!(0.0010));
        assert_eq!(long.stop_loss, Some(dec!(1.0990)));
        assert_eq!(long.take_profit, Some(dec!(1.1010)));

        let short = protective_levels(&sell_at(dec!(1.1000)), dec!(0.0010));
        assert_eq!(short.stop_loss, Some(dec!(1.1010)));
        assert_eq!(short.take_profit, Some(dec!(1.0990)));
    }

    proptest! {
        #[test]
        fn sell_stop_never_loosens(asks in prop::collection::vec(10_500i64..11_500, 1..60)) {
            let engine = engine();
            let mut pos = sell_at(dec!(1.1000));
            let mut last: Option<Decimal> = None;

            for raw in asks {
                let ask = Decimal::new(raw, 4);
                if let Some(stop) = engine.candidate(&pos, &quote(ask - dec!(0.0002), ask)) {
                    pos.stop_loss = Some(stop);
                }
                if let (Some(prev), Some(now)) = (last, pos.stop_loss) {
                    prop_assert!(now <= prev);
                }
                last = pos.stop_loss;
            }
        }

        #[test]
        fn buy_stop_never_loosens(bids in prop::collection::vec(10_500i64..11_500, 1..60)) {
            let engine = engine();
            let mut pos = buy_at(dec!(1.1000));
            let mut last: Option<Decimal> = None;

            for raw in bids {
                let bid = Decimal::new(raw, 4);
                if let Some(stop) = engine.candidate(&pos, &quote(bid, bid + dec!(0.0002))) {
                    pos.stop_loss = Some(stop);
                }
                if let (Some(prev), Some(now)) = (last, pos.stop_loss) {
                    prop_assert!(now >= prev);
                }
                last = pos.stop_loss;
            }
        }
    }
}
