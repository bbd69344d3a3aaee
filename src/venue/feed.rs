//! Seeded random-walk quote generator with tick-count bar aggregation.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use super::PaperConfig;
use crate::models::{Bar, Quote};
use crate::trading::MarketEvent;

/// Synthetic market data for paper runs.
///
/// Every call to [`RandomWalkFeed::next_events`] produces one tick, followed
/// by a bar close whenever `ticks_per_bar` ticks have accumulated. Bars are
/// built from bid prices.
pub struct RandomWalkFeed {
    rng: StdRng,
    mid: Decimal,
    pip_size: Decimal,
    half_spread: Decimal,
    max_step_pips: i64,
    ticks_per_bar: usize,
    tick_spacing: Duration,
    time: DateTime<Utc>,
    bar: Option<Bar>,
    ticks_in_bar: usize,
}

impl RandomWalkFeed {
    pub fn new(config: &PaperConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            mid: config.start_price,
            pip_size: config.pip_size,
            half_spread: config.pip_size * Decimal::from(config.spread_pips) / Decimal::TWO,
            max_step_pips: i64::from(config.max_step_pips),
            ticks_per_bar: config.ticks_per_bar.max(1),
            tick_spacing: Duration::seconds(2),
            time: Utc::now(),
            bar: None,
            ticks_in_bar: 0,
        }
    }

    /// Advance the walk by one tick.
    pub fn next_events(&mut self) -> Vec<MarketEvent> {
        let step = self.rng.gen_range(-self.max_step_pips..=self.max_step_pips);
        self.mid = (self.mid + Decimal::from(step) * self.pip_size).max(self.pip_size * Decimal::TEN);
        self.time += self.tick_spacing;

        let quote = Quote::new(self.mid - self.half_spread, self.mid + self.half_spread, self.time);
        let mut events = vec![MarketEvent::Tick(quote)];

        match self.bar.as_mut() {
            Some(bar) => bar.update(quote.bid),
            None => self.bar = Some(Bar::open_at(quote.bid, self.time)),
        }
        self.ticks_in_bar += 1;

        if self.ticks_in_bar >= self.ticks_per_bar {
            if let Some(bar) = self.bar.take() {
                events.push(MarketEvent::BarClose(bar));
            }
            self.ticks_in_bar = 0;
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(seed: u64) -> PaperConfig {
        PaperConfig {
            seed,
            ticks_per_bar: 5,
            ..PaperConfig::default()
        }
    }

    #[test]
    fn test_bar_closes_every_n_ticks() {
        let mut feed = RandomWalkFeed::new(&config(7));
        let events: Vec<_> = (0..10).flat_map(|_| feed.next_events()).collect();

        let bars = events
            .iter()
            .filter(|e| matches!(e, MarketEvent::BarClose(_)))
            .count();
        assert_eq!(bars, 2);
        assert_eq!(events.len(), 12);
        assert!(matches!(events[5], MarketEvent::BarClose(_)));
    }

    #[test]
    fn test_bar_spans_tick_range() {
        let mut feed = RandomWalkFeed::new(&config(3));
        let mut bids = Vec::new();
        let mut closed = None;

        while closed.is_none() {
            for event in feed.next_events() {
                match event {
                    MarketEvent::Tick(q) => bids.push(q.bid),
                    MarketEvent::BarClose(bar) => closed = Some(bar),
                }
            }
        }

        let bar = closed.unwrap();
        assert_eq!(bar.open, bids[0]);
        assert_eq!(bar.close, *bids.last().unwrap());
        assert_eq!(bar.high, *bids.iter().max().unwrap());
        assert_eq!(bar.low, *bids.iter().min().unwrap());
    }

    #[test]
    fn test_same_seed_same_path() {
        let mut a = RandomWalkFeed::new(&config(11));
        let mut b = RandomWalkFeed::new(&config(11));

        for _ in 0..50 {
            let (ea, eb) = (a.next_events(), b.next_events());
            let (MarketEvent::Tick(qa), MarketEvent::Tick(qb)) = (ea[0], eb[0]) else {
                panic!("first event must be a tick");
            };
            assert_eq!((qa.bid, qa.ask), (qb.bid, qb.ask));
        }
    }

    #[test]
    fn test_spread_matches_config() {
        let mut feed = RandomWalkFeed::new(&config(5));
        let MarketEvent::Tick(quote) = feed.next_events()[0] else {
            panic!("first event must be a tick");
        };
        assert_eq!(quote.ask - quote.bid, PaperConfig::default().pip_size);
    }
}
