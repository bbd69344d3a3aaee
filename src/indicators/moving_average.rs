//! Streaming moving averages over a bar price series.
//!
//! Each average is fed one value per closed bar and keeps only the two most
//! recent results, which is all the crossover check needs.

use std::collections::VecDeque;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Number of computed values retained (current and previous bar).
const RESULT_HISTORY: usize = 2;

/// Smoothing method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovingAverageType {
    #[default]
    Simple,
    Exponential,
    Weighted,
    Triangular,
}

impl MovingAverageType {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "exponential" | "ema" => Self::Exponential,
            "weighted" | "wma" => Self::Weighted,
            "triangular" | "tma" => Self::Triangular,
            _ => Self::Simple,
        }
    }
}

/// A moving average that is updated incrementally.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    kind: MovingAverageType,
    period: usize,
    inputs: VecDeque<Decimal>,
    /// First-pass averages for the triangular method
    inner: VecDeque<Decimal>,
    ema: Option<Decimal>,
    results: VecDeque<Decimal>,
}

impl MovingAverage {
    pub fn new(kind: MovingAverageType, period: usize) -> Self {
        let period = period.max(1);
        Self {
            kind,
            period,
            inputs: VecDeque::with_capacity(period + 1),
            inner: VecDeque::new(),
            ema: None,
            results: VecDeque::with_capacity(RESULT_HISTORY + 1),
        }
    }

    /// Feed the next source value (one per closed bar).
    pub fn push(&mut self, value: Decimal) {
        self.inputs.push_back(value);
        if self.inputs.len() > self.period {
            self.inputs.pop_front();
        }

        let next = match self.kind {
            MovingAverageType::Simple => self.simple(),
            MovingAverageType::Weighted => self.weighted(),
            MovingAverageType::Exponential => self.exponential(value),
            MovingAverageType::Triangular => self.triangular(),
        };

        if let Some(v) = next {
            self.results.push_back(v);
            if self.results.len() > RESULT_HISTORY {
                self.results.pop_front();
            }
        }
    }

    /// Value `offset` bars back: 0 is the latest bar, 1 the one before.
    /// `None` until enough bars have been seen.
    pub fn value_at(&self, offset: usize) -> Option<Decimal> {
        let len = self.results.len();
        if offset >= len {
            return None;
        }
        self.results.get(len - 1 - offset).copied()
    }

    fn simple(&self) -> Option<Decimal> {
        if self.inputs.len() < self.period {
            return None;
        }
        Some(mean(self.inputs.iter()))
    }

    fn weighted(&self) -> Option<Decimal> {
        if self.inputs.len() < self.period {
            return None;
        }
        // Oldest value weighs 1, newest weighs `period`
        let mut numerator = Decimal::ZERO;
        let mut denominator = Decimal::ZERO;
        for (i, value) in self.inputs.iter().enumerate() {
            let weight = Decimal::from(i as u64 + 1);
            numerator += *value * weight;
            denominator += weight;
        }
        Some(numerator / denominator)
    }

    fn exponential(&mut self, value: Decimal) -> Option<Decimal> {
        let next = match self.ema {
            // Seed with the simple average of the first full window
            None if self.inputs.len() < self.period => return None,
            None => mean(self.inputs.iter()),
            Some(prev) => {
                let alpha = dec!(2) / Decimal::from(self.period as u64 + 1);
                prev + alpha * (value - prev)
            }
        };
        self.ema = Some(next);
        Some(next)
    }

    fn triangular(&mut self) -> Option<Decimal> {
        // SMA of an SMA, both over ceil((period + 1) / 2) bars
        let span = (self.period + 2) / 2;
        if self.inputs.len() < span {
            return None;
        }
        let first = mean(self.inputs.iter().skip(self.inputs.len() - span));
        self.inner.push_back(first);
        if self.inner.len() > span {
            self.inner.pop_front();
        }
        if self.inner.len() < span {
            return None;
        }
        Some(mean(self.inner.iter()))
    }
}

fn mean<'a>(values: impl ExactSizeIterator<Item = &'a Decimal>) -> Decimal {
    let count = values.len();
    if count == 0 {
        return Decimal::ZERO;
    }
    values.copied().sum::<Decimal>() / Decimal::from(count as u64)
}
