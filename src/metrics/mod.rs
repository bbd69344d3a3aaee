//! Performance summary of closed positions.

mod calculator;

pub use calculator::{MetricsCalculator, PerformanceMetrics};
