//! Indicator calculations used by the crossover signal.

mod moving_average;

pub use moving_average::{MovingAverage, MovingAverageType};
