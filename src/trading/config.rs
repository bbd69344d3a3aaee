//! Strategy configuration.

use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::indicators::MovingAverageType;
use crate::models::PriceSource;

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "FASFOX_";

/// Parameters for the martingale / crossover / trailing-stop strategy.
///
/// All distances are expressed in pips and converted to prices with
/// [`StrategyConfig::pips`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    // === Identity ===
    /// Label stamped on every order; only positions carrying it are managed
    pub label: String,

    /// Traded instrument
    pub symbol: String,

    /// Price increment one pip represents
    pub pip_size: Decimal,

    // === Crossover signal ===
    /// Smoothing method for both averages
    pub ma_type: MovingAverageType,

    /// Bar price the averages are computed over
    pub source: PriceSource,

    /// Fast average period in bars
    pub fast_periods: usize,

    /// Slow average period in bars
    pub slow_periods: usize,

    // === Sizing ===
    /// Fixed volume for crossover entries and start-up hedges
    pub volume: u64,

    /// Volume the martingale resets to after a win
    pub initial_volume: u64,

    /// Factor applied to the closed volume when re-entering after a loss
    pub loss_volume_multiplier: u64,

    // === Protective levels ===
    /// Stop-loss distance attached to new orders
    pub stop_loss_pips: u32,

    /// Take-profit distance attached to new orders
    pub take_profit_pips: u32,

    /// Favourable move required before the stop starts trailing
    pub trigger_pips: u32,

    /// Distance the trailed stop keeps from the current price
    pub trailing_stop_pips: u32,

    /// Absolute levels given to managed positions that have no stop; `None` disables
    pub protective_pips: Option<u32>,

    // === Risk ===
    /// Close everything when the account balance drops below this
    pub min_balance: Decimal,

    /// Close a position whose gross profit drops below this (negative)
    pub min_loss: Decimal,

    /// Crossover entries are skipped while more positions than this are open
    pub max_positions: usize,

    // === Start-up ===
    /// Hedge the first pre-existing position with an opposite order
    pub hedge_on_start: bool,

    /// Open an initial random-direction order instead of waiting for a signal
    pub seed_initial_order: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            label: "FasFox".to_string(),
            symbol: "EURUSD".to_string(),
            pip_size: dec!(0.0001),

            ma_type: MovingAverageType::Simple,
            source: PriceSource::Close,
            fast_periods: 5,
            slow_periods: 10,

            volume: 100_000,
            initial_volume: 10_000,
            loss_volume_multiplier: 1,

            stop_loss_pips: 40,
            take_profit_pips: 40,
            trigger_pips: 10,
            trailing_stop_pips: 10,
            protective_pips: Some(10),

            min_balance: dec!(5000),
            min_loss: dec!(-200),
            max_positions: 3,

            hedge_on_start: true,
            seed_initial_order: false,
        }
    }
}

impl StrategyConfig {
    /// Load configuration: defaults, then an optional JSON file, then
    /// `FASFOX_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid config file {}", path.display()))?
            }
            None => Self::default(),
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `FASFOX_*` environment variable overrides.
    pub fn apply_env(&mut self) -> Result<()> {
        override_from_env("LABEL", &mut self.label)?;
        override_from_env("SYMBOL", &mut self.symbol)?;
        override_from_env("PIP_SIZE", &mut self.pip_size)?;
        override_from_env("FAST_PERIODS", &mut self.fast_periods)?;
        override_from_env("SLOW_PERIODS", &mut self.slow_periods)?;
        override_from_env("VOLUME", &mut self.volume)?;
        override_from_env("INITIAL_VOLUME", &mut self.initial_volume)?;
        override_from_env("LOSS_VOLUME_MULTIPLIER", &mut self.loss_volume_multiplier)?;
        override_from_env("STOP_LOSS_PIPS", &mut self.stop_loss_pips)?;
        override_from_env("TAKE_PROFIT_PIPS", &mut self.take_profit_pips)?;
        override_from_env("TRIGGER_PIPS", &mut self.trigger_pips)?;
        override_from_env("TRAILING_STOP_PIPS", &mut self.trailing_stop_pips)?;
        override_from_env("MIN_BALANCE", &mut self.min_balance)?;
        override_from_env("MIN_LOSS", &mut self.min_loss)?;
        override_from_env("MAX_POSITIONS", &mut self.max_positions)?;
        override_from_env("HEDGE_ON_START", &mut self.hedge_on_start)?;
        override_from_env("SEED_INITIAL_ORDER", &mut self.seed_initial_order)?;

        if let Ok(raw) = std::env::var(format!("{ENV_PREFIX}MA_TYPE")) {
            self.ma_type = MovingAverageType::from_str(&raw);
        }
        Ok(())
    }

    /// Reject parameter combinations the strategy cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.label.is_empty() {
            bail!("label must not be empty");
        }
        if self.pip_size <= Decimal::ZERO {
            bail!("pip_size must be positive, got {}", self.pip_size);
        }
        if self.fast_periods == 0 || self.slow_periods == 0 {
            bail!("moving average periods must be positive");
        }
        if self.fast_periods >= self.slow_periods {
            bail!(
                "fast_periods ({}) must be shorter than slow_periods ({})",
                self.fast_periods,
                self.slow_periods
            );
        }
        if self.volume == 0 || self.initial_volume == 0 {
            bail!("volumes must be positive");
        }
        if self.loss_volume_multiplier == 0 {
            bail!("loss_volume_multiplier must be at least 1");
        }
        if self.min_loss >= Decimal::ZERO {
            bail!("min_loss must be negative, got {}", self.min_loss);
        }
        Ok(())
    }

    /// Convert a pip distance to a price distance.
    pub fn pips(&self, pips: u32) -> Decimal {
        self.pip_size * Decimal::from(pips)
    }
}

fn override_from_env<T>(key: &str, field: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let name = format!("{ENV_PREFIX}{key}");
    if let Ok(raw) = std::env::var(&name) {
        *field = raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {name}: {raw}"))?;
    }
    Ok(())
}
