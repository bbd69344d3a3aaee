//! Calculator for session performance: win rate, profit factor, drawdown, Sharpe.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Performance of a series of closed positions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Account balance before the first close
    pub initial_balance: Decimal,

    /// Account balance after the last close
    pub final_balance: Decimal,

    // === Win/Loss ===
    /// Number of closed positions
    pub total_trades: u32,

    pub winning_trades: u32,

    /// Includes flat closes
    pub losing_trades: u32,

    /// Win rate (0.0 to 1.0)
    pub win_rate: f64,

    pub avg_win: Decimal,

    /// Average loss (absolute value)
    pub avg_loss: Decimal,

    /// Gross profit / gross loss
    pub profit_factor: f64,

    /// Average gross profit per trade
    pub expectancy: Decimal,

    pub total_pnl: Decimal,

    // === Risk ===
    /// Maximum drawdown of the balance curve (0.0 to 1.0)
    pub max_drawdown: f64,

    /// Maximum drawdown in account currency
    pub max_drawdown_amount: Decimal,

    /// Per-trade Sharpe ratio (zero risk-free rate)
    pub sharpe_ratio: f64,

    /// Per-trade Sortino ratio
    pub sortino_ratio: f64,
}

/// Calculator for computing performance metrics.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Metrics for closed-position profits in close order, starting from `initial_balance`.
    pub fn calculate(initial_balance: Decimal, pnls: &[Decimal]) -> PerformanceMetrics {
        let mut metrics = PerformanceMetrics {
            initial_balance,
            final_balance: initial_balance,
            ..PerformanceMetrics::default()
        };

        if pnls.is_empty() {
            return metrics;
        }

        metrics.total_trades = pnls.len() as u32;
        metrics.total_pnl = pnls.iter().copied().sum();
        metrics.final_balance = initial_balance + metrics.total_pnl;

        Self::calculate_win_loss(&mut metrics, pnls);
        Self::calculate_drawdown(&mut metrics, pnls);
        Self::calculate_sharpe_sortino(&mut metrics, pnls);

        metrics
    }

    fn calculate_win_loss(metrics: &mut PerformanceMetrics, pnls: &[Decimal]) {
        let (wins, losses): (Vec<Decimal>, Vec<Decimal>) = pnls.iter().copied().partition(|p| *p > Decimal::ZERO);

        metrics.winning_trades = wins.len() as u32;
        metrics.losing_trades = losses.len() as u32;
        metrics.win_rate = wins.len() as f64 / pnls.len() as f64;

        let gross_profit: Decimal = wins.iter().copied().sum();
        let gross_loss: Decimal = losses.iter().map(|l| l.abs()).sum();

        if !wins.is_empty() {
            metrics.avg_win = gross_profit / Decimal::from(wins.len() as u32);
        }
        if !losses.is_empty() {
            metrics.avg_loss = gross_loss / Decimal::from(losses.len() as u32);
        }

        if gross_loss > Decimal::ZERO {
            metrics.profit_factor = gross_profit.to_f64().unwrap_or(0.0) / gross_loss.to_f64().unwrap_or(1.0);
        } else if gross_profit > Decimal::ZERO {
            metrics.profit_factor = f64::INFINITY;
        }

        metrics.expectancy = metrics.total_pnl / Decimal::from(pnls.len() as u32);
    }

    /// Peak-to-trough decline of the balance curve.
    fn calculate_drawdown(metrics: &mut PerformanceMetrics, pnls: &[Decimal]) {
        let mut balance = metrics.initial_balance;
        let mut peak = balance;
        let mut max_dd = Decimal::ZERO;
        let mut max_dd_pct = 0.0f64;

        for pnl in pnls {
            balance += pnl;
            if balance > peak {
                peak = balance;
            }

            let dd = peak - balance;
            if dd > max_dd {
                max_dd = dd;
            }
            if peak > Decimal::ZERO {
                let dd_pct = dd.to_f64().unwrap_or(0.0) / peak.to_f64().unwrap_or(1.0);
                if dd_pct > max_dd_pct {
                    max_dd_pct = dd_pct;
                }
            }
        }

        metrics.max_drawdown = max_dd_pct;
        metrics.max_drawdown_amount = max_dd;
    }

    fn calculate_sharpe_sortino(metrics: &mut PerformanceMetrics, pnls: &[Decimal]) {
        if pnls.len() < 2 {
            return;
        }

        let returns: Vec<f64> = pnls.iter().filter_map(|p| p.to_f64()).collect();
        let mean = returns.iter().mean();
        let std_dev = returns.iter().std_dev();

        if std_dev > 0.0 {
            metrics.sharpe_ratio = mean / std_dev;
        }

        let negative: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
        if negative.len() >= 2 {
            let downside_dev = negative.iter().std_dev();
            if downside_dev > 0.0 {
                metrics.sortino_ratio = mean / downside_dev;
            }
        }
    }
}

impl std::fmt::Display for PerformanceMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "--- Balance ---")?;
        writeln!(f, "Initial:       {:.2}", self.initial_balance)?;
        writeln!(f, "Final:         {:.2}", self.final_balance)?;
        writeln!(f, "Total P&L:     {:.2}", self.total_pnl)?;
        writeln!(f)?;
        writeln!(f, "--- Trades ---")?;
        writeln!(f, "Total:         {}", self.total_trades)?;
        writeln!(f, "Winners:       {} ({:.1}%)", self.winning_trades, self.win_rate * 100.0)?;
        writeln!(f, "Losers:        {}", self.losing_trades)?;
        writeln!(f, "Avg Win:       {:.2}", self.avg_win)?;
        writeln!(f, "Avg Loss:      {:.2}", self.avg_loss)?;
        writeln!(f, "Profit Factor: {:.2}", self.profit_factor)?;
        writeln!(f, "Expectancy:    {:.2}", self.expectancy)?;
        writeln!(f)?;
        writeln!(f, "--- Risk Metrics ---")?;
        writeln!(f, "Max Drawdown:  {:.2}% ({:.2})", self.max_drawdown * 100.0, self.max_drawdown_amount)?;
        writeln!(f, "Sharpe Ratio:  {:.2}", self.sharpe_ratio)?;
        writeln!(f, "Sortino Ratio: {:.2}", self.sortino_ratio)?;
        Ok(())
    }
}
