//! FasFox trading robot
//!
//! Martingale re-entries, moving-average crossover entries and trailing
//! stops, run against a paper venue with a synthetic market feed.

mod bot;
mod error;
mod indicators;
mod metrics;
mod models;
mod session;
mod trading;
mod venue;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::bot::{Bot, BotConfig};
use crate::session::Session;
use crate::trading::{StrategyConfig, StrategyController};
use crate::venue::{PaperConfig, PaperVenue, RandomWalkFeed};

/// FasFox strategy CLI.
#[derive(Parser)]
#[command(name = "fasfox")]
#[command(about = "Martingale crossover robot with trailing stops", long_about = None)]
struct Cli {
    /// Strategy configuration file (JSON)
    #[arg(short, long, env = "FASFOX_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a synthetic market as fast as possible
    Simulate {
        /// Number of bars to simulate
        #[arg(short, long, default_value = "500")]
        bars: u64,

        /// Seed for prices and random directions
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Initial account balance
        #[arg(long, default_value = "10000")]
        balance: f64,

        /// Ticks per bar
        #[arg(long, default_value = "30")]
        ticks_per_bar: usize,
    },

    /// Paper trade on a paced synthetic feed until Ctrl+C
    Run {
        /// Delay between ticks in milliseconds
        #[arg(short, long, default_value = "250")]
        interval_ms: u64,

        /// Seed for prices and random directions
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Initial account balance
        #[arg(long, default_value = "10000")]
        balance: f64,

        /// Ticks per bar
        #[arg(long, default_value = "30")]
        ticks_per_bar: usize,

        /// Stop after this many bars
        #[arg(long)]
        max_bars: Option<u64>,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let strategy = StrategyConfig::load(cli.config.as_deref()).context("Failed to load strategy configuration")?;

    match cli.command {
        Commands::Simulate {
            bars,
            seed,
            balance,
            ticks_per_bar,
        } => {
            let paper = paper_config(&strategy, seed, balance, ticks_per_bar)?;
            info!(bars, seed, balance = %paper.initial_balance, "Starting simulation");

            let mut feed = RandomWalkFeed::new(&paper);
            let controller = StrategyController::new(strategy, StdRng::seed_from_u64(seed));
            let mut session = Session::new(controller, PaperVenue::new(paper));
            session.start();

            let mut closed_bars = 0;
            while closed_bars < bars && !session.is_halted() {
                for event in feed.next_events() {
                    if matches!(event, trading::MarketEvent::BarClose(_)) {
                        closed_bars += 1;
                        if closed_bars % 50 == 0 {
                            session.log_progress();
                        }
                    }
                    session.process(event);
                }
            }

            println!("{}", session.report());
        }

        Commands::Run {
            interval_ms,
            seed,
            balance,
            ticks_per_bar,
            max_bars,
        } => {
            let paper = paper_config(&strategy, seed, balance, ticks_per_bar)?;

            println!("\n=== FasFox Paper Trading ===");
            println!("Symbol:     {}", strategy.symbol);
            println!("Label:      {}", strategy.label);
            println!("Balance:    {}", paper.initial_balance);
            println!("Tick every: {}ms ({} ticks per bar)", interval_ms, paper.ticks_per_bar);
            println!("\nThis is SIMULATED trading - no real money involved.");
            println!("Press Ctrl+C to stop.\n");

            let mut bot = Bot::new(BotConfig {
                tick_interval_ms: interval_ms,
                max_bars,
                strategy,
                paper,
                ..BotConfig::default()
            });

            // Register shutdown handler
            let shutdown = bot.shutdown_signal();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutdown signal received");
                shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
            });

            let report = bot.run().await?;
            println!("{}", report);
        }

        Commands::Config => {
            let paper = PaperConfig::default();

            println!("\n=== Strategy Configuration ===\n");
            println!("Identity:");
            println!("  Label:                {}", strategy.label);
            println!("  Symbol:               {}", strategy.symbol);
            println!("  Pip Size:             {}", strategy.pip_size);

            println!("\nCrossover Signal:");
            println!("  MA Type:              {:?}", strategy.ma_type);
            println!("  Source:               {:?}", strategy.source);
            println!("  Fast Periods:         {}", strategy.fast_periods);
            println!("  Slow Periods:         {}", strategy.slow_periods);

            println!("\nSizing:");
            println!("  Signal Volume:        {}", strategy.volume);
            println!("  Initial Volume:       {}", strategy.initial_volume);
            println!("  Loss Multiplier:      {}", strategy.loss_volume_multiplier);

            println!("\nProtection:");
            println!("  Stop Loss:            {} pips", strategy.stop_loss_pips);
            println!("  Take Profit:          {} pips", strategy.take_profit_pips);
            println!("  Trailing Trigger:     {} pips", strategy.trigger_pips);
            println!("  Trailing Stop:        {} pips", strategy.trailing_stop_pips);
            match strategy.protective_pips {
                Some(pips) => println!("  Protective Levels:    {} pips", pips),
                None => println!("  Protective Levels:    off"),
            }

            println!("\nRisk:");
            println!("  Min Balance:          {}", strategy.min_balance);
            println!("  Min Loss:             {}", strategy.min_loss);
            println!("  Max Positions:        {}", strategy.max_positions);

            println!("\nStart-up:");
            println!("  Hedge Existing:       {}", strategy.hedge_on_start);
            println!("  Seed Initial Order:   {}", strategy.seed_initial_order);

            println!("\n=== Paper Venue Defaults ===\n");
            println!("  Initial Balance:      {}", paper.initial_balance);
            println!("  Start Price:          {}", paper.start_price);
            println!("  Spread:               {} pips", paper.spread_pips);
            println!("  Max Step:             {} pips", paper.max_step_pips);
            println!("  Ticks per Bar:        {}", paper.ticks_per_bar);
            println!("  Margin Rate:          {}", paper.margin_rate);
        }
    }

    Ok(())
}

/// Paper venue settings for the strategy's instrument.
fn paper_config(strategy: &StrategyConfig, seed: u64, balance: f64, ticks_per_bar: usize) -> Result<PaperConfig> {
    Ok(PaperConfig {
        initial_balance: Decimal::try_from(balance)?,
        symbol: strategy.symbol.clone(),
        pip_size: strategy.pip_size,
        ticks_per_bar,
        seed,
        ..PaperConfig::default()
    })
}
