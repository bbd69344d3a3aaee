//! Bot runner: paced paper trading loop.
//!
//! A feed task publishes market events on an mpsc channel at a fixed
//! interval. The loop owns the [`Session`] and handles one event at a
//! time, so the strategy never sees concurrent events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::session::{Session, SessionReport};
use crate::trading::{MarketEvent, StrategyConfig, StrategyController};
use crate::venue::{PaperConfig, PaperVenue, RandomWalkFeed};

/// Capacity of the market event channel.
const EVENT_BUFFER: usize = 1024;

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Delay between generated ticks (milliseconds)
    pub tick_interval_ms: u64,

    /// Stop after this many bars; `None` runs until Ctrl+C or a halt
    pub max_bars: Option<u64>,

    /// Log a progress line every this many bars
    pub report_every_bars: u64,

    /// Strategy configuration
    pub strategy: StrategyConfig,

    /// Paper venue and feed configuration
    pub paper: PaperConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 250,
            max_bars: None,
            report_every_bars: 10,
            strategy: StrategyConfig::default(),
            paper: PaperConfig::default(),
        }
    }
}

/// Main bot runner.
pub struct Bot {
    config: BotConfig,
    session: Session<StdRng>,

    // Shutdown signal
    shutdown: Arc<AtomicBool>,
}

impl Bot {
    /// Create a new bot instance.
    pub fn new(config: BotConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.paper.seed);
        let controller = StrategyController::new(config.strategy.clone(), rng);
        let venue = PaperVenue::new(config.paper.clone());

        Self {
            session: Session::new(controller, venue),
            shutdown: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    /// Get shutdown signal for external control.
    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Main run loop. Returns the session report once stopped.
    pub async fn run(&mut self) -> Result<SessionReport> {
        info!(
            tick_interval_ms = self.config.tick_interval_ms,
            max_bars = ?self.config.max_bars,
            seed = self.config.paper.seed,
            "Starting bot run loop"
        );

        let (tx, mut rx) = mpsc::channel::<MarketEvent>(EVENT_BUFFER);

        let mut feed = RandomWalkFeed::new(&self.config.paper);
        let period = Duration::from_millis(self.config.tick_interval_ms.max(1));
        let feed_task = tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                for event in feed.next_events() {
                    if tx.send(event).await.is_err() {
                        debug!("Event channel closed, feed stopping");
                        return;
                    }
                }
            }
        });

        self.session.start();
        let mut bars = 0u64;

        while !self.shutdown.load(Ordering::SeqCst) {
            let event = tokio::select! {
                event = rx.recv() => event,
                _ = tokio::time::sleep(Duration::from_millis(100)) => continue,
            };
            let Some(event) = event else {
                warn!("Market feed ended");
                break;
            };

            let is_bar = matches!(event, MarketEvent::BarClose(_));
            self.session.process(event);

            if self.session.is_halted() {
                warn!("Strategy halted, stopping bot");
                break;
            }

            if is_bar {
                bars += 1;
                if self.config.report_every_bars > 0 && bars % self.config.report_every_bars == 0 {
                    self.session.log_progress();
                }
                if self.config.max_bars.is_some_and(|max| bars >= max) {
                    info!(bars, "Bar limit reached");
                    break;
                }
            }
        }

        feed_task.abort();
        info!("Bot shutdown complete");

        Ok(self.session.report())
    }
}
