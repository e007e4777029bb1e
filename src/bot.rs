//! Bot runner: the tick loop that drives the basket.
//!
//! Each tick:
//! - fetches candles for every configured asset concurrently
//! - per asset, in configuration order: indicators, decision, sizing, settlement
//! - reports balance, unrealized PnL and equity

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::api::MarketDataSource;
use crate::metrics::{SessionCalculator, SessionStats};
use crate::models::{AssetConfig, PositionState};
use crate::trading::{
    ClosedPosition, Decision, MarketSnapshot, PositionLedger, PositionSizer, Settled, Settlement,
    SettlementError, Strategy, TradingConfig,
};

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Tick period (seconds)
    pub poll_interval_secs: u64,

    /// Whether orders go to the exchange
    pub live: bool,

    /// Starting balance for simulated mode, in USD
    pub initial_balance: Decimal,

    /// Strategy and sizing configuration
    pub trading: TradingConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            live: false,
            initial_balance: dec!(1000),
            trading: TradingConfig::default(),
        }
    }
}

/// Releases the tick-in-flight flag when dropped.
struct TickGuard(Arc<AtomicBool>);

impl TickGuard {
    fn try_claim(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for TickGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Main bot runner.
pub struct Bot {
    config: BotConfig,
    strategy: Strategy,
    sizer: PositionSizer,
    ledger: PositionLedger,
    market_data: Arc<dyn MarketDataSource>,
    settlement: Settlement,

    // Runtime state
    closed_trades: Vec<ClosedPosition>,
    tick_count: u64,

    tick_in_flight: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
}

impl Bot {
    /// Create a new bot instance.
    pub fn new(
        config: BotConfig,
        market_data: Arc<dyn MarketDataSource>,
        settlement: Settlement,
    ) -> Result<Self> {
        config.trading.validate()?;

        if config.poll_interval_secs == 0 {
            anyhow::bail!("Tick interval must be at least one second");
        }

        if config.live != settlement.is_live() {
            anyhow::bail!(
                "Settlement mode does not match configuration (live = {})",
                config.live
            );
        }

        Ok(Self {
            strategy: Strategy::new(config.trading.clone()),
            sizer: PositionSizer::new(&config.trading),
            ledger: PositionLedger::new(&config.trading.assets),
            market_data,
            settlement,
            closed_trades: Vec::new(),
            tick_count: 0,
            tick_in_flight: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
            config,
        })
    }

    /// Flag held while a tick is being processed.
    pub fn tick_in_flight(&self) -> Arc<AtomicBool> {
        self.tick_in_flight.clone()
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn closed_trades(&self) -> &[ClosedPosition] {
        &self.closed_trades
    }

    /// Main run loop.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            live = self.config.live,
            interval = self.config.poll_interval_secs,
            assets = self.config.trading.assets.len(),
            "Starting bot run loop"
        );

        let mut ticker = interval(Duration::from_secs(self.config.poll_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Register shutdown handler
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
            shutdown.store(true, Ordering::SeqCst);
        });

        while !self.shutdown.load(Ordering::SeqCst) {
            ticker.tick().await;
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            if let Some(report) = self.tick().await {
                println!("{}", report);
            }
        }

        info!(
            closed_trades = self.closed_trades.len(),
            open_positions = self.ledger.open_count(),
            "Bot shutdown complete"
        );
        Ok(())
    }

    /// Single pass over the basket.
    ///
    /// Returns `None` without doing anything if another tick still holds the
    /// in-flight flag.
    pub async fn tick(&mut self) -> Option<TickReport> {
        let Some(_guard) = TickGuard::try_claim(&self.tick_in_flight) else {
            warn!("Previous tick still running, skipping");
            return None;
        };

        self.tick_count += 1;
        debug!(tick = self.tick_count, "Bot tick");

        let trading = self.strategy.config();
        let assets = trading.assets.clone();
        let end_ms = Utc::now().timestamp_millis();
        let start_ms = end_ms - trading.lookback_minutes * 60_000;
        let timeframe = trading.timeframe.as_str();

        let fetches = assets.iter().map(|asset| {
            self.market_data
                .fetch_candles(&asset.symbol, timeframe, start_ms, end_ms)
        });
        let results = join_all(fetches).await;

        let mut report = TickReport::new(self.tick_count, self.settlement.is_live());
        let mut prices = HashMap::new();

        for (asset, fetched) in assets.iter().zip(results) {
            let candles = match fetched {
                Ok(candles) => candles,
                Err(e) => {
                    warn!(symbol = %asset.symbol, error = %e, "Candle fetch failed, skipping asset");
                    report.rows.push(self.row(asset, None, 0));
                    continue;
                }
            };

            let Some(snapshot) = self.strategy.snapshot(&asset.symbol, &candles) else {
                report.rows.push(self.row(asset, None, candles.len()));
                continue;
            };
            prices.insert(asset.symbol.clone(), snapshot.price);

            if let Some(executed) = self.process_asset(asset, &snapshot).await {
                report.actions.push(executed);
            }

            report.rows.push(self.row(asset, Some(snapshot), candles.len()));
        }

        report.balance = self.settlement.balance().await;
        report.unrealized_pnl = self.ledger.unrealized_pnl(&prices);
        report.exposure = self
            .ledger
            .iter()
            .filter_map(|p| prices.get(p.symbol()).map(|&price| p.notional(price)))
            .sum();
        report.equity = report.balance + report.unrealized_pnl;

        Some(report)
    }

    /// Evaluate, size and settle one asset.
    async fn process_asset(
        &mut self,
        asset: &AssetConfig,
        snapshot: &MarketSnapshot,
    ) -> Option<ExecutedAction> {
        let position = match self.ledger.get(&asset.symbol) {
            Ok(position) => position.clone(),
            Err(e) => {
                error!(symbol = %asset.symbol, error = %e, "Asset missing from ledger");
                return None;
            }
        };

        let decision = self.strategy.evaluate(&position, snapshot)?;
        let balance = self.settlement.balance().await;
        let quantity =
            self.sizer
                .size_for(decision.action, &position, asset, balance, snapshot.price);

        match self
            .settlement
            .settle(&mut self.ledger, &decision, &asset.symbol, snapshot.price, quantity)
            .await
        {
            Ok(settled) => {
                let size = match &settled {
                    Settled::Opened { side, size, price, .. } => {
                        info!(
                            symbol = %asset.symbol,
                            side = %side,
                            size = %size,
                            price = %price,
                            reason = %decision.reason,
                            "Position opened"
                        );
                        *size
                    }
                    Settled::Closed(closed) => {
                        info!(
                            symbol = %asset.symbol,
                            side = %closed.side,
                            entry = %closed.entry_price,
                            exit = %closed.exit_price,
                            pnl = %closed.realized_pnl,
                            reason = %decision.reason,
                            "Position closed"
                        );
                        self.closed_trades.push(closed.clone());
                        closed.size
                    }
                };
                Some(ExecutedAction {
                    symbol: asset.symbol.clone(),
                    decision,
                    quantity: size,
                    price: snapshot.price,
                })
            }
            Err(SettlementError::Ledger(e)) => {
                error!(symbol = %asset.symbol, error = %e, action = %decision.action, "Ledger rejected action");
                None
            }
            Err(e) => {
                warn!(symbol = %asset.symbol, error = %e, action = %decision.action, "Action skipped");
                None
            }
        }
    }

    fn row(&self, asset: &AssetConfig, snapshot: Option<MarketSnapshot>, candles: usize) -> AssetRow {
        AssetRow {
            symbol: asset.symbol.clone(),
            candles,
            snapshot,
            position: self.ledger.get(&asset.symbol).ok().cloned(),
        }
    }

    /// Statistics over the trades closed so far.
    pub fn stats(&self) -> SessionStats {
        SessionCalculator::calculate(&self.closed_trades)
    }
}

/// One settled action.
#[derive(Debug, Clone)]
pub struct ExecutedAction {
    pub symbol: String,
    pub decision: Decision,
    pub quantity: Decimal,
    pub price: Decimal,
}

/// Per-asset dashboard line.
#[derive(Debug, Clone)]
pub struct AssetRow {
    pub symbol: String,
    pub candles: usize,
    /// `None` when the fetch failed or history was too short
    pub snapshot: Option<MarketSnapshot>,
    pub position: Option<PositionState>,
}

/// Outcome of one tick, rendered as the console dashboard.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: u64,
    pub at: DateTime<Utc>,
    pub live: bool,
    pub balance: Decimal,
    pub unrealized_pnl: Decimal,
    pub equity: Decimal,
    /// Notional of open positions at this tick's prices
    pub exposure: Decimal,
    pub rows: Vec<AssetRow>,
    pub actions: Vec<ExecutedAction>,
}

impl TickReport {
    fn new(tick: u64, live: bool) -> Self {
        Self {
            tick,
            at: Utc::now(),
            live,
            balance: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            equity: Decimal::ZERO,
            exposure: Decimal::ZERO,
            rows: Vec::new(),
            actions: Vec::new(),
        }
    }
}

impl std::fmt::Display for TickReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "=== Tick {} | {} | {} ===",
            self.tick,
            self.at.format("%Y-%m-%d %H:%M:%S"),
            if self.live { "LIVE" } else { "SIMULATED" }
        )?;
        writeln!(
            f,
            "Balance: ${:.2} | Unrealized P&L: ${:.2} | Equity: ${:.2} | Exposure: ${:.2}",
            self.balance, self.unrealized_pnl, self.equity, self.exposure
        )?;
        writeln!(
            f,
            "{:<6} {:>12} {:>12} {:>12} {:>6}  {}",
            "ASSET", "PRICE", "EMA FAST", "EMA SLOW", "RSI", "POSITION"
        )?;

        for row in &self.rows {
            let position = row
                .position
                .as_ref()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());

            match &row.snapshot {
                Some(s) => writeln!(
                    f,
                    "{:<6} {:>12} {:>12.4} {:>12.4} {:>6.1}  {}",
                    row.symbol, s.price, s.ema_fast, s.ema_slow, s.rsi, position
                )?,
                None => writeln!(
                    f,
                    "{:<6} {:>12} ({} candles, waiting for history)  {}",
                    row.symbol, "-", row.candles, position
                )?,
            }
        }

        if !self.actions.is_empty() {
            writeln!(f, "Actions:")?;
            for a in &self.actions {
                writeln!(
                    f,
                    "  {} {} {} @ {} ({})",
                    a.symbol, a.decision.action, a.quantity, a.price, a.decision.reason
                )?;
            }
        }
        Ok(())
    }
}
