//! Hyperliquid Trend Bot
//!
//! Trades a weighted basket of perpetuals on an EMA crossover filtered by RSI,
//! with fixed-percentage stop-loss and take-profit exits. Runs against a
//! simulated balance unless live trading is enabled.

mod api;
mod bot;
mod indicators;
mod metrics;
mod models;
mod trading;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::api::{ExchangeClient, InfoClient, MarketDataSource, Network};
use crate::bot::{Bot, BotConfig};
use crate::models::AssetConfig;
use crate::trading::{Settlement, TradingConfig};

/// Hyperliquid trend-following bot CLI.
#[derive(Parser)]
#[command(name = "trendbot")]
#[command(about = "EMA/RSI trend bot for Hyperliquid perpetuals", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot loop
    Run {
        /// Tick interval in seconds
        #[arg(short, long, default_value = "5", value_parser = clap::value_parser!(u64).range(1..))]
        interval: u64,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Run a single tick and print the dashboard
    Once {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Show current configuration
    Config,
}

#[derive(Args)]
struct SessionArgs {
    /// Starting balance for simulated trading, in USD
    #[arg(short, long, default_value = "1000")]
    balance: f64,

    /// Submit real orders (also enabled by ENABLE_LIVE_TRADING=true)
    #[arg(long)]
    live: bool,

    /// Use the Hyperliquid testnet (also enabled by HYPERLIQUID_TESTNET=true)
    #[arg(long)]
    testnet: bool,

    /// Asset basket as SYMBOL:WEIGHT, e.g. BTC:0.4,ETH:0.3,SOL:0.3
    #[arg(short, long, value_delimiter = ',')]
    assets: Vec<AssetConfig>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Setup logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run { interval, session } => {
            let mut bot = build_bot(&session, interval)?;
            let config = bot_summary(&session, interval);

            println!("\n=== Hyperliquid Trend Bot ===");
            println!("{}", config);
            println!("\nPress Ctrl+C to stop.\n");

            if let Err(e) = bot.run().await {
                tracing::error!(error = %e, "Bot error");
            }

            // Show final stats
            println!("\n{}", bot.stats());
            for position in bot.ledger().iter().filter(|p| !p.is_flat()) {
                println!("Still open: {} {}", position.symbol(), position);
            }
        }

        Commands::Once { session } => {
            let mut bot = build_bot(&session, BotConfig::default().poll_interval_secs)?;
            if let Some(report) = bot.tick().await {
                println!("{}", report);
            }
        }

        Commands::Config => {
            let bot = BotConfig::default();
            let config = &bot.trading;

            println!("\n=== Trading Configuration ===\n");
            println!("Basket:");
            for asset in &config.assets {
                println!("  {:<6} {:>5}%", asset.symbol, asset.weight * dec!(100));
            }

            println!("\nSignals:");
            println!("  Timeframe:            {}", config.timeframe);
            println!("  Lookback:             {}m", config.lookback_minutes);
            println!("  EMA Fast / Slow:      {} / {}", config.ema_fast_period, config.ema_slow_period);
            println!("  RSI Period:           {}", config.rsi_period);
            println!(
                "  RSI Bands:            {} < long < {}, {} < short < {}",
                config.rsi_midline, config.rsi_overbought, config.rsi_oversold, config.rsi_midline
            );
            println!("  Min History:          {} candles", config.min_history);

            println!("\nRisk:");
            println!("  Leverage:             {}x", config.leverage);
            println!("  Stop Loss:            {}%", config.stop_loss_pct * dec!(100));
            println!("  Take Profit:          {}%", config.take_profit_pct * dec!(100));
            println!("  Limit Slippage:       {}%", config.slippage_pct * dec!(100));
            println!("  Size Precision:       {} dp", config.size_decimals);

            println!("\nRuntime:");
            println!("  Tick Interval:        {}s", bot.poll_interval_secs);
            println!("  Simulated Balance:    ${}", bot.initial_balance);
            println!(
                "  Live Trading:         {}",
                if env_flag("ENABLE_LIVE_TRADING") { "enabled" } else { "disabled" }
            );
        }
    }

    Ok(())
}

/// Wire clients, settlement and configuration into a bot.
fn build_bot(session: &SessionArgs, interval: u64) -> Result<Bot> {
    let live = session.live || env_flag("ENABLE_LIVE_TRADING");
    let network = if session.testnet || env_flag("HYPERLIQUID_TESTNET") {
        Network::Testnet
    } else {
        Network::Mainnet
    };

    let mut trading = TradingConfig::default();
    if !session.assets.is_empty() {
        trading.assets = session.assets.clone();
    }

    let config = BotConfig {
        poll_interval_secs: interval,
        live,
        initial_balance: Decimal::try_from(session.balance)
            .context("Invalid starting balance")?,
        trading,
    };
    let slippage = config.trading.slippage_pct;

    let (market_data, settlement): (Arc<dyn MarketDataSource>, Settlement) = if live {
        let address = std::env::var("PUBLIC_ADDRESS")
            .context("PUBLIC_ADDRESS must be set for live trading")?;
        let info = Arc::new(InfoClient::new(network)?.with_user(address.clone()));
        let exchange = Arc::new(
            ExchangeClient::from_env(info.clone(), network)
                .context("HYPERLIQUID_PRIVATE_KEY must be set for live trading")?,
        );
        info!(
            account = %address,
            signer = ?exchange.address(),
            network = ?network,
            "Exchange client initialized"
        );
        let market_data: Arc<dyn MarketDataSource> = info.clone();
        (market_data, Settlement::live(info, exchange, slippage))
    } else {
        let market_data: Arc<dyn MarketDataSource> = Arc::new(InfoClient::new(network)?);
        (market_data, Settlement::simulated(config.initial_balance, slippage))
    };

    Bot::new(config, market_data, settlement)
}

fn bot_summary(session: &SessionArgs, interval: u64) -> String {
    let live = session.live || env_flag("ENABLE_LIVE_TRADING");
    let mut lines = vec![
        format!(
            "Mode: {}",
            if live { "LIVE TRADING" } else { "SIMULATED (no real orders)" }
        ),
        format!("Tick interval: {}s", interval),
    ];
    if !live {
        lines.push(format!("Starting balance: ${}", session.balance));
    }
    if !session.assets.is_empty() {
        let basket: Vec<String> = session.assets.iter().map(|a| a.to_string()).collect();
        lines.push(format!("Basket: {}", basket.join(", ")));
    }
    lines.join("\n")
}

/// `true`, `1` or `yes` (any case) in the environment.
fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| is_truthy(&v))
        .unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy("true"));
        assert!(is_truthy("TRUE"));
        assert!(is_truthy(" yes "));
        assert!(is_truthy("1"));
        assert!(!is_truthy("false"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy(""));
        assert!(!is_truthy("on"));
    }

    #[test]
    fn test_cli_parses_basket() {
        let cli = Cli::try_parse_from(["trendbot", "once", "--assets", "btc:0.5,ETH:0.5"]).unwrap();
        match cli.command {
            Commands::Once { session } => {
                assert_eq!(session.assets.len(), 2);
                assert_eq!(session.assets[0].symbol, "BTC");
                assert_eq!(session.assets[1].weight, dec!(0.5));
                assert!(!session.live);
            }
            _ => panic!("expected once"),
        }
    }

    #[test]
    fn test_cli_rejects_zero_interval() {
        assert!(Cli::try_parse_from(["trendbot", "run", "--interval", "0"]).is_err());

        let cli = Cli::try_parse_from(["trendbot", "run", "--interval", "2"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { interval: 2, .. }));
    }

    #[test]
    fn test_cli_rejects_bad_weight() {
        assert!(Cli::try_parse_from(["trendbot", "once", "--assets", "BTC:2"]).is_err());
    }
}
