//! Trading configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::models::AssetConfig;

/// Configuration for signals, risk exits, and position sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Asset basket, evaluated in this order every tick
    pub assets: Vec<AssetConfig>,

    /// Leverage applied to each asset's capital share when sizing entries
    pub leverage: Decimal,

    /// Candle interval requested from the market data source
    pub timeframe: String,

    /// How much candle history to request each tick (minutes)
    pub lookback_minutes: i64,

    /// Fast EMA period
    pub ema_fast_period: usize,

    /// Slow EMA period
    pub ema_slow_period: usize,

    /// RSI period
    pub rsi_period: usize,

    /// Minimum number of candles before an asset is evaluated at all
    pub min_history: usize,

    /// RSI midline separating bullish and bearish entries
    pub rsi_midline: f64,

    /// RSI at or above which new longs are suppressed
    pub rsi_overbought: f64,

    /// RSI at or below which new shorts are suppressed
    pub rsi_oversold: f64,

    /// Stop loss as a fraction of entry price (e.g., 0.004 = 0.4%)
    pub stop_loss_pct: Decimal,

    /// Take profit as a fraction of entry price (e.g., 0.008 = 0.8%)
    pub take_profit_pct: Decimal,

    /// Limit price offset for marketable orders (0.05 = 5% through the price)
    pub slippage_pct: Decimal,

    /// Decimal places kept when sizing entries
    pub size_decimals: u32,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            assets: vec![
                AssetConfig { symbol: "BTC".to_string(), weight: dec!(0.4) },
                AssetConfig { symbol: "ETH".to_string(), weight: dec!(0.3) },
                AssetConfig { symbol: "SOL".to_string(), weight: dec!(0.3) },
            ],
            leverage: dec!(5),
            timeframe: "1m".to_string(),
            lookback_minutes: 60,
            ema_fast_period: 7,
            ema_slow_period: 21,
            rsi_period: 6,
            min_history: 30,
            rsi_midline: 50.0,
            rsi_overbought: 85.0,
            rsi_oversold: 15.0,
            stop_loss_pct: dec!(0.004),   // 0.4% stop
            take_profit_pct: dec!(0.008), // 0.8% target
            slippage_pct: dec!(0.05),     // aggressive 5% limit
            size_decimals: 4,
        }
    }
}

impl TradingConfig {
    /// Check values that would make the strategy meaningless.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.assets.is_empty() {
            anyhow::bail!("At least one asset must be configured");
        }
        for (i, asset) in self.assets.iter().enumerate() {
            if self.assets[..i].iter().any(|a| a.symbol == asset.symbol) {
                anyhow::bail!("Asset {} is configured twice", asset.symbol);
            }
        }
        if self.leverage <= Decimal::ZERO {
            anyhow::bail!("Leverage must be positive, got {}", self.leverage);
        }
        if self.ema_fast_period == 0 || self.ema_fast_period >= self.ema_slow_period {
            anyhow::bail!(
                "Fast EMA period ({}) must be non-zero and below the slow period ({})",
                self.ema_fast_period,
                self.ema_slow_period
            );
        }
        if self.rsi_period == 0 {
            anyhow::bail!("RSI period must be non-zero");
        }
        if self.stop_loss_pct <= Decimal::ZERO || self.take_profit_pct <= Decimal::ZERO {
            anyhow::bail!("Stop loss and take profit must both be positive");
        }
        if self.min_history < self.ema_slow_period || self.min_history < self.rsi_period + 1 {
            anyhow::bail!(
                "Minimum history ({}) is shorter than the indicators need",
                self.min_history
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = TradingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.assets[1].symbol, "ETH");
        assert_eq!(config.assets.iter().map(|a| a.weight).sum::<Decimal>(), Decimal::ONE);
    }

    #[test]
    fn test_rejects_duplicate_assets() {
        let mut config = TradingConfig::default();
        config.assets.push(AssetConfig { symbol: "BTC".to_string(), weight: dec!(0.1) });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_short_history_floor() {
        let config = TradingConfig { min_history: 10, ..Default::default() };
        assert!(config.validate().is_err());
    }
}
