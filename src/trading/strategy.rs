//! Signal evaluation with risk exits.
//!
//! Rules run in strict priority order and the first match wins:
//! 1. Stop loss (open positions)
//! 2. Take profit (open positions)
//! 3. Trend entry (flat positions only)
//! 4. Trend reversal exit (open positions)

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::indicators::{ema, rsi};
use crate::models::{Candle, PositionSide, PositionState};

use super::TradingConfig;

/// What to do with an asset this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    OpenLong,
    OpenShort,
    Close,
}

impl Action {
    pub fn is_open(&self) -> bool {
        matches!(self, Action::OpenLong | Action::OpenShort)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::OpenLong => "OPEN_LONG",
            Action::OpenShort => "OPEN_SHORT",
            Action::Close => "CLOSE",
        };
        f.write_str(s)
    }
}

/// Why an action fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalReason {
    StopLoss,
    TakeProfit,
    BullishTrend,
    BearishTrend,
    TrendReversal,
}

impl fmt::Display for SignalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalReason::StopLoss => "stop-loss",
            SignalReason::TakeProfit => "take-profit",
            SignalReason::BullishTrend => "bullish-trend",
            SignalReason::BearishTrend => "bearish-trend",
            SignalReason::TrendReversal => "trend-reversal",
        };
        f.write_str(s)
    }
}

/// An action together with the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub reason: SignalReason,
    /// Unrealized return at decision time, for exits
    pub return_pct: Option<Decimal>,
}

impl Decision {
    fn open(action: Action, reason: SignalReason) -> Self {
        Self { action, reason, return_pct: None }
    }

    fn close(reason: SignalReason, return_pct: Option<Decimal>) -> Self {
        Self { action: Action::Close, reason, return_pct }
    }
}

/// Indicators for one asset at one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub price: Decimal,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub rsi: f64,
}

/// Signal evaluator.
pub struct Strategy {
    config: TradingConfig,
}

impl Strategy {
    /// Create a new strategy with configuration.
    pub fn new(config: TradingConfig) -> Self {
        Self { config }
    }

    /// Get strategy configuration.
    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    /// Build a snapshot from candles, oldest first.
    ///
    /// Returns `None` when fewer than `min_history` candles are available, so
    /// indicator sentinels never reach [`Strategy::evaluate`].
    pub fn snapshot(&self, symbol: &str, candles: &[Candle]) -> Option<MarketSnapshot> {
        if candles.len() < self.config.min_history {
            debug!(
                symbol = %symbol,
                candles = candles.len(),
                required = self.config.min_history,
                "Not enough history"
            );
            return None;
        }

        let price = candles.last()?.close;
        let closes: Vec<f64> = candles
            .iter()
            .map(|c| c.close.to_f64().unwrap_or(0.0))
            .collect();

        Some(MarketSnapshot {
            symbol: symbol.to_string(),
            price,
            ema_fast: ema(&closes, self.config.ema_fast_period),
            ema_slow: ema(&closes, self.config.ema_slow_period),
            rsi: rsi(&closes, self.config.rsi_period),
        })
    }

    /// Decide the next action for `position` given `snapshot`.
    pub fn evaluate(&self, position: &PositionState, snapshot: &MarketSnapshot) -> Option<Decision> {
        if let Some(return_pct) = position.return_pct(snapshot.price) {
            if return_pct <= -self.config.stop_loss_pct {
                warn!(
                    symbol = %snapshot.symbol,
                    return_pct = %return_pct,
                    stop = %self.config.stop_loss_pct,
                    "Stop loss triggered"
                );
                return Some(Decision::close(SignalReason::StopLoss, Some(return_pct)));
            }

            if return_pct >= self.config.take_profit_pct {
                info!(
                    symbol = %snapshot.symbol,
                    return_pct = %return_pct,
                    target = %self.config.take_profit_pct,
                    "Take profit triggered"
                );
                return Some(Decision::close(SignalReason::TakeProfit, Some(return_pct)));
            }
        }

        match position.side() {
            PositionSide::None => self.entry_signal(snapshot),
            PositionSide::Long if snapshot.ema_fast < snapshot.ema_slow => {
                info!(symbol = %snapshot.symbol, "Trend reversed against long");
                Some(Decision::close(
                    SignalReason::TrendReversal,
                    position.return_pct(snapshot.price),
                ))
            }
            PositionSide::Short if snapshot.ema_fast > snapshot.ema_slow => {
                info!(symbol = %snapshot.symbol, "Trend reversed against short");
                Some(Decision::close(
                    SignalReason::TrendReversal,
                    position.return_pct(snapshot.price),
                ))
            }
            _ => None,
        }
    }

    /// Entry rule for a flat asset.
    ///
    /// RSI at or beyond the overbought/oversold bands suppresses entries even
    /// when the trend condition holds.
    fn entry_signal(&self, snapshot: &MarketSnapshot) -> Option<Decision> {
        let c = &self.config;
        let bullish = snapshot.ema_fast > snapshot.ema_slow
            && snapshot.rsi > c.rsi_midline
            && snapshot.rsi < c.rsi_overbought;
        let bearish = snapshot.ema_fast < snapshot.ema_slow
            && snapshot.rsi < c.rsi_midline
            && snapshot.rsi > c.rsi_oversold;

        if bullish {
            Some(Decision::open(Action::OpenLong, SignalReason::BullishTrend))
        } else if bearish {
            Some(Decision::open(Action::OpenShort, SignalReason::BearishTrend))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    use crate::models::AssetConfig;
    use crate::trading::PositionLedger;

    fn make_snapshot(price: Decimal, ema_fast: f64, ema_slow: f64, rsi: f64) -> MarketSnapshot {
        MarketSnapshot {
            symbol: "BTC".to_string(),
            price,
            ema_fast,
            ema_slow,
            rsi,
        }
    }

    fn make_ledger() -> PositionLedger {
        PositionLedger::new(&[AssetConfig { symbol: "BTC".to_string(), weight: dec!(0.4) }])
    }

    fn flat() -> PositionState {
        make_ledger().get("BTC").unwrap().clone()
    }

    fn long_at(entry: Decimal) -> PositionState {
        let mut ledger = make_ledger();
        ledger.open_long("BTC", entry, dec!(1)).unwrap();
        ledger.get("BTC").unwrap().clone()
    }

    fn short_at(entry: Decimal) -> PositionState {
        let mut ledger = make_ledger();
        ledger.open_short("BTC", entry, dec!(1)).unwrap();
        ledger.get("BTC").unwrap().clone()
    }

    fn make_candles(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                Candle::from_close(
                    start + Duration::minutes(i as i64),
                    Decimal::try_from(c).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_bullish_entry() {
        let strategy = Strategy::new(TradingConfig::default());
        let decision = strategy
            .evaluate(&flat(), &make_snapshot(dec!(100), 110.0, 100.0, 60.0))
            .unwrap();
        assert_eq!(decision.action, Action::OpenLong);
        assert_eq!(decision.reason, SignalReason::BullishTrend);
    }

    #[test]
    fn test_bearish_entry() {
        let strategy = Strategy::new(TradingConfig::default());
        let decision = strategy
            .evaluate(&flat(), &make_snapshot(dec!(100), 95.0, 100.0, 30.0))
            .unwrap();
        assert_eq!(decision.action, Action::OpenShort);
    }

    #[test]
    fn test_rsi_bands_suppress_entries() {
        let strategy = Strategy::new(TradingConfig::default());

        // Overbought and the exact band edges
        for rsi in [85.0, 92.0, 50.0] {
            assert_eq!(
                strategy.evaluate(&flat(), &make_snapshot(dec!(100), 110.0, 100.0, rsi)),
                None,
                "long at rsi {rsi}"
            );
        }
        for rsi in [15.0, 5.0, 50.0] {
            assert_eq!(
                strategy.evaluate(&flat(), &make_snapshot(dec!(100), 90.0, 100.0, rsi)),
                None,
                "short at rsi {rsi}"
            );
        }
    }

    #[test]
    fn test_equal_emas_do_nothing() {
        let strategy = Strategy::new(TradingConfig::default());
        assert_eq!(
            strategy.evaluate(&flat(), &make_snapshot(dec!(100), 100.0, 100.0, 60.0)),
            None
        );
        assert_eq!(
            strategy.evaluate(&long_at(dec!(100)), &make_snapshot(dec!(100), 100.0, 100.0, 60.0)),
            None
        );
    }

    #[test]
    fn test_stop_loss_beats_trend() {
        let strategy = Strategy::new(TradingConfig::default());
        // Trend still favors the long
        let decision = strategy
            .evaluate(&long_at(dec!(100)), &make_snapshot(dec!(99.5), 110.0, 100.0, 60.0))
            .unwrap();
        assert_eq!(decision.action, Action::Close);
        assert_eq!(decision.reason, SignalReason::StopLoss);
        assert_eq!(decision.return_pct, Some(dec!(-0.005)));
    }

    #[test]
    fn test_stop_loss_boundary_is_inclusive() {
        let strategy = Strategy::new(TradingConfig::default());
        let decision = strategy
            .evaluate(&long_at(dec!(100)), &make_snapshot(dec!(99.6), 110.0, 100.0, 60.0))
            .unwrap();
        assert_eq!(decision.reason, SignalReason::StopLoss);
    }

    #[test]
    fn test_take_profit_on_short() {
        let strategy = Strategy::new(TradingConfig::default());
        let decision = strategy
            .evaluate(&short_at(dec!(100)), &make_snapshot(dec!(99.2), 90.0, 100.0, 30.0))
            .unwrap();
        assert_eq!(decision.action, Action::Close);
        assert_eq!(decision.reason, SignalReason::TakeProfit);
    }

    #[test]
    fn test_trend_reversal_exits() {
        let strategy = Strategy::new(TradingConfig::default());

        let decision = strategy
            .evaluate(&long_at(dec!(100)), &make_snapshot(dec!(100.1), 99.0, 100.0, 40.0))
            .unwrap();
        assert_eq!(decision.reason, SignalReason::TrendReversal);

        let decision = strategy
            .evaluate(&short_at(dec!(100)), &make_snapshot(dec!(99.9), 101.0, 100.0, 60.0))
            .unwrap();
        assert_eq!(decision.reason, SignalReason::TrendReversal);
    }

    #[test]
    fn test_open_position_never_reenters() {
        let strategy = Strategy::new(TradingConfig::default());
        // Long with the trend still bullish and inside both exit bands
        assert_eq!(
            strategy.evaluate(&long_at(dec!(100)), &make_snapshot(dec!(100.2), 110.0, 100.0, 60.0)),
            None
        );
    }

    #[test]
    fn test_stop_and_target_are_exclusive() {
        let strategy = Strategy::new(TradingConfig::default());
        let config = strategy.config();
        for position in [long_at(dec!(100)), short_at(dec!(100))] {
            for cents in 9000..11000 {
                let price = Decimal::new(cents, 2);
                let r = position.return_pct(price).unwrap();
                let stop = r <= -config.stop_loss_pct;
                let target = r >= config.take_profit_pct;
                assert!(!(stop && target));
            }
        }
    }

    #[test]
    fn test_snapshot_requires_history_floor() {
        let strategy = Strategy::new(TradingConfig::default());
        let closes: Vec<f64> = (0..29).map(|i| 100.0 + i as f64).collect();
        assert!(strategy.snapshot("BTC", &make_candles(&closes)).is_none());
        assert!(strategy.snapshot("BTC", &[]).is_none());
    }

    #[test]
    fn test_snapshot_on_uptrend() {
        let strategy = Strategy::new(TradingConfig::default());
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let snapshot = strategy.snapshot("BTC", &make_candles(&closes)).unwrap();

        assert_eq!(snapshot.price, dec!(129));
        assert!(snapshot.ema_fast > snapshot.ema_slow);
        assert_eq!(snapshot.rsi, 100.0);

        // RSI of 100 is overbought, so no entry despite the trend
        assert_eq!(strategy.evaluate(&flat(), &snapshot), None);
    }
}
