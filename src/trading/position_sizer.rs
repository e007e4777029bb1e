//! Position sizing: leveraged capital share per asset.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{AssetConfig, PositionState};

use super::{Action, TradingConfig};

/// Converts actions into order quantities.
pub struct PositionSizer {
    leverage: Decimal,
    size_decimals: u32,
}

impl PositionSizer {
    /// Create a new position sizer with given config.
    pub fn new(config: &TradingConfig) -> Self {
        Self {
            leverage: config.leverage,
            size_decimals: config.size_decimals,
        }
    }

    /// Quantity of the underlying for `action`.
    ///
    /// Entries use `balance * weight * leverage / price`, truncated to the
    /// configured precision. Exits always use the recorded position size so
    /// the exit matches the entry exactly.
    pub fn size_for(
        &self,
        action: Action,
        position: &PositionState,
        asset: &AssetConfig,
        balance: Decimal,
        price: Decimal,
    ) -> Decimal {
        match action {
            Action::Close => position.size(),
            Action::OpenLong | Action::OpenShort => {
                if price <= Decimal::ZERO || balance <= Decimal::ZERO {
                    return Decimal::ZERO;
                }
                let notional = balance * asset.weight * self.leverage;
                (notional / price)
                    .round_dp_with_strategy(self.size_decimals, RoundingStrategy::ToZero)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::trading::PositionLedger;

    fn btc() -> AssetConfig {
        AssetConfig { symbol: "BTC".to_string(), weight: dec!(0.4) }
    }

    #[test]
    fn test_entry_size() {
        let sizer = PositionSizer::new(&TradingConfig::default());
        let ledger = PositionLedger::new(&[btc()]);
        let flat = ledger.get("BTC").unwrap();

        let size = sizer.size_for(Action::OpenLong, flat, &btc(), dec!(1000), dec!(100));
        assert_eq!(size, dec!(20.0000));
    }

    #[test]
    fn test_entry_size_truncates() {
        let sizer = PositionSizer::new(&TradingConfig::default());
        let ledger = PositionLedger::new(&[btc()]);
        let flat = ledger.get("BTC").unwrap();

        // 2000 / 3 = 666.66666...
        let size = sizer.size_for(Action::OpenShort, flat, &btc(), dec!(1000), dec!(3));
        assert_eq!(size, dec!(666.6666));
    }

    #[test]
    fn test_exit_uses_recorded_size() {
        let sizer = PositionSizer::new(&TradingConfig::default());
        let mut ledger = PositionLedger::new(&[btc()]);
        ledger.open_long("BTC", dec!(100), dec!(20)).unwrap();
        let pos = ledger.get("BTC").unwrap();

        // Balance has changed since entry; exit size must not follow it
        let size = sizer.size_for(Action::Close, pos, &btc(), dec!(5000), dec!(90));
        assert_eq!(size, dec!(20));
    }

    #[test]
    fn test_zero_balance_sizes_nothing() {
        let sizer = PositionSizer::new(&TradingConfig::default());
        let ledger = PositionLedger::new(&[btc()]);
        let flat = ledger.get("BTC").unwrap();

        assert_eq!(
            sizer.size_for(Action::OpenLong, flat, &btc(), Decimal::ZERO, dec!(100)),
            Decimal::ZERO
        );
        assert_eq!(
            sizer.size_for(Action::OpenLong, flat, &btc(), dec!(1000), Decimal::ZERO),
            Decimal::ZERO
        );
    }
}
