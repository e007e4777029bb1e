//! Asset basket entry: a symbol and its capital weight.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One tradable asset and the fraction of capital allocated to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Exchange coin name (e.g., "BTC")
    pub symbol: String,

    /// Fraction of capital allocated to this asset (0 < weight <= 1)
    pub weight: Decimal,
}

impl AssetConfig {
    /// Create an asset entry, validating the weight.
    pub fn new(symbol: impl Into<String>, weight: Decimal) -> anyhow::Result<Self> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            bail!("Asset symbol must not be empty");
        }
        if weight <= Decimal::ZERO || weight > Decimal::ONE {
            bail!("Weight for {} must be in (0, 1], got {}", symbol, weight);
        }
        Ok(Self { symbol, weight })
    }
}

/// Parses `SYMBOL:WEIGHT`, e.g. `BTC:0.4`.
impl FromStr for AssetConfig {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (symbol, weight) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("Expected SYMBOL:WEIGHT, got '{}'", s))?;
        let weight = Decimal::from_str(weight.trim())
            .with_context(|| format!("Invalid weight in '{}'", s))?;
        Self::new(symbol.trim().to_uppercase(), weight)
    }
}

impl fmt::Display for AssetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.symbol, self.weight)
    }
}
