//! Per-asset position record.
//!
//! A `PositionState` is a value: it has no setters. The ledger replaces the
//! whole record on every transition, so `side`, `entry_price` and `size` can
//! never be observed half-updated.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    None,
    Long,
    Short,
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PositionSide::None => "NONE",
            PositionSide::Long => "LONG",
            PositionSide::Short => "SHORT",
        };
        f.write_str(s)
    }
}

/// Position held in one asset.
///
/// Invariant: `side == None` iff `size == 0` iff `entry_price == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionState {
    symbol: String,
    side: PositionSide,
    entry_price: Decimal,
    size: Decimal,
}

impl PositionState {
    /// A flat record.
    pub(crate) fn flat(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            side: PositionSide::None,
            entry_price: Decimal::ZERO,
            size: Decimal::ZERO,
        }
    }

    /// An open record. Callers guarantee `side != None`, `entry_price > 0`, `size > 0`.
    pub(crate) fn open(
        symbol: impl Into<String>,
        side: PositionSide,
        entry_price: Decimal,
        size: Decimal,
    ) -> Self {
        debug_assert!(side != PositionSide::None);
        debug_assert!(entry_price > Decimal::ZERO && size > Decimal::ZERO);
        Self {
            symbol: symbol.into(),
            side,
            entry_price,
            size,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> PositionSide {
        self.side
    }

    pub fn entry_price(&self) -> Decimal {
        self.entry_price
    }

    pub fn size(&self) -> Decimal {
        self.size
    }

    pub fn is_flat(&self) -> bool {
        self.side == PositionSide::None
    }

    /// Unrealized return as a fraction of entry price, signed by direction.
    ///
    /// LONG: `(price - entry) / entry`; SHORT: `(entry - price) / entry`.
    /// `None` when flat.
    pub fn return_pct(&self, price: Decimal) -> Option<Decimal> {
        if self.entry_price.is_zero() {
            return None;
        }
        match self.side {
            PositionSide::None => None,
            PositionSide::Long => Some((price - self.entry_price) / self.entry_price),
            PositionSide::Short => Some((self.entry_price - price) / self.entry_price),
        }
    }

    /// P&L if the position were closed at `price`. Zero when flat.
    pub fn pnl_at(&self, price: Decimal) -> Decimal {
        match self.side {
            PositionSide::None => Decimal::ZERO,
            PositionSide::Long => (price - self.entry_price) * self.size,
            PositionSide::Short => (self.entry_price - price) * self.size,
        }
    }

    /// Notional exposure at `price`.
    pub fn notional(&self, price: Decimal) -> Decimal {
        self.size * price
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.side {
            PositionSide::None => write!(f, "[flat]"),
            side => write!(f, "[{} {}] @{:.2}", side, self.size, self.entry_price),
        }
    }
}
