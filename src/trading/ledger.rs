//! Position ledger: the single owner of every asset's position record.

use std::collections::HashMap;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use crate::models::{AssetConfig, PositionSide, PositionState};

/// Errors from ledger transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("invalid state for {symbol}: cannot {operation} while position is {side}")]
    InvalidState {
        symbol: String,
        side: PositionSide,
        operation: &'static str,
    },

    #[error("invalid fill for {symbol}: price {price}, size {size}")]
    InvalidFill {
        symbol: String,
        price: Decimal,
        size: Decimal,
    },

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),
}

/// Result of closing a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedPosition {
    pub symbol: String,
    pub side: PositionSide,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub size: Decimal,
    pub realized_pnl: Decimal,
}

impl ClosedPosition {
    /// Realized return as a fraction of entry notional.
    pub fn return_pct(&self) -> Decimal {
        let notional = self.entry_price * self.size;
        if notional.is_zero() {
            return Decimal::ZERO;
        }
        self.realized_pnl / notional
    }
}

/// One position record per configured asset, kept in configuration order.
#[derive(Debug, Clone)]
pub struct PositionLedger {
    order: Vec<String>,
    positions: HashMap<String, PositionState>,
}

impl PositionLedger {
    /// Create a ledger with every asset flat.
    pub fn new(assets: &[AssetConfig]) -> Self {
        let order: Vec<String> = assets.iter().map(|a| a.symbol.clone()).collect();
        let positions = order
            .iter()
            .map(|s| (s.clone(), PositionState::flat(s.clone())))
            .collect();
        Self { order, positions }
    }

    /// Current record for `symbol`.
    pub fn get(&self, symbol: &str) -> Result<&PositionState, LedgerError> {
        self.positions
            .get(symbol)
            .ok_or_else(|| LedgerError::UnknownSymbol(symbol.to_string()))
    }

    /// Records in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &PositionState> {
        self.order.iter().filter_map(|s| self.positions.get(s))
    }

    /// Number of non-flat positions.
    pub fn open_count(&self) -> usize {
        self.positions.values().filter(|p| !p.is_flat()).count()
    }

    pub fn open_long(&mut self, symbol: &str, price: Decimal, size: Decimal) -> Result<(), LedgerError> {
        self.open(symbol, PositionSide::Long, price, size)
    }

    pub fn open_short(&mut self, symbol: &str, price: Decimal, size: Decimal) -> Result<(), LedgerError> {
        self.open(symbol, PositionSide::Short, price, size)
    }

    /// Open a position on a flat asset.
    pub fn open(
        &mut self,
        symbol: &str,
        side: PositionSide,
        price: Decimal,
        size: Decimal,
    ) -> Result<(), LedgerError> {
        self.check_can_open(symbol)?;
        if side == PositionSide::None || price <= Decimal::ZERO || size <= Decimal::ZERO {
            return Err(LedgerError::InvalidFill {
                symbol: symbol.to_string(),
                price,
                size,
            });
        }

        self.positions
            .insert(symbol.to_string(), PositionState::open(symbol, side, price, size));

        debug!(symbol = %symbol, side = %side, price = %price, size = %size, "Position opened");
        Ok(())
    }

    /// Close an open position at `price`, returning the realized P&L.
    pub fn close(&mut self, symbol: &str, price: Decimal) -> Result<ClosedPosition, LedgerError> {
        let current = self.check_can_close(symbol)?.clone();

        let closed = ClosedPosition {
            symbol: symbol.to_string(),
            side: current.side(),
            entry_price: current.entry_price(),
            exit_price: price,
            size: current.size(),
            realized_pnl: current.pnl_at(price),
        };

        self.positions
            .insert(symbol.to_string(), PositionState::flat(symbol));

        debug!(symbol = %symbol, pnl = %closed.realized_pnl, "Position closed");
        Ok(closed)
    }

    /// Fails unless `symbol` is configured and flat.
    pub fn check_can_open(&self, symbol: &str) -> Result<&PositionState, LedgerError> {
        let current = self.get(symbol)?;
        if !current.is_flat() {
            return Err(LedgerError::InvalidState {
                symbol: symbol.to_string(),
                side: current.side(),
                operation: "open",
            });
        }
        Ok(current)
    }

    /// Fails unless `symbol` is configured and holds a position.
    pub fn check_can_close(&self, symbol: &str) -> Result<&PositionState, LedgerError> {
        let current = self.get(symbol)?;
        if current.is_flat() {
            return Err(LedgerError::InvalidState {
                symbol: symbol.to_string(),
                side: current.side(),
                operation: "close",
            });
        }
        Ok(current)
    }

    /// Sum of unrealized P&L across assets with a known price.
    pub fn unrealized_pnl(&self, prices: &HashMap<String, Decimal>) -> Decimal {
        self.iter()
            .filter_map(|p| prices.get(p.symbol()).map(|&price| p.pnl_at(price)))
            .sum()
    }
}
