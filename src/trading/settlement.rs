//! Settlement: applies sized decisions to the ledger, the simulated balance,
//! and (in live mode) the exchange.

use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{BalanceSource, OrderRequest, OrderSink};
use crate::models::{PositionSide, PositionState};

use super::{Action, ClosedPosition, Decision, LedgerError, PositionLedger};

/// Errors from settling a decision.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("order for {symbol} failed: {reason}")]
    Execution { symbol: String, reason: String },

    #[error("refusing to open {symbol} with zero quantity")]
    ZeroQuantity { symbol: String },
}

/// Outcome of a successful settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled {
    Opened {
        symbol: String,
        side: PositionSide,
        price: Decimal,
        size: Decimal,
    },
    Closed(ClosedPosition),
}

/// Where balance comes from and where orders go.
pub enum AccountMode {
    /// In-memory balance, no orders leave the process
    Simulated { balance: Decimal },
    /// Balance fetched from the exchange, orders submitted before the ledger moves
    Live {
        balance_source: Arc<dyn BalanceSource>,
        order_sink: Arc<dyn OrderSink>,
    },
}

/// Settlement engine for one account.
pub struct Settlement {
    mode: AccountMode,
    slippage_pct: Decimal,
}

impl Settlement {
    pub fn simulated(initial_balance: Decimal, slippage_pct: Decimal) -> Self {
        Self {
            mode: AccountMode::Simulated { balance: initial_balance },
            slippage_pct,
        }
    }

    pub fn live(
        balance_source: Arc<dyn BalanceSource>,
        order_sink: Arc<dyn OrderSink>,
        slippage_pct: Decimal,
    ) -> Self {
        Self {
            mode: AccountMode::Live { balance_source, order_sink },
            slippage_pct,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.mode, AccountMode::Live { .. })
    }

    /// Current account balance. A failed live fetch reads as zero.
    pub async fn balance(&self) -> Decimal {
        match &self.mode {
            AccountMode::Simulated { balance } => *balance,
            AccountMode::Live { balance_source, .. } => match balance_source.fetch_balance().await {
                Ok(balance) => balance,
                Err(e) => {
                    warn!(error = %e, "Balance fetch failed, treating as zero");
                    Decimal::ZERO
                }
            },
        }
    }

    /// Build the exchange order for `action` against `position`.
    ///
    /// Buys are priced `slippage_pct` above `price` and sells below it so the
    /// limit order is immediately marketable.
    pub fn order_for(
        &self,
        action: Action,
        position: &PositionState,
        quantity: Decimal,
        price: Decimal,
    ) -> OrderRequest {
        let is_buy = match action {
            Action::OpenLong => true,
            Action::OpenShort => false,
            Action::Close => position.side() == PositionSide::Short,
        };
        let limit_price = if is_buy {
            price * (Decimal::ONE + self.slippage_pct)
        } else {
            price * (Decimal::ONE - self.slippage_pct)
        };

        OrderRequest {
            symbol: position.symbol().to_string(),
            is_buy,
            quantity,
            limit_price,
            reduce_only: action == Action::Close,
        }
    }

    /// Apply `decision` for `symbol` at `price` with `quantity`.
    ///
    /// Ledger preconditions are checked before anything is sent. In live mode
    /// the order is submitted first; if that fails the ledger is left as is.
    /// Live entries record the size the exchange reports, which may be smaller
    /// than `quantity` after lot rounding.
    pub async fn settle(
        &mut self,
        ledger: &mut PositionLedger,
        decision: &Decision,
        symbol: &str,
        price: Decimal,
        quantity: Decimal,
    ) -> Result<Settled, SettlementError> {
        let position = match decision.action {
            Action::OpenLong | Action::OpenShort => ledger.check_can_open(symbol)?,
            Action::Close => ledger.check_can_close(symbol)?,
        };

        if decision.action.is_open() && quantity <= Decimal::ZERO {
            return Err(SettlementError::ZeroQuantity { symbol: symbol.to_string() });
        }

        let mut size = quantity;
        if let AccountMode::Live { order_sink, .. } = &self.mode {
            let order = self.order_for(decision.action, position, quantity, price);
            let ack = order_sink
                .submit_order(&order)
                .await
                .map_err(|e| SettlementError::Execution {
                    symbol: symbol.to_string(),
                    reason: format!("{:#}", e),
                })?;
            info!(
                symbol = %symbol,
                order_id = ?ack.order_id,
                is_buy = order.is_buy,
                size = %ack.submitted_size,
                limit = %order.limit_price,
                avg_px = ?ack.avg_price,
                "Order accepted"
            );
            size = match ack.filled_size {
                Some(filled) if filled > Decimal::ZERO => filled,
                _ => ack.submitted_size,
            };
        }

        let settled = match decision.action {
            Action::OpenLong => {
                ledger.open_long(symbol, price, size)?;
                Settled::Opened {
                    symbol: symbol.to_string(),
                    side: PositionSide::Long,
                    price,
                    size,
                }
            }
            Action::OpenShort => {
                ledger.open_short(symbol, price, size)?;
                Settled::Opened {
                    symbol: symbol.to_string(),
                    side: PositionSide::Short,
                    price,
                    size,
                }
            }
            Action::Close => {
                let closed = ledger.close(symbol, price)?;
                if let AccountMode::Simulated { balance } = &mut self.mode {
                    *balance += closed.realized_pnl;
                }
                Settled::Closed(closed)
            }
        };

        Ok(settled)
    }
}
