//! Trading logic: ledger, signals, position sizing, settlement.

mod config;
mod ledger;
mod position_sizer;
mod settlement;
mod strategy;

pub use config::TradingConfig;
pub use ledger::{ClosedPosition, LedgerError, PositionLedger};
pub use position_sizer::PositionSizer;
pub use settlement::{Settled, Settlement, SettlementError};
pub use strategy::{Action, Decision, MarketSnapshot, SignalReason, Strategy};
