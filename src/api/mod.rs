//! Hyperliquid API clients and the collaborator traits the trading core uses.
//!
//! The core only sees [`MarketDataSource`], [`BalanceSource`] and
//! [`OrderSink`]; the concrete clients live behind them.

mod exchange_client;
mod info_client;
mod types;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::Candle;

pub use exchange_client::ExchangeClient;
pub use info_client::InfoClient;
pub use types::*;

pub const MAINNET_API_URL: &str = "https://api.hyperliquid.xyz";
pub const TESTNET_API_URL: &str = "https://api.hyperliquid-testnet.xyz";

/// Which Hyperliquid deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn api_url(&self) -> &'static str {
        match self {
            Network::Mainnet => MAINNET_API_URL,
            Network::Testnet => TESTNET_API_URL,
        }
    }

    /// `source` field of the signed agent payload.
    pub fn source(&self) -> &'static str {
        match self {
            Network::Mainnet => "a",
            Network::Testnet => "b",
        }
    }
}

/// Historical candles for an asset.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Candles in `[start_ms, end_ms]`, oldest first.
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Candle>>;
}

/// Account value used for sizing.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn fetch_balance(&self) -> Result<Decimal>;
}

/// Order execution.
#[async_trait]
pub trait OrderSink: Send + Sync {
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck>;
}

/// A marketable limit order produced by settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub is_buy: bool,
    pub quantity: Decimal,
    pub limit_price: Decimal,
    pub reduce_only: bool,
}

/// Exchange acknowledgement of an accepted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAck {
    pub order_id: Option<u64>,
    /// Size actually sent, after rounding to the coin's lot precision
    pub submitted_size: Decimal,
    pub filled_size: Option<Decimal>,
    pub avg_price: Option<Decimal>,
}
