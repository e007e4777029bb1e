//! Hyperliquid `/info` client: candles, account state, and asset metadata.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::models::Candle;

use super::types::*;
use super::{BalanceSource, MarketDataSource, Network};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the read-only `/info` endpoint.
pub struct InfoClient {
    client: Client,
    base_url: String,
    user: Option<String>,
}

impl InfoClient {
    /// Create a client for `network`.
    pub fn new(network: Network) -> Result<Self> {
        Self::with_base_url(network.api_url().to_string())
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(base_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            user: None,
        })
    }

    /// Account whose value backs [`BalanceSource`].
    pub fn with_user(mut self, address: impl Into<String>) -> Self {
        self.user = Some(address.into());
        self
    }

    async fn post<T: DeserializeOwned>(&self, request: &InfoRequest) -> Result<T> {
        let url = format!("{}/info", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .context("Failed to reach info endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Info request failed: {} - {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse info response")
    }

    /// Fetch candles for `coin` in `[start_ms, end_ms]`, oldest first.
    pub async fn get_candles(
        &self,
        coin: &str,
        interval: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Candle>> {
        debug!(coin = %coin, interval = %interval, "Fetching candles");

        let request = InfoRequest::CandleSnapshot {
            req: CandleRequest {
                coin: coin.to_string(),
                interval: interval.to_string(),
                start_time: start_ms,
                end_time: end_ms,
            },
        };
        let items: Vec<CandleResponse> = self.post(&request).await?;

        let mut candles: Vec<Candle> = items
            .into_iter()
            .filter_map(|c| {
                let Some(open_time) = Utc.timestamp_millis_opt(c.t).single() else {
                    warn!(coin = %coin, t = c.t, "Dropping candle with bad timestamp");
                    return None;
                };
                Some(Candle {
                    open_time,
                    open: c.o,
                    high: c.h,
                    low: c.l,
                    close: c.c,
                    volume: c.v,
                })
            })
            .collect();
        candles.sort_by_key(|c| c.open_time);

        Ok(candles)
    }

    /// Fetch the perp account value for `user`.
    pub async fn get_account_value(&self, user: &str) -> Result<Decimal> {
        debug!(user = %user, "Fetching account value");

        let request = InfoRequest::ClearinghouseState { user: user.to_string() };
        let state: ClearinghouseStateResponse = self.post(&request).await?;

        Ok(state.margin_summary.account_value)
    }

    /// Fetch the perp universe.
    pub async fn get_meta(&self) -> Result<MetaResponse> {
        self.post(&InfoRequest::Meta).await
    }
}

#[async_trait]
impl MarketDataSource for InfoClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Candle>> {
        self.get_candles(symbol, interval, start_ms, end_ms).await
    }
}

#[async_trait]
impl BalanceSource for InfoClient {
    async fn fetch_balance(&self) -> Result<Decimal> {
        let user = self
            .user
            .as_deref()
            .context("No account address configured for balance queries")?;
        self.get_account_value(user).await
    }
}
