//! Hyperliquid `/exchange` client for order placement.
//!
//! Orders are submitted as signed L1 actions:
//! - msgpack(action) ‖ nonce (u64 BE) ‖ vault flag is hashed into a connection id
//! - the connection id is signed as EIP-712 `Agent(string source,bytes32 connectionId)`
//!   under the `Exchange` domain (chain id 1337, zero verifying contract)

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::{Decimal, RoundingStrategy};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::types::*;
use super::{InfoClient, Network, OrderAck, OrderRequest, OrderSink};

/// Perp prices may carry at most `6 - szDecimals` decimals.
const MAX_PERP_DECIMALS: u32 = 6;

/// Perp prices may carry at most five significant figures (integers excepted).
const MAX_SIG_FIGS: u32 = 5;

/// Chain id used in the L1 action signing domain.
const SIGNING_CHAIN_ID: u64 = 1337;

/// Asset index and lot precision for one coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetInfo {
    pub index: u32,
    pub sz_decimals: u32,
}

/// Client for submitting signed orders.
pub struct ExchangeClient {
    http: Client,
    signer: PrivateKeySigner,
    info: Arc<InfoClient>,
    network: Network,
    assets: RwLock<HashMap<String, AssetInfo>>,
}

impl ExchangeClient {
    /// Create a new exchange client.
    ///
    /// # Arguments
    /// * `private_key` - Wallet private key (hex string, with or without 0x prefix)
    /// * `info` - Info client used to resolve asset indexes
    /// * `network` - Mainnet or testnet
    pub fn new(private_key: &str, info: Arc<InfoClient>, network: Network) -> Result<Self> {
        let pk = private_key.strip_prefix("0x").unwrap_or(private_key);
        let signer = PrivateKeySigner::from_str(pk).context("Invalid private key")?;

        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            signer,
            info,
            network,
            assets: RwLock::new(HashMap::new()),
        })
    }

    /// Get the signing wallet address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Resolve `coin` to its asset index, loading the universe on first use.
    pub async fn asset_info(&self, coin: &str) -> Result<AssetInfo> {
        if let Some(info) = self.assets.read().await.get(coin) {
            return Ok(*info);
        }

        let meta = self.info.get_meta().await.context("Failed to load asset metadata")?;
        let mut assets = self.assets.write().await;
        for (index, asset) in meta.universe.iter().enumerate() {
            assets.insert(
                asset.name.clone(),
                AssetInfo {
                    index: index as u32,
                    sz_decimals: asset.sz_decimals,
                },
            );
        }
        debug!(count = assets.len(), "Loaded asset metadata");

        assets
            .get(coin)
            .copied()
            .ok_or_else(|| anyhow!("Unknown coin: {}", coin))
    }

    /// Place a good-til-cancelled limit order.
    pub async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        let asset = self.asset_info(&order.symbol).await?;
        let wire = Self::order_wire(asset, order)?;
        let submitted_size = Self::lot_size(order.quantity, asset.sz_decimals)?;
        let action = OrderAction {
            action_type: "order".to_string(),
            orders: vec![wire],
            grouping: "na".to_string(),
        };

        let nonce = Utc::now().timestamp_millis() as u64;
        let signature = self.sign_l1_action(&action, nonce).await?;

        let body = ExchangeRequest {
            action: &action,
            nonce,
            signature,
            vault_address: None,
        };

        let url = format!("{}/exchange", self.network.api_url());
        let resp = self.http.post(&url).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("Order placement failed: {} - {}", status, text);
        }

        let envelope: ExchangeResponse =
            resp.json().await.context("Failed to parse order response")?;
        Self::parse_ack(envelope, submitted_size)
    }

    /// Build the wire form of `order` for `asset`.
    fn order_wire(asset: AssetInfo, order: &OrderRequest) -> Result<OrderWire> {
        Ok(OrderWire {
            a: asset.index,
            b: order.is_buy,
            p: Self::price_to_wire(order.limit_price, asset.sz_decimals)?,
            s: Self::size_to_wire(order.quantity, asset.sz_decimals)?,
            r: order.reduce_only,
            t: OrderTypeWire {
                limit: LimitWire { tif: "Gtc".to_string() },
            },
            c: Some(format!("0x{}", uuid::Uuid::new_v4().simple())),
        })
    }

    /// Interpret the response envelope of a single-order action.
    fn parse_ack(envelope: ExchangeResponse, submitted_size: Decimal) -> Result<OrderAck> {
        if envelope.status != "ok" {
            bail!("Exchange rejected action: {}", envelope.response);
        }

        let body: OrderResponseBody = serde_json::from_value(envelope.response)
            .context("Unexpected order response shape")?;
        let status = body
            .data
            .and_then(|d| d.statuses.into_iter().next())
            .ok_or_else(|| anyhow!("Order response carried no status"))?;

        match status {
            OrderStatusWire::Resting(r) => {
                info!(oid = r.oid, "Order resting");
                Ok(OrderAck {
                    order_id: Some(r.oid),
                    submitted_size,
                    filled_size: None,
                    avg_price: None,
                })
            }
            OrderStatusWire::Filled(f) => {
                info!(oid = f.oid, size = %f.total_sz, avg_px = %f.avg_px, "Order filled");
                Ok(OrderAck {
                    order_id: Some(f.oid),
                    submitted_size,
                    filled_size: Some(f.total_sz),
                    avg_price: Some(f.avg_px),
                })
            }
            OrderStatusWire::Error(msg) => Err(anyhow!("Order rejected: {}", msg)),
        }
    }

    /// Sign an L1 action.
    async fn sign_l1_action(&self, action: &OrderAction, nonce: u64) -> Result<SignatureWire> {
        let connection_id = Self::action_hash(action, nonce)?;
        let digest = Self::signing_digest(self.network.source(), connection_id);

        let signature = self
            .signer
            .sign_hash(&digest)
            .await
            .context("Failed to sign action")?;

        let bytes = signature.as_bytes();
        let v = if bytes[64] < 27 { bytes[64] + 27 } else { bytes[64] };
        Ok(SignatureWire {
            r: format!("0x{}", hex::encode(&bytes[..32])),
            s: format!("0x{}", hex::encode(&bytes[32..64])),
            v,
        })
    }

    /// keccak256(msgpack(action) ‖ nonce ‖ 0x00), the action's connection id.
    fn action_hash(action: &OrderAction, nonce: u64) -> Result<B256> {
        let mut data = rmp_serde::to_vec_named(action).context("Failed to encode action")?;
        data.extend_from_slice(&nonce.to_be_bytes());
        // No vault address
        data.push(0x00);
        Ok(keccak256(&data))
    }

    /// Final EIP-712 digest: keccak256("\x19\x01" ‖ domainSeparator ‖ structHash).
    fn signing_digest(source: &str, connection_id: B256) -> B256 {
        let type_hash = keccak256(b"Agent(string source,bytes32 connectionId)");

        let mut encoded = Vec::with_capacity(96);
        encoded.extend_from_slice(type_hash.as_slice());
        encoded.extend_from_slice(keccak256(source.as_bytes()).as_slice());
        encoded.extend_from_slice(connection_id.as_slice());
        let struct_hash = keccak256(&encoded);

        let mut message = vec![0x19, 0x01];
        message.extend_from_slice(&Self::domain_separator());
        message.extend_from_slice(struct_hash.as_slice());
        keccak256(&message)
    }

    /// EIP-712 domain separator for L1 actions.
    fn domain_separator() -> [u8; 32] {
        let type_hash = keccak256(
            b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
        );

        let mut encoded = Vec::with_capacity(160);
        encoded.extend_from_slice(type_hash.as_slice());
        encoded.extend_from_slice(keccak256(b"Exchange").as_slice());
        encoded.extend_from_slice(keccak256(b"1").as_slice());
        encoded.extend_from_slice(&U256::from(SIGNING_CHAIN_ID).to_be_bytes::<32>());
        encoded.extend_from_slice(&Self::encode_address(Address::ZERO));

        keccak256(&encoded).0
    }

    /// Encode address to 32-byte padded format.
    fn encode_address(addr: Address) -> [u8; 32] {
        let mut buf = [0u8; 32];
        buf[12..].copy_from_slice(addr.as_slice());
        buf
    }

    /// Format a limit price: integers pass as is, otherwise five significant
    /// figures and at most `6 - sz_decimals` decimals.
    fn price_to_wire(price: Decimal, sz_decimals: u32) -> Result<String> {
        if price <= Decimal::ZERO {
            bail!("Limit price must be positive, got {}", price);
        }

        let rounded = if price >= Decimal::from(100_000) {
            price.round()
        } else {
            price
                .round_sf(MAX_SIG_FIGS)
                .ok_or_else(|| anyhow!("Cannot round price {}", price))?
                .round_dp(MAX_PERP_DECIMALS.saturating_sub(sz_decimals))
        };

        Ok(rounded.normalize().to_string())
    }

    /// Truncate a size to the coin's lot precision.
    fn lot_size(size: Decimal, sz_decimals: u32) -> Result<Decimal> {
        let truncated = size.round_dp_with_strategy(sz_decimals, RoundingStrategy::ToZero);
        if truncated <= Decimal::ZERO {
            bail!("Size {} is below the minimum lot ({} decimals)", size, sz_decimals);
        }
        Ok(truncated.normalize())
    }

    fn size_to_wire(size: Decimal, sz_decimals: u32) -> Result<String> {
        Ok(Self::lot_size(size, sz_decimals)?.to_string())
    }
}

/// Helper to create a client from environment variables.
impl ExchangeClient {
    /// Create from `HYPERLIQUID_PRIVATE_KEY`.
    pub fn from_env(info: Arc<InfoClient>, network: Network) -> Result<Self> {
        let private_key = std::env::var("HYPERLIQUID_PRIVATE_KEY")
            .context("HYPERLIQUID_PRIVATE_KEY not set")?;
        Self::new(&private_key, info, network)
    }
}

#[async_trait]
impl OrderSink for ExchangeClient {
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        self.place_order(order).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // Well-known development key; never funded.
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn make_action(size: &str) -> OrderAction {
        OrderAction {
            action_type: "order".to_string(),
            orders: vec![OrderWire {
                a: 0,
                b: true,
                p: "110250".to_string(),
                s: size.to_string(),
                r: false,
                t: OrderTypeWire { limit: LimitWire { tif: "Gtc".to_string() } },
                c: None,
            }],
            grouping: "na".to_string(),
        }
    }

    #[test]
    fn test_price_to_wire() {
        assert_eq!(ExchangeClient::price_to_wire(dec!(110250.00), 5).unwrap(), "110250");
        assert_eq!(ExchangeClient::price_to_wire(dec!(3456.789), 4).unwrap(), "3456.8");
        assert_eq!(ExchangeClient::price_to_wire(dec!(142.3456), 2).unwrap(), "142.35");
        assert_eq!(ExchangeClient::price_to_wire(dec!(0.123456), 0).unwrap(), "0.12346");
        assert_eq!(ExchangeClient::price_to_wire(dec!(95.00), 2).unwrap(), "95");
        assert!(ExchangeClient::price_to_wire(Decimal::ZERO, 2).is_err());
    }

    #[test]
    fn test_size_to_wire() {
        assert_eq!(ExchangeClient::size_to_wire(dec!(20.12345), 2).unwrap(), "20.12");
        assert_eq!(ExchangeClient::size_to_wire(dec!(0.0123), 5).unwrap(), "0.0123");
        assert!(ExchangeClient::size_to_wire(dec!(0.001), 2).is_err());
        assert_eq!(ExchangeClient::lot_size(dec!(15.8730), 2).unwrap(), dec!(15.87));
    }

    #[test]
    fn test_action_hash_depends_on_nonce_and_payload() {
        let a = ExchangeClient::action_hash(&make_action("0.01"), 1).unwrap();
        let b = ExchangeClient::action_hash(&make_action("0.01"), 1).unwrap();
        let c = ExchangeClient::action_hash(&make_action("0.01"), 2).unwrap();
        let d = ExchangeClient::action_hash(&make_action("0.02"), 1).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_digest_depends_on_network() {
        let id = ExchangeClient::action_hash(&make_action("0.01"), 1).unwrap();
        assert_ne!(
            ExchangeClient::signing_digest(Network::Mainnet.source(), id),
            ExchangeClient::signing_digest(Network::Testnet.source(), id)
        );
    }

    #[test]
    fn test_parse_ack() {
        let ok = ExchangeResponse {
            status: "ok".to_string(),
            response: serde_json::json!({
                "type": "order",
                "data": { "statuses": [{ "resting": { "oid": 42 } }] }
            }),
        };
        assert_eq!(ExchangeClient::parse_ack(ok, dec!(0.5)).unwrap().order_id, Some(42));

        let rejected = ExchangeResponse {
            status: "ok".to_string(),
            response: serde_json::json!({
                "type": "order",
                "data": { "statuses": [{ "error": "Insufficient margin" }] }
            }),
        };
        assert!(ExchangeClient::parse_ack(rejected, dec!(0.5)).is_err());

        let err = ExchangeResponse {
            status: "err".to_string(),
            response: serde_json::json!("User or API Wallet does not exist."),
        };
        assert!(ExchangeClient::parse_ack(err, dec!(0.5)).is_err());
    }

    #[tokio::test]
    async fn test_sign_l1_action() {
        let info = Arc::new(InfoClient::new(Network::Testnet).unwrap());
        let client = ExchangeClient::new(TEST_KEY, info, Network::Testnet).unwrap();

        assert_eq!(
            format!("{:?}", client.address()).to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );

        let sig = client.sign_l1_action(&make_action("0.01"), 1).await.unwrap();
        assert!(sig.v == 27 || sig.v == 28);
        assert_eq!(sig.r.len(), 66);
        assert_eq!(sig.s.len(), 66);

        // RFC 6979 signatures are deterministic
        let again = client.sign_l1_action(&make_action("0.01"), 1).await.unwrap();
        assert_eq!(sig, again);
    }

    #[test]
    fn test_order_wire() {
        let order = OrderRequest {
            symbol: "SOL".to_string(),
            is_buy: false,
            quantity: dec!(3.4567),
            limit_price: dec!(142.3456),
            reduce_only: true,
        };
        let wire = ExchangeClient::order_wire(AssetInfo { index: 5, sz_decimals: 2 }, &order).unwrap();
        assert_eq!(wire.a, 5);
        assert!(!wire.b);
        assert_eq!(wire.p, "142.35");
        assert_eq!(wire.s, "3.45");
        assert!(wire.r);
        assert_eq!(wire.c.as_ref().map(|c| c.len()), Some(34));
    }
}
