//! Wire types for the Hyperliquid `/info` and `/exchange` endpoints.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==================== /info ====================

/// Request body for `POST /info`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InfoRequest {
    CandleSnapshot { req: CandleRequest },
    ClearinghouseState { user: String },
    Meta,
}

/// Candle range query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandleRequest {
    pub coin: String,
    pub interval: String,
    pub start_time: i64,
    pub end_time: i64,
}

/// Candle from the `candleSnapshot` query. Prices arrive as strings.
#[derive(Debug, Clone, Deserialize)]
pub struct CandleResponse {
    /// Open time (ms)
    pub t: i64,
    pub o: Decimal,
    pub c: Decimal,
    pub h: Decimal,
    pub l: Decimal,
    #[serde(default)]
    pub v: Decimal,
}

/// Perp account summary from the `clearinghouseState` query.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearinghouseStateResponse {
    pub margin_summary: MarginSummary,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginSummary {
    pub account_value: Decimal,
}

/// Perp universe from the `meta` query. An asset's index is its position here.
#[derive(Debug, Clone, Deserialize)]
pub struct MetaResponse {
    pub universe: Vec<AssetMeta>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMeta {
    pub name: String,
    pub sz_decimals: u32,
}

// ==================== /exchange ====================

/// `order` action. Field order matters: the msgpack encoding is hashed.
#[derive(Debug, Clone, Serialize)]
pub struct OrderAction {
    #[serde(rename = "type")]
    pub action_type: String,
    pub orders: Vec<OrderWire>,
    pub grouping: String,
}

/// A single order inside an `order` action.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWire {
    /// Asset index
    pub a: u32,
    /// Is buy
    pub b: bool,
    /// Limit price
    pub p: String,
    /// Size
    pub s: String,
    /// Reduce only
    pub r: bool,
    /// Order type
    pub t: OrderTypeWire,
    /// Client order id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderTypeWire {
    pub limit: LimitWire,
}

#[derive(Debug, Clone, Serialize)]
pub struct LimitWire {
    pub tif: String,
}

/// ECDSA signature in the `{r, s, v}` form the exchange expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureWire {
    pub r: String,
    pub s: String,
    pub v: u8,
}

/// Request body for `POST /exchange`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRequest<'a> {
    pub action: &'a OrderAction,
    pub nonce: u64,
    pub signature: SignatureWire,
    pub vault_address: Option<String>,
}

/// Envelope of every `/exchange` response. `response` is a string on error.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeResponse {
    pub status: String,
    #[serde(default)]
    pub response: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponseBody {
    pub data: Option<OrderResponseData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponseData {
    pub statuses: Vec<OrderStatusWire>,
}

/// Per-order status inside an accepted `order` action.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderStatusWire {
    Resting(RestingStatus),
    Filled(FilledStatus),
    Error(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestingStatus {
    pub oid: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilledStatus {
    pub total_sz: Decimal,
    pub avg_px: Decimal,
    pub oid: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_info_request_shape() {
        let req = InfoRequest::CandleSnapshot {
            req: CandleRequest {
                coin: "BTC".to_string(),
                interval: "1m".to_string(),
                start_time: 1,
                end_time: 2,
            },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "candleSnapshot");
        assert_eq!(json["req"]["startTime"], 1);

        let json = serde_json::to_value(InfoRequest::Meta).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "meta" }));
    }

    #[test]
    fn test_parse_candle() {
        let raw = r#"{"t":1700000000000,"T":1700000059999,"s":"BTC","i":"1m",
            "o":"37000.5","c":"37010.0","h":"37020","l":"36990","v":"12.3","n":42}"#;
        let candle: CandleResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(candle.t, 1700000000000);
        assert_eq!(candle.c, dec!(37010.0));
        assert_eq!(candle.v, dec!(12.3));
    }

    #[test]
    fn test_parse_account_and_meta() {
        let raw = r#"{"marginSummary":{"accountValue":"1043.25","totalNtlPos":"0.0",
            "totalMarginUsed":"0.0"},"withdrawable":"1043.25","assetPositions":[]}"#;
        let state: ClearinghouseStateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(state.margin_summary.account_value, dec!(1043.25));

        let raw = r#"{"universe":[{"name":"BTC","szDecimals":5,"maxLeverage":40},
            {"name":"SOL","szDecimals":2,"maxLeverage":20}]}"#;
        let meta: MetaResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(meta.universe[1].name, "SOL");
        assert_eq!(meta.universe[1].sz_decimals, 2);
    }

    #[test]
    fn test_parse_order_statuses() {
        let raw = r#"{"data":{"statuses":[
            {"resting":{"oid":1}},
            {"filled":{"totalSz":"0.02","avgPx":"1891.4","oid":2}},
            {"error":"Order must have minimum value of $10."}
        ]}}"#;
        let body: OrderResponseBody = serde_json::from_str(raw).unwrap();
        let statuses = body.data.unwrap().statuses;
        assert!(matches!(statuses[0], OrderStatusWire::Resting(RestingStatus { oid: 1 })));
        assert!(matches!(&statuses[1], OrderStatusWire::Filled(f) if f.avg_px == dec!(1891.4)));
        assert!(matches!(&statuses[2], OrderStatusWire::Error(msg) if msg.contains("minimum")));
    }
}
