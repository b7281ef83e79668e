//! Liqui API payloads, as the venue sends them.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;

/// `GET /3/ticker/<pairs>` entry.
///
/// `buy` is the price a buyer pays (best ask), `sell` what a seller
/// receives (best bid).
#[derive(Debug, Clone, Deserialize)]
pub struct LiquiTicker {
    pub high: Decimal,
    pub low: Decimal,
    /// Volume in the base currency
    pub vol_cur: Decimal,
    pub last: Decimal,
    pub buy: Decimal,
    pub sell: Decimal,
}

/// `GET /3/depth/<pairs>` entry; levels are `[price, amount]`.
#[derive(Debug, Clone, Deserialize)]
pub struct LiquiDepth {
    #[serde(default)]
    pub asks: Vec<(Decimal, Decimal)>,
    #[serde(default)]
    pub bids: Vec<(Decimal, Decimal)>,
}

/// `GET /3/trades/<pair>` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct LiquiTrade {
    /// `ask` (taker sold) or `bid` (taker bought)
    #[serde(rename = "type")]
    pub kind: String,
    pub price: Decimal,
    pub amount: Decimal,
    pub tid: u64,
    pub timestamp: i64,
}

/// `GET /3/info`.
#[derive(Debug, Clone, Deserialize)]
pub struct LiquiInfo {
    pub server_time: i64,
    #[serde(default)]
    pub pairs: HashMap<String, LiquiPairInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiquiPairInfo {
    pub decimal_places: u32,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub min_amount: Decimal,
    #[serde(default)]
    pub hidden: u8,
    pub fee: Decimal,
}

// =============================================================================
// Private (`tapi`) results
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LiquiRights {
    #[serde(default)]
    pub info: u8,
    #[serde(default)]
    pub trade: u8,
    #[serde(default)]
    pub withdraw: u8,
}

/// `getInfo`
#[derive(Debug, Clone, Deserialize)]
pub struct LiquiAccountInfo {
    #[serde(default)]
    pub funds: HashMap<String, Decimal>,
    pub rights: Option<LiquiRights>,
    pub transaction_count: Option<u64>,
    pub open_orders: Option<u64>,
    pub server_time: Option<i64>,
}

/// `Trade`; `order_id` is 0 when the order filled on submission.
#[derive(Debug, Clone, Deserialize)]
pub struct LiquiTradeResult {
    pub received: Decimal,
    pub remains: Decimal,
    pub order_id: u64,
    #[serde(default)]
    pub funds: HashMap<String, Decimal>,
}

/// `ActiveOrders` / `OrderInfo` entry, keyed by order id in the payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LiquiOrder {
    pub pair: String,
    #[serde(rename = "type")]
    pub side: String,
    /// Only present on `OrderInfo`
    pub start_amount: Option<Decimal>,
    pub amount: Decimal,
    pub rate: Decimal,
    pub timestamp_created: i64,
    pub status: i32,
}

/// `CancelOrder`
#[derive(Debug, Clone, Deserialize)]
pub struct LiquiCancelResult {
    pub order_id: u64,
}

/// `TradeHistory` entry, keyed by trade id in the payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LiquiHistoryEntry {
    pub pair: String,
    #[serde(rename = "type")]
    pub side: String,
    pub amount: Decimal,
    pub rate: Decimal,
    pub order_id: u64,
    #[serde(default)]
    pub is_your_order: u8,
    pub timestamp: i64,
}

/// `WithdrawCoin`
#[derive(Debug, Clone, Deserialize)]
pub struct LiquiWithdrawResult {
    #[serde(rename = "tId")]
    pub transaction_id: serde_json::Value,
    #[serde(rename = "amountSent")]
    pub amount_sent: Decimal,
    #[serde(default)]
    pub funds: HashMap<String, Decimal>,
}
