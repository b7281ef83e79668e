//! Poloniex API payloads.

use rust_decimal::Decimal;
use serde::Deserialize;

/// `returnTicker` entry, keyed by `QUOTE_BASE` (e.g. `BTC_ETH`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoloniexTicker {
    pub last: Decimal,
    pub lowest_ask: Decimal,
    pub highest_bid: Decimal,
    pub base_volume: Decimal,
    #[serde(rename = "high24hr")]
    pub high_24hr: Decimal,
    #[serde(rename = "low24hr")]
    pub low_24hr: Decimal,
}

/// `returnOrderBook` entry; prices arrive as strings, amounts as numbers.
#[derive(Debug, Clone, Deserialize)]
pub struct PoloniexBook {
    #[serde(default)]
    pub asks: Vec<(Decimal, Decimal)>,
    #[serde(default)]
    pub bids: Vec<(Decimal, Decimal)>,
}
