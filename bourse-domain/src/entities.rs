//! Domain Entities
//!
//! Orders, balances and account data returned by private exchange calls,
//! plus public trades and exchange metadata.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::value_objects::{CurrencyPair, OrderSide};

// =============================================================================
// Orders
// =============================================================================

/// Exchange-assigned order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(String);

impl OrderId {
    /// Wrap an exchange order id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Resting on the book, nothing filled yet
    Open,
    /// Resting on the book with some amount filled
    PartiallyFilled,
    /// Completely filled
    Filled,
    /// Cancelled (possibly after a partial fill)
    Cancelled,
}

impl OrderStatus {
    /// Whether the order can still trade.
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Open | OrderStatus::PartiallyFilled)
    }
}

/// An order as known to the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Exchange order id
    pub id: OrderId,
    /// Trading pair
    pub pair: CurrencyPair,
    /// Buy or sell
    pub side: OrderSide,
    /// Requested amount (base currency)
    pub amount: Decimal,
    /// Requested limit price
    pub price: Decimal,
    /// Current status
    pub status: OrderStatus,
    /// When the order was created
    pub created_at: Option<DateTime<Utc>>,
}

/// Result of submitting an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedOrder {
    /// Exchange order id; `None` when the order filled immediately
    pub order_id: Option<OrderId>,
    /// Amount filled on submission
    pub received: Decimal,
    /// Amount left resting
    pub remains: Decimal,
    /// Balances after the trade
    pub balances: AccountBalance,
}

// =============================================================================
// Balances
// =============================================================================

/// Available amount per currency. Absent currencies are zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance(BTreeMap<String, Decimal>);

impl AccountBalance {
    /// Create an empty balance sheet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the available amount for a currency (code is uppercased).
    pub fn set(&mut self, currency: &str, amount: Decimal) {
        self.0.insert(currency.to_ascii_uppercase(), amount);
    }

    /// Available amount, zero when the currency is absent.
    pub fn available(&self, currency: &str) -> Decimal {
        self.0
            .get(&currency.to_ascii_uppercase())
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Currencies with a non-zero balance.
    pub fn non_zero(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.0
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(code, amount)| (code.as_str(), *amount))
    }

    /// Number of currencies listed.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no currency is listed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Decimal)> for AccountBalance {
    fn from_iter<I: IntoIterator<Item = (String, Decimal)>>(iter: I) -> Self {
        let mut balance = Self::new();
        for (code, amount) in iter {
            balance.set(&code, amount);
        }
        balance
    }
}

/// API key permissions reported by the exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRights {
    /// Key may read account info
    pub info: bool,
    /// Key may trade
    pub trade: bool,
    /// Key may withdraw
    pub withdraw: bool,
}

/// Account overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Available balances
    pub balances: AccountBalance,
    /// Key permissions (when the venue reports them)
    pub rights: Option<ApiRights>,
    /// Number of open orders
    pub open_orders: Option<u64>,
    /// Number of account transactions
    pub transaction_count: Option<u64>,
    /// Exchange server time
    pub server_time: Option<DateTime<Utc>>,
}

// =============================================================================
// Trades
// =============================================================================

/// Public trade print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Exchange trade id
    pub id: String,
    /// Trading pair
    pub pair: CurrencyPair,
    /// Taker side
    pub side: OrderSide,
    /// Execution price
    pub price: Decimal,
    /// Executed amount
    pub amount: Decimal,
    /// Execution time
    pub timestamp: DateTime<Utc>,
}

/// One of the account's own fills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeHistoryEntry {
    /// Exchange trade id
    pub trade_id: String,
    /// Order that produced the fill
    pub order_id: OrderId,
    /// Trading pair
    pub pair: CurrencyPair,
    /// Buy or sell
    pub side: OrderSide,
    /// Filled amount
    pub amount: Decimal,
    /// Fill price
    pub price: Decimal,
    /// Whether the account's order was the maker
    pub is_maker: bool,
    /// Fill time
    pub timestamp: DateTime<Utc>,
}

/// Sort direction for history queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    /// Oldest first
    Ascending,
    /// Newest first
    #[default]
    Descending,
}

/// Filters for the private trade history call. All fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeHistoryFilter {
    /// Skip this many trades
    pub from: Option<u64>,
    /// Maximum number of trades
    pub count: Option<u64>,
    /// First trade id to include
    pub from_id: Option<String>,
    /// Last trade id to include
    pub end_id: Option<String>,
    /// Sort direction
    pub order: Option<SortOrder>,
    /// Earliest fill time
    pub since: Option<DateTime<Utc>>,
    /// Latest fill time
    pub end: Option<DateTime<Utc>>,
    /// Restrict to one pair
    pub pair: Option<CurrencyPair>,
}

/// Result of a withdrawal request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    /// Exchange transaction id
    pub transaction_id: String,
    /// Amount sent after fees
    pub amount_sent: Decimal,
    /// Balances after the withdrawal
    pub balances: AccountBalance,
}

// =============================================================================
// Exchange metadata
// =============================================================================

/// Trading rules for one pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairInfo {
    /// Price precision
    pub decimal_places: u32,
    /// Minimum order price
    pub min_price: Decimal,
    /// Maximum order price
    pub max_price: Decimal,
    /// Minimum order amount
    pub min_amount: Decimal,
    /// Hidden pairs are not offered for trading
    pub hidden: bool,
    /// Taker fee in percent
    pub fee_percent: Decimal,
}

/// Exchange-wide metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeInfo {
    /// Exchange server time
    pub server_time: Option<DateTime<Utc>>,
    /// Rules per pair
    pub pairs: BTreeMap<CurrencyPair, PairInfo>,
}

impl ExchangeInfo {
    /// Pairs currently offered, skipping hidden ones when `visible_only`.
    pub fn available_pairs(&self, visible_only: bool) -> Vec<CurrencyPair> {
        self.pairs
            .iter()
            .filter(|(_, info)| !(visible_only && info.hidden))
            .map(|(pair, _)| pair.clone())
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
