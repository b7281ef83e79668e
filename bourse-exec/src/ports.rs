//! Port definitions.
//!
//! `ExchangePort` is the generic exchange contract; adapters implement it per
//! venue. `Transport` is the HTTP seam adapters send requests through, so tests
//! can count and script network calls.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bourse_domain::{
    AccountInfo, CurrencyPair, ExchangeId, ExchangeInfo, FeeRequest, Order, OrderId, OrderSide,
    OrderbookSnapshot, SubmittedOrder, TickerSnapshot, Trade, TradeHistoryEntry,
    TradeHistoryFilter, WithdrawalReceipt,
};

use crate::error::{ExchangeError, ExchangeResult};

// =============================================================================
// Capabilities
// =============================================================================

/// Generic operations an adapter may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Latest ticker for a pair
    Ticker,
    /// Latest orderbook for a pair
    Orderbook,
    /// Recent public trades
    Trades,
    /// Exchange metadata and pair rules
    ExchangeInfo,
    /// Balances and key rights
    AccountInfo,
    /// Place a limit order
    SubmitOrder,
    /// List resting orders
    OpenOrders,
    /// Look up one order
    OrderStatus,
    /// Cancel one order
    CancelOrder,
    /// Account fill history
    TradeHistory,
    /// Withdraw funds
    Withdraw,
    /// Offline fee estimate
    EstimateFee,
}

impl Operation {
    /// Every operation, in declaration order.
    pub const ALL: [Operation; 12] = [
        Operation::Ticker,
        Operation::Orderbook,
        Operation::Trades,
        Operation::ExchangeInfo,
        Operation::AccountInfo,
        Operation::SubmitOrder,
        Operation::OpenOrders,
        Operation::OrderStatus,
        Operation::CancelOrder,
        Operation::TradeHistory,
        Operation::Withdraw,
        Operation::EstimateFee,
    ];

    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Ticker => "ticker",
            Operation::Orderbook => "orderbook",
            Operation::Trades => "trades",
            Operation::ExchangeInfo => "exchange_info",
            Operation::AccountInfo => "account_info",
            Operation::SubmitOrder => "submit_order",
            Operation::OpenOrders => "open_orders",
            Operation::OrderStatus => "order_status",
            Operation::CancelOrder => "cancel_order",
            Operation::TradeHistory => "trade_history",
            Operation::Withdraw => "withdraw",
            Operation::EstimateFee => "estimate_fee",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared set of operations an adapter supports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(BTreeSet<Operation>);

impl Capabilities {
    /// Capability set from a list of operations.
    pub fn new(operations: impl IntoIterator<Item = Operation>) -> Self {
        Self(operations.into_iter().collect())
    }

    /// Every operation.
    pub fn all() -> Self {
        Self::new(Operation::ALL)
    }

    /// Whether `operation` is offered.
    pub fn supports(&self, operation: Operation) -> bool {
        self.0.contains(&operation)
    }

    /// `Ok` when offered, `Unsupported` otherwise.
    pub fn require(&self, exchange: ExchangeId, operation: Operation) -> ExchangeResult<()> {
        if self.supports(operation) {
            Ok(())
        } else {
            Err(ExchangeError::unsupported(exchange, operation))
        }
    }

    /// Offered operations in order.
    pub fn iter(&self) -> impl Iterator<Item = Operation> + '_ {
        self.0.iter().copied()
    }
}

// =============================================================================
// Transport
// =============================================================================

/// HTTP verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
}

/// Request handed to a `Transport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Verb
    pub method: HttpMethod,
    /// Absolute URL including query
    pub url: String,
    /// Header name/value pairs in send order
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Option<String>,
}

impl HttpRequest {
    /// Unsigned GET.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// POST with a body and headers.
    pub fn post(url: impl Into<String>, body: String, headers: Vec<(String, String)>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers,
            body: Some(body),
        }
    }

    /// First header value with a case-insensitive name match.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Raw response: status plus body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
}

impl HttpResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends HTTP requests on behalf of adapters.
///
/// Implementations own timeouts; adapters add no retries on top.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request.
    ///
    /// Non-2xx statuses are returned as responses, since venue envelopes
    /// decide success. Connection and timeout failures are `Transport` errors.
    async fn send(&self, request: HttpRequest) -> ExchangeResult<HttpResponse>;
}

// =============================================================================
// Exchange Port
// =============================================================================

/// Outcome of a batch refresh. Failures are isolated per pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Pairs whose snapshot was replaced
    pub updated: Vec<CurrencyPair>,
    /// Pairs that could not be refreshed, with the reason
    pub failed: Vec<(CurrencyPair, ExchangeError)>,
}

impl BatchReport {
    /// Whether every covered pair was refreshed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Failure recorded for `pair`, if any.
    pub fn failure(&self, pair: &CurrencyPair) -> Option<&ExchangeError> {
        self.failed.iter().find(|(p, _)| p == pair).map(|(_, e)| e)
    }
}

/// Generic exchange contract.
///
/// Market-data reads go through the adapter's cache. Private calls are signed
/// and never write the cache. Operations a venue lacks keep the provided
/// implementations, which return `ExchangeError::Unsupported`.
///
/// Implementations:
/// - `StubExchange` - in-memory venue for tests
/// - `LiquiAdapter`, `PoloniexAdapter` - REST venues in `bourse-connectors`
#[async_trait]
pub trait ExchangePort: Send + Sync {
    /// Venue identifier.
    fn id(&self) -> ExchangeId;

    /// Operations this venue offers.
    fn capabilities(&self) -> &Capabilities;

    /// Pairs configured for batch refreshes.
    fn enabled_pairs(&self) -> Vec<CurrencyPair>;

    /// Cached ticker, fetched once on a miss.
    async fn ticker(&self, pair: &CurrencyPair) -> ExchangeResult<Arc<TickerSnapshot>>;

    /// Fetch the ticker from the venue and overwrite the cache entry.
    async fn update_ticker(&self, pair: &CurrencyPair) -> ExchangeResult<Arc<TickerSnapshot>>;

    /// Refresh every enabled pair's ticker.
    async fn refresh_tickers(&self) -> ExchangeResult<BatchReport>;

    /// Cached orderbook, fetched once on a miss.
    async fn orderbook(&self, pair: &CurrencyPair) -> ExchangeResult<Arc<OrderbookSnapshot>>;

    /// Fetch the orderbook from the venue and overwrite the cache entry.
    async fn update_orderbook(&self, pair: &CurrencyPair) -> ExchangeResult<Arc<OrderbookSnapshot>>;

    /// Refresh every enabled pair's orderbook.
    async fn refresh_orderbooks(&self) -> ExchangeResult<BatchReport>;

    /// Recent public trades, newest first.
    async fn trades(&self, _pair: &CurrencyPair, _limit: Option<u32>) -> ExchangeResult<Vec<Trade>> {
        Err(ExchangeError::unsupported(self.id(), Operation::Trades))
    }

    /// Exchange metadata.
    async fn exchange_info(&self) -> ExchangeResult<ExchangeInfo> {
        Err(ExchangeError::unsupported(self.id(), Operation::ExchangeInfo))
    }

    /// Balances and account data.
    async fn account_info(&self) -> ExchangeResult<AccountInfo> {
        Err(ExchangeError::unsupported(self.id(), Operation::AccountInfo))
    }

    /// Place a limit order.
    async fn submit_order(
        &self,
        _pair: &CurrencyPair,
        _side: OrderSide,
        _amount: Decimal,
        _price: Decimal,
    ) -> ExchangeResult<SubmittedOrder> {
        Err(ExchangeError::unsupported(self.id(), Operation::SubmitOrder))
    }

    /// Resting orders, optionally for one pair.
    async fn open_orders(&self, _pair: Option<&CurrencyPair>) -> ExchangeResult<Vec<Order>> {
        Err(ExchangeError::unsupported(self.id(), Operation::OpenOrders))
    }

    /// Look up one order.
    async fn order_status(&self, _id: &OrderId) -> ExchangeResult<Order> {
        Err(ExchangeError::unsupported(self.id(), Operation::OrderStatus))
    }

    /// Cancel one order.
    async fn cancel_order(&self, _id: &OrderId) -> ExchangeResult<()> {
        Err(ExchangeError::unsupported(self.id(), Operation::CancelOrder))
    }

    /// Own fills matching `filter`.
    async fn trade_history(
        &self,
        _filter: &TradeHistoryFilter,
    ) -> ExchangeResult<Vec<TradeHistoryEntry>> {
        Err(ExchangeError::unsupported(self.id(), Operation::TradeHistory))
    }

    /// Withdraw `amount` of `currency` to `address`.
    async fn withdraw(
        &self,
        _currency: &str,
        _amount: Decimal,
        _address: &str,
    ) -> ExchangeResult<WithdrawalReceipt> {
        Err(ExchangeError::unsupported(self.id(), Operation::Withdraw))
    }

    /// Offline fee estimate. Never negative.
    fn estimate_fee(&self, _request: &FeeRequest) -> ExchangeResult<Decimal> {
        Err(ExchangeError::unsupported(self.id(), Operation::EstimateFee))
    }
}

// =============================================================================
// Tests
// =============================================================================
