//! Test helpers for Bourse adapter and daemon tests.
//!
//! `MockTransport` stands in for the HTTP client: responses are canned per URL
//! prefix and every request is recorded for assertions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use bourse_domain::{
    CurrencyPair, FeeRequest, OrderId, OrderSide, TickerSnapshot, TradeHistoryFilter,
};
use bourse_exec::{
    ExchangeError, ExchangePort, ExchangeResult, HttpRequest, HttpResponse, Operation, Transport,
};

type Canned = ExchangeResult<HttpResponse>;

/// In-memory `Transport` with canned responses.
///
/// The longest registered prefix of a request URL wins. Unmatched requests
/// fail with a transport error.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<(String, Canned)>>,
    requests: Mutex<Vec<HttpRequest>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every response for `delay` before returning it.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answer requests under `prefix` with `status` and `body`.
    pub fn respond(&self, prefix: impl Into<String>, status: u16, body: impl Into<String>) -> &Self {
        self.route(
            prefix.into(),
            Ok(HttpResponse {
                status,
                body: body.into(),
            }),
        )
    }

    /// Fail requests under `prefix` before any response is produced.
    pub fn fail(&self, prefix: impl Into<String>, error: ExchangeError) -> &Self {
        self.route(prefix.into(), Err(error))
    }

    fn route(&self, prefix: String, canned: Canned) -> &Self {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        routes.retain(|(existing, _)| *existing != prefix);
        routes.push((prefix, canned));
        self
    }

    /// Requests seen so far, in arrival order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `send` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, url: &str) -> Canned {
        let routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        routes
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, canned)| canned.clone())
            .unwrap_or_else(|| Err(ExchangeError::Transport(format!("no route for {}", url))))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> ExchangeResult<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let canned = self.lookup(&request.url);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        canned
    }
}

/// Call the generic method behind `operation` with placeholder arguments,
/// keeping only the outcome.
///
/// Lets tests check a declared capability set against what an adapter
/// actually does.
pub async fn invoke(exchange: &dyn ExchangePort, operation: Operation) -> ExchangeResult<()> {
    let pair = exchange
        .enabled_pairs()
        .into_iter()
        .next()
        .unwrap_or_else(|| pair("ETH/BTC"));
    let order = OrderId::new("1");

    match operation {
        Operation::Ticker => exchange.ticker(&pair).await.map(drop),
        Operation::Orderbook => exchange.orderbook(&pair).await.map(drop),
        Operation::Trades => exchange.trades(&pair, Some(1)).await.map(drop),
        Operation::ExchangeInfo => exchange.exchange_info().await.map(drop),
        Operation::AccountInfo => exchange.account_info().await.map(drop),
        Operation::SubmitOrder => exchange
            .submit_order(&pair, OrderSide::Buy, Decimal::ONE, Decimal::ONE)
            .await
            .map(drop),
        Operation::OpenOrders => exchange.open_orders(None).await.map(drop),
        Operation::OrderStatus => exchange.order_status(&order).await.map(drop),
        Operation::CancelOrder => exchange.cancel_order(&order).await,
        Operation::TradeHistory => exchange
            .trade_history(&TradeHistoryFilter::default())
            .await
            .map(drop),
        Operation::Withdraw => exchange
            .withdraw("BTC", Decimal::ONE, "address")
            .await
            .map(drop),
        Operation::EstimateFee => exchange
            .estimate_fee(&FeeRequest::trade(Decimal::ONE, Decimal::ONE, false))
            .map(drop),
    }
}

/// Assert that every operation is performed or rejected as unsupported
/// exactly as `exchange` declares, and that rejected calls send nothing.
pub async fn assert_capabilities_hold(exchange: &dyn ExchangePort, transport: &MockTransport) {
    for operation in Operation::ALL {
        let before = transport.call_count();
        let outcome = invoke(exchange, operation).await;
        let unsupported = matches!(&outcome, Err(e) if e.is_unsupported());

        assert_eq!(
            unsupported,
            !exchange.capabilities().supports(operation),
            "{operation}: {outcome:?}"
        );
        if unsupported {
            assert_eq!(transport.call_count(), before, "{operation} reached the transport");
        }
    }
}

/// Ticker with the given bid/ask, `last` at the midpoint, captured now.
pub fn ticker(pair: &CurrencyPair, bid: Decimal, ask: Decimal) -> TickerSnapshot {
    let last = (bid + ask) / Decimal::TWO;
    TickerSnapshot::new(pair.clone(), bid, ask, last, ask, bid, Decimal::ONE, Utc::now())
        .unwrap_or_else(|e| panic!("invalid test ticker: {e}"))
}

/// Parse `"ETH/BTC"` style pairs in tests.
pub fn pair(text: &str) -> CurrencyPair {
    text.parse()
        .unwrap_or_else(|e| panic!("invalid test pair {text}: {e}"))
}
