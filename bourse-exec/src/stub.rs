//! Stub implementation for testing.
//!
//! Serves injected tickers and orderbooks without making network calls.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use rust_decimal::Decimal;

use bourse_domain::{
    estimate_fee, CurrencyPair, ExchangeId, FeeRequest, FeeSchedule, OrderbookSnapshot,
    TickerSnapshot,
};

use crate::error::{ExchangeError, ExchangeResult};
use crate::ports::{BatchReport, Capabilities, ExchangePort, Operation};

/// Stub exchange for testing.
///
/// Market data is whatever the test injected; a missing pair is an
/// `ExchangeApi` failure, as a venue rejecting an unknown pair would be.
pub struct StubExchange {
    capabilities: Capabilities,
    fees: FeeSchedule,
    tickers: RwLock<BTreeMap<CurrencyPair, Arc<TickerSnapshot>>>,
    orderbooks: RwLock<BTreeMap<CurrencyPair, Arc<OrderbookSnapshot>>>,
    /// Whether to simulate a failure on the next call
    fail_next: RwLock<bool>,
}

impl StubExchange {
    /// Create an empty stub venue.
    pub fn new() -> Self {
        Self {
            capabilities: Capabilities::new([
                Operation::Ticker,
                Operation::Orderbook,
                Operation::EstimateFee,
            ]),
            fees: FeeSchedule::new(Decimal::new(1, 3), Decimal::new(2, 3)), // 0.1% / 0.2%
            tickers: RwLock::new(BTreeMap::new()),
            orderbooks: RwLock::new(BTreeMap::new()),
            fail_next: RwLock::new(false),
        }
    }

    /// Inject a ticker.
    pub fn set_ticker(&self, ticker: TickerSnapshot) {
        self.tickers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ticker.pair().clone(), Arc::new(ticker));
    }

    /// Inject an orderbook.
    pub fn set_orderbook(&self, book: OrderbookSnapshot) {
        self.orderbooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(book.pair().clone(), Arc::new(book));
    }

    /// Configure the next market-data call to fail.
    pub fn set_fail_next(&self, fail: bool) {
        *self.fail_next.write().unwrap_or_else(PoisonError::into_inner) = fail;
    }

    fn should_fail(&self) -> bool {
        let mut fail_next = self.fail_next.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *fail_next)
    }

    fn lookup<V>(
        &self,
        map: &RwLock<BTreeMap<CurrencyPair, Arc<V>>>,
        pair: &CurrencyPair,
        kind: &str,
    ) -> ExchangeResult<Arc<V>> {
        if self.should_fail() {
            return Err(ExchangeError::Transport("Simulated stub failure".to_string()));
        }
        map.read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(pair)
            .cloned()
            .ok_or_else(|| ExchangeError::api(ExchangeId::Stub, format!("no {} for {}", kind, pair)))
    }

    fn report<V>(&self, map: &RwLock<BTreeMap<CurrencyPair, Arc<V>>>) -> ExchangeResult<BatchReport> {
        if self.should_fail() {
            return Err(ExchangeError::Transport("Simulated stub failure".to_string()));
        }
        Ok(BatchReport {
            updated: map
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .keys()
                .cloned()
                .collect(),
            failed: Vec::new(),
        })
    }
}

impl Default for StubExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangePort for StubExchange {
    fn id(&self) -> ExchangeId {
        ExchangeId::Stub
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn enabled_pairs(&self) -> Vec<CurrencyPair> {
        self.tickers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    async fn ticker(&self, pair: &CurrencyPair) -> ExchangeResult<Arc<TickerSnapshot>> {
        self.lookup(&self.tickers, pair, "ticker")
    }

    async fn update_ticker(&self, pair: &CurrencyPair) -> ExchangeResult<Arc<TickerSnapshot>> {
        self.lookup(&self.tickers, pair, "ticker")
    }

    async fn refresh_tickers(&self) -> ExchangeResult<BatchReport> {
        self.report(&self.tickers)
    }

    async fn orderbook(&self, pair: &CurrencyPair) -> ExchangeResult<Arc<OrderbookSnapshot>> {
        self.lookup(&self.orderbooks, pair, "orderbook")
    }

    async fn update_orderbook(&self, pair: &CurrencyPair) -> ExchangeResult<Arc<OrderbookSnapshot>> {
        self.lookup(&self.orderbooks, pair, "orderbook")
    }

    async fn refresh_orderbooks(&self) -> ExchangeResult<BatchReport> {
        self.report(&self.orderbooks)
    }

    fn estimate_fee(&self, request: &FeeRequest) -> ExchangeResult<Decimal> {
        Ok(estimate_fee(&self.fees, request))
    }
}

// =============================================================================
// Tests
// =============================================================================
