//! Poloniex adapter.
//!
//! Market data only: ticker and orderbook through the all-pairs public
//! endpoints, balances through a signed `returnBalances`. Every other generic
//! operation is declared unsupported.

mod types;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use bourse_domain::{
    estimate_fee, AccountBalance, AccountInfo, ApiCredentials, AssetType, CurrencyPair,
    ExchangeId, ExchangePairFormats, FeeRequest, FeeSchedule, LetterCase, OrderbookSnapshot,
    PairFormat, PairOrder, PairTranslator, PriceLevel, TickerSnapshot,
};
use bourse_exec::{
    BatchReport, Capabilities, ExchangeError, ExchangePort, ExchangeResult, HttpRequest,
    Operation, Transport,
};
use bourse_store::CacheKey;

use crate::batch::{covering, install, BatchOutcome, PairResults};
use crate::envelope::{decode, public_payload};
use crate::signer::{ParamSet, RequestSigner, SigningScheme};
use crate::SharedCache;

use types::{PoloniexBook, PoloniexTicker};

/// Public API endpoint
pub const POLONIEX_PUBLIC_URL: &str = "https://poloniex.com/public";

/// Private API endpoint
pub const POLONIEX_PRIVATE_URL: &str = "https://poloniex.com/tradingApi";

/// Orderbook depth requested when none is configured
pub const DEFAULT_ORDERBOOK_DEPTH: u32 = 1000;

/// `BTC_ETH` for ETH priced in BTC, both on the wire and in config.
pub fn pair_formats() -> ExchangePairFormats {
    let format = PairFormat::new("_", LetterCase::Upper, PairOrder::QuoteFirst);
    ExchangePairFormats {
        request: format.clone(),
        config: format,
        separator: String::new(),
    }
}

/// Maker 0.15%, taker 0.25%.
pub fn fee_schedule() -> FeeSchedule {
    FeeSchedule::new(Decimal::new(15, 4), Decimal::new(25, 4))
}

/// Construction-time settings.
#[derive(Debug, Clone)]
pub struct PoloniexConfig {
    /// Public endpoint URL
    pub public_url: String,
    /// Private endpoint URL
    pub private_url: String,
    /// Pairs refreshed by batch calls
    pub pairs: Vec<CurrencyPair>,
    /// Key and secret for private calls
    pub credentials: Option<ApiCredentials>,
    /// Orderbook depth per pair
    pub orderbook_depth: u32,
}

impl PoloniexConfig {
    /// Production URLs, no credentials.
    pub fn new(pairs: Vec<CurrencyPair>) -> Self {
        Self {
            public_url: POLONIEX_PUBLIC_URL.to_string(),
            private_url: POLONIEX_PRIVATE_URL.to_string(),
            pairs,
            credentials: None,
            orderbook_depth: DEFAULT_ORDERBOOK_DEPTH,
        }
    }

    /// Attach API credentials.
    pub fn with_credentials(mut self, credentials: ApiCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Point at another host.
    pub fn with_urls(mut self, public_url: impl Into<String>, private_url: impl Into<String>) -> Self {
        self.public_url = public_url.into();
        self.private_url = private_url.into();
        self
    }
}

/// Poloniex exchange adapter. Cheap to clone.
#[derive(Clone)]
pub struct PoloniexAdapter {
    inner: Arc<Inner>,
}

struct Inner {
    config: PoloniexConfig,
    transport: Arc<dyn Transport>,
    cache: SharedCache,
    signer: RequestSigner,
    translator: PairTranslator,
    capabilities: Capabilities,
    fees: FeeSchedule,
}

impl PoloniexAdapter {
    /// Create an adapter writing market data into `cache`.
    pub fn new(config: PoloniexConfig, transport: Arc<dyn Transport>, cache: SharedCache) -> Self {
        let signer = RequestSigner::new(
            ExchangeId::Poloniex,
            SigningScheme::POLONIEX,
            config.credentials.clone(),
        );
        let translator = PairTranslator::new(pair_formats(), config.pairs.clone());
        info!(
            exchange = %ExchangeId::Poloniex,
            pairs = config.pairs.len(),
            authenticated = signer.has_credentials(),
            "Poloniex adapter ready"
        );

        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                cache,
                signer,
                translator,
                capabilities: Capabilities::new([
                    Operation::Ticker,
                    Operation::Orderbook,
                    Operation::AccountInfo,
                    Operation::EstimateFee,
                ]),
                fees: fee_schedule(),
            }),
        }
    }
}

fn key(pair: &CurrencyPair) -> CacheKey {
    CacheKey::new(ExchangeId::Poloniex, pair.clone(), AssetType::Spot)
}

impl Inner {
    /// Fetch an all-pairs map and pick out `pairs`, each decoded on its own.
    /// Every snapshot is stamped with the time the response arrived.
    async fn fetch_all<R, V, F>(
        &self,
        operation: Operation,
        query: String,
        pairs: &[CurrencyPair],
        convert: F,
    ) -> ExchangeResult<PairResults<V>>
    where
        R: DeserializeOwned,
        F: Fn(CurrencyPair, R, DateTime<Utc>) -> ExchangeResult<V>,
    {
        self.capabilities.require(ExchangeId::Poloniex, operation)?;
        let url = format!("{}?{}", self.config.public_url, query);
        debug!(exchange = %ExchangeId::Poloniex, url = %url, "Public request");

        let response = self.transport.send(HttpRequest::get(url)).await?;
        let captured_at = Utc::now();
        let mut entries = match public_payload(ExchangeId::Poloniex, response)? {
            Value::Object(map) => map,
            other => {
                return Err(ExchangeError::Decode(format!(
                    "expected an object keyed by pair, got {}",
                    other
                )))
            }
        };

        Ok(pairs
            .iter()
            .map(|pair| {
                let wire = self.translator.to_wire(pair);
                let result = entries
                    .remove(&wire)
                    .ok_or_else(|| ExchangeError::Decode(format!("{} missing from response", wire)))
                    .and_then(decode::<R>)
                    .and_then(|raw| convert(pair.clone(), raw, captured_at));
                (pair.clone(), result)
            })
            .collect())
    }

    async fn refresh_ticker_batch(
        &self,
        extra: Option<&CurrencyPair>,
    ) -> ExchangeResult<BatchOutcome<TickerSnapshot>> {
        let pairs = covering(&self.config.pairs, extra);
        let results = self
            .fetch_all::<PoloniexTicker, _, _>(
                Operation::Ticker,
                "command=returnTicker".to_string(),
                &pairs,
                |pair, raw, captured_at| {
                    Ok(TickerSnapshot::new(
                        pair,
                        raw.highest_bid,
                        raw.lowest_ask,
                        raw.last,
                        raw.high_24hr,
                        raw.low_24hr,
                        raw.base_volume,
                        captured_at,
                    )?)
                },
            )
            .await?;
        Ok(install(self.cache.tickers(), ExchangeId::Poloniex, "ticker", results))
    }

    async fn refresh_book_batch(
        &self,
        extra: Option<&CurrencyPair>,
    ) -> ExchangeResult<BatchOutcome<OrderbookSnapshot>> {
        let pairs = covering(&self.config.pairs, extra);
        let query = format!(
            "command=returnOrderBook&currencyPair=all&depth={}",
            self.config.orderbook_depth
        );
        let results = self
            .fetch_all::<PoloniexBook, _, _>(Operation::Orderbook, query, &pairs, |pair, raw, captured_at| {
                let levels = |side: Vec<(Decimal, Decimal)>| {
                    side.into_iter()
                        .map(|(price, amount)| PriceLevel::new(price, amount))
                        .collect::<Vec<_>>()
                };
                Ok(OrderbookSnapshot::new(
                    pair,
                    levels(raw.bids),
                    levels(raw.asks),
                    captured_at,
                )?)
            })
            .await?;
        Ok(install(self.cache.orderbooks(), ExchangeId::Poloniex, "orderbook", results))
    }

    async fn update_ticker(&self, pair: &CurrencyPair) -> ExchangeResult<Arc<TickerSnapshot>> {
        self.refresh_ticker_batch(Some(pair)).await?.take(pair)
    }

    async fn update_orderbook(&self, pair: &CurrencyPair) -> ExchangeResult<Arc<OrderbookSnapshot>> {
        self.refresh_book_batch(Some(pair)).await?.take(pair)
    }
}

#[async_trait]
impl ExchangePort for PoloniexAdapter {
    fn id(&self) -> ExchangeId {
        ExchangeId::Poloniex
    }

    fn capabilities(&self) -> &Capabilities {
        &self.inner.capabilities
    }

    fn enabled_pairs(&self) -> Vec<CurrencyPair> {
        self.inner.config.pairs.clone()
    }

    async fn ticker(&self, pair: &CurrencyPair) -> ExchangeResult<Arc<TickerSnapshot>> {
        let inner = Arc::clone(&self.inner);
        let requested = pair.clone();
        self.inner
            .cache
            .tickers()
            .get_or_refresh(key(pair), move || async move {
                inner.update_ticker(&requested).await
            })
            .await
    }

    async fn update_ticker(&self, pair: &CurrencyPair) -> ExchangeResult<Arc<TickerSnapshot>> {
        self.inner.update_ticker(pair).await
    }

    async fn refresh_tickers(&self) -> ExchangeResult<BatchReport> {
        if self.inner.config.pairs.is_empty() {
            return Ok(BatchReport::default());
        }
        Ok(self.inner.refresh_ticker_batch(None).await?.report)
    }

    async fn orderbook(&self, pair: &CurrencyPair) -> ExchangeResult<Arc<OrderbookSnapshot>> {
        let inner = Arc::clone(&self.inner);
        let requested = pair.clone();
        self.inner
            .cache
            .orderbooks()
            .get_or_refresh(key(pair), move || async move {
                inner.update_orderbook(&requested).await
            })
            .await
    }

    async fn update_orderbook(&self, pair: &CurrencyPair) -> ExchangeResult<Arc<OrderbookSnapshot>> {
        self.inner.update_orderbook(pair).await
    }

    async fn refresh_orderbooks(&self) -> ExchangeResult<BatchReport> {
        if self.inner.config.pairs.is_empty() {
            return Ok(BatchReport::default());
        }
        Ok(self.inner.refresh_book_batch(None).await?.report)
    }

    async fn account_info(&self) -> ExchangeResult<AccountInfo> {
        self.inner.capabilities.require(self.id(), Operation::AccountInfo)?;
        let signed = self.inner.signer.sign("returnBalances", ParamSet::new())?;
        let headers = signed.headers();
        let request = HttpRequest::post(self.inner.config.private_url.clone(), signed.body, headers);

        let response = self.inner.transport.send(request).await?;
        let funds: HashMap<String, Decimal> =
            decode(public_payload(ExchangeId::Poloniex, response)?)?;

        Ok(AccountInfo {
            balances: funds.into_iter().collect::<AccountBalance>(),
            rights: None,
            open_orders: None,
            transaction_count: None,
            server_time: None,
        })
    }

    fn estimate_fee(&self, request: &FeeRequest) -> ExchangeResult<Decimal> {
        self.inner.capabilities.require(self.id(), Operation::EstimateFee)?;
        Ok(estimate_fee(&self.inner.fees, request))
    }
}
