//! Liqui adapter.
//!
//! Public data comes from `GET <public>/3/<operation>/<pairs>`, where several
//! pairs are joined with `-` (`eth_btc-ltc_btc`). Private calls are signed
//! `POST`s to `<private>` with the method name in the `method` field.
//!
//! Ticker and depth refreshes always cover every enabled pair plus the pair
//! asked for, so one request warms the whole cache.

mod conversions;
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
    estimate_fee, AccountInfo, ApiCredentials, AssetType, CurrencyPair, ExchangeId, ExchangeInfo,
    ExchangePairFormats, FeeRequest, FeeSchedule, LetterCase, Order, OrderId, OrderSide,
    OrderbookSnapshot, PairFormat, PairOrder, PairTranslator, SortOrder, SubmittedOrder,
    TickerSnapshot, Trade, TradeHistoryEntry, TradeHistoryFilter, WithdrawalReceipt,
};
use bourse_exec::{
    BatchReport, Capabilities, ExchangeError, ExchangePort, ExchangeResult, HttpRequest,
    Operation, Transport,
};
use bourse_store::CacheKey;

use crate::batch::{covering, install, BatchOutcome, PairResults};
use crate::envelope::{decode, private_payload, public_payload};
use crate::signer::{ParamSet, RequestSigner, SigningScheme};
use crate::SharedCache;

use types::{
    LiquiAccountInfo, LiquiCancelResult, LiquiDepth, LiquiHistoryEntry, LiquiInfo, LiquiOrder,
    LiquiTicker, LiquiTrade, LiquiTradeResult, LiquiWithdrawResult,
};

// =============================================================================
// Constants
// =============================================================================

/// Public API base URL
pub const LIQUI_PUBLIC_URL: &str = "https://api.liqui.io/api";

/// Private (`tapi`) endpoint
pub const LIQUI_PRIVATE_URL: &str = "https://api.liqui.io/tapi";

const PUBLIC_VERSION: &str = "3";

/// Maker fee rate (0.1%)
const MAKER_FEE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Taker fee rate (0.25%)
const TAKER_FEE: Decimal = Decimal::from_parts(25, 0, 0, false, 4);

/// Request and display formats: `eth_btc` on the wire, `ETH_BTC` in config.
pub fn pair_formats() -> ExchangePairFormats {
    ExchangePairFormats {
        request: PairFormat::new("_", LetterCase::Lower, PairOrder::BaseFirst),
        config: PairFormat::new("_", LetterCase::Upper, PairOrder::BaseFirst),
        separator: "-".to_string(),
    }
}

/// Maker/taker rates and withdrawal fees.
pub fn fee_schedule() -> FeeSchedule {
    FeeSchedule::new(MAKER_FEE, TAKER_FEE)
        .with_withdrawal_fee("BTC", Decimal::new(1, 3))
        .with_withdrawal_fee("ETH", Decimal::new(5, 3))
        .with_withdrawal_fee("LTC", Decimal::new(1, 2))
        .with_withdrawal_fee("USDT", Decimal::new(5, 0))
}

// =============================================================================
// Configuration
// =============================================================================

/// Construction-time settings. Read-only once the adapter exists.
#[derive(Debug, Clone)]
pub struct LiquiConfig {
    /// Public API base URL
    pub public_url: String,
    /// Private endpoint URL
    pub private_url: String,
    /// Pairs refreshed by batch calls
    pub pairs: Vec<CurrencyPair>,
    /// Key and secret for private calls
    pub credentials: Option<ApiCredentials>,
    /// Depth `limit` (venue default 150 when unset)
    pub orderbook_depth: Option<u32>,
    /// Operations the adapter will perform; everything else is `Unsupported`
    pub capabilities: Capabilities,
}

impl LiquiConfig {
    /// Production URLs, no credentials.
    pub fn new(pairs: Vec<CurrencyPair>) -> Self {
        Self {
            public_url: LIQUI_PUBLIC_URL.to_string(),
            private_url: LIQUI_PRIVATE_URL.to_string(),
            pairs,
            credentials: None,
            orderbook_depth: None,
            capabilities: Capabilities::all(),
        }
    }

    /// Attach API credentials.
    pub fn with_credentials(mut self, credentials: ApiCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Restrict the operations the adapter performs (e.g. no withdrawals).
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Point at another host (tests, proxies).
    pub fn with_urls(mut self, public_url: impl Into<String>, private_url: impl Into<String>) -> Self {
        self.public_url = public_url.into();
        self.private_url = private_url.into();
        self
    }
}

// =============================================================================
// Adapter
// =============================================================================

/// Liqui exchange adapter. Cheap to clone.
#[derive(Clone)]
pub struct LiquiAdapter {
    inner: Arc<Inner>,
}

struct Inner {
    config: LiquiConfig,
    transport: Arc<dyn Transport>,
    cache: SharedCache,
    signer: RequestSigner,
    translator: PairTranslator,
    capabilities: Capabilities,
    fees: FeeSchedule,
}

impl LiquiAdapter {
    /// Create an adapter writing market data into `cache`.
    pub fn new(config: LiquiConfig, transport: Arc<dyn Transport>, cache: SharedCache) -> Self {
        let signer = RequestSigner::new(
            ExchangeId::Liqui,
            SigningScheme::LIQUI,
            config.credentials.clone(),
        );
        Self::with_signer(config, transport, cache, signer)
    }

    /// Create an adapter with a prepared signer (tests inject a seeded one).
    pub fn with_signer(
        config: LiquiConfig,
        transport: Arc<dyn Transport>,
        cache: SharedCache,
        signer: RequestSigner,
    ) -> Self {
        let translator = PairTranslator::new(pair_formats(), config.pairs.clone());
        info!(
            exchange = %ExchangeId::Liqui,
            pairs = config.pairs.len(),
            authenticated = signer.has_credentials(),
            "Liqui adapter ready"
        );

        Self {
            inner: Arc::new(Inner {
                capabilities: config.capabilities.clone(),
                config,
                transport,
                cache,
                signer,
                translator,
                fees: fee_schedule(),
            }),
        }
    }

    /// Pair translator in use.
    pub fn translator(&self) -> &PairTranslator {
        &self.inner.translator
    }
}

fn key(pair: &CurrencyPair) -> CacheKey {
    CacheKey::new(ExchangeId::Liqui, pair.clone(), AssetType::Spot)
}

impl Inner {
    fn public_url(&self, operation: &str, pairs: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.config.public_url.trim_end_matches('/'),
            PUBLIC_VERSION,
            operation,
            pairs
        )
    }

    async fn get_public(&self, operation: Operation, url: String) -> ExchangeResult<Value> {
        self.capabilities.require(ExchangeId::Liqui, operation)?;
        debug!(exchange = %ExchangeId::Liqui, url = %url, "Public request");
        let response = self.transport.send(HttpRequest::get(url)).await?;
        public_payload(ExchangeId::Liqui, response)
    }

    /// Sign and send a private call. Capabilities and credentials are checked
    /// before any I/O.
    async fn post_private(
        &self,
        operation: Operation,
        method: &str,
        params: ParamSet,
    ) -> ExchangeResult<Value> {
        self.capabilities.require(ExchangeId::Liqui, operation)?;
        let signed = self.signer.sign(method, params)?;
        let headers = signed.headers();
        let request = HttpRequest::post(self.config.private_url.clone(), signed.body, headers);

        let response = self.transport.send(request).await?;
        private_payload(ExchangeId::Liqui, response)
    }

    /// One batch request per kind, each entry decoded on its own.
    async fn fetch_batch<R, V, F>(
        &self,
        operation: Operation,
        path: &str,
        pairs: &[CurrencyPair],
        query: Option<String>,
        convert: F,
    ) -> ExchangeResult<PairResults<V>>
    where
        R: DeserializeOwned,
        F: Fn(CurrencyPair, R, DateTime<Utc>) -> ExchangeResult<V>,
    {
        let mut url = self.public_url(path, &self.translator.join_wire(pairs));
        if let Some(query) = query {
            url.push('?');
            url.push_str(&query);
        }

        let payload = self.get_public(operation, url).await?;
        let captured_at = Utc::now();
        let mut entries = match payload {
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
        if pairs.is_empty() {
            return Ok(BatchOutcome {
                snapshots: Vec::new(),
                report: BatchReport::default(),
            });
        }

        let results = self
            .fetch_batch::<LiquiTicker, _, _>(
                Operation::Ticker,
                "ticker",
                &pairs,
                None,
                conversions::ticker,
            )
            .await?;
        Ok(install(self.cache.tickers(), ExchangeId::Liqui, "ticker", results))
    }

    async fn refresh_depth_batch(
        &self,
        extra: Option<&CurrencyPair>,
    ) -> ExchangeResult<BatchOutcome<OrderbookSnapshot>> {
        let pairs = covering(&self.config.pairs, extra);
        if pairs.is_empty() {
            return Ok(BatchOutcome {
                snapshots: Vec::new(),
                report: BatchReport::default(),
            });
        }

        let query = self.config.orderbook_depth.map(|limit| format!("limit={}", limit));
        let results = self
            .fetch_batch::<LiquiDepth, _, _>(
                Operation::Orderbook,
                "depth",
                &pairs,
                query,
                conversions::orderbook,
            )
            .await?;
        Ok(install(self.cache.orderbooks(), ExchangeId::Liqui, "orderbook", results))
    }

    async fn update_ticker(&self, pair: &CurrencyPair) -> ExchangeResult<Arc<TickerSnapshot>> {
        self.refresh_ticker_batch(Some(pair)).await?.take(pair)
    }

    async fn update_orderbook(&self, pair: &CurrencyPair) -> ExchangeResult<Arc<OrderbookSnapshot>> {
        self.refresh_depth_batch(Some(pair)).await?.take(pair)
    }

    /// Decode a `{id: entry}` map with `convert` applied per entry.
    fn decode_keyed<R, V, F>(&self, payload: Value, convert: F) -> ExchangeResult<Vec<V>>
    where
        R: DeserializeOwned,
        F: Fn(&str, R, &PairTranslator) -> ExchangeResult<V>,
    {
        // An empty result may arrive as `[]` or `null` rather than `{}`.
        let entries: HashMap<String, R> = match payload {
            Value::Null => HashMap::new(),
            Value::Array(items) if items.is_empty() => HashMap::new(),
            other => decode(other)?,
        };
        entries
            .into_iter()
            .map(|(id, raw)| convert(&id, raw, &self.translator))
            .collect()
    }
}

#[async_trait]
impl ExchangePort for LiquiAdapter {
    fn id(&self) -> ExchangeId {
        ExchangeId::Liqui
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
        Ok(self.inner.refresh_depth_batch(None).await?.report)
    }

    async fn trades(&self, pair: &CurrencyPair, limit: Option<u32>) -> ExchangeResult<Vec<Trade>> {
        let wire = self.inner.translator.to_wire(pair);
        let mut url = self.inner.public_url("trades", &wire);
        if let Some(limit) = limit {
            url.push_str(&format!("?limit={}", limit));
        }

        let mut payload = self.inner.get_public(Operation::Trades, url).await?;
        let raw: Vec<LiquiTrade> = match payload.get_mut(&wire) {
            Some(entries) => decode(entries.take())?,
            None => return Err(ExchangeError::Decode(format!("{} missing from response", wire))),
        };
        raw.into_iter()
            .map(|trade| conversions::trade(pair, trade))
            .collect()
    }

    async fn exchange_info(&self) -> ExchangeResult<ExchangeInfo> {
        let url = format!(
            "{}/{}/info",
            self.inner.config.public_url.trim_end_matches('/'),
            PUBLIC_VERSION
        );
        let raw: LiquiInfo = decode(self.inner.get_public(Operation::ExchangeInfo, url).await?)?;
        conversions::exchange_info(raw, &self.inner.translator)
    }

    async fn account_info(&self) -> ExchangeResult<AccountInfo> {
        let payload = self
            .inner
            .post_private(Operation::AccountInfo, "getInfo", ParamSet::new())
            .await?;
        conversions::account_info(decode::<LiquiAccountInfo>(payload)?)
    }

    async fn submit_order(
        &self,
        pair: &CurrencyPair,
        side: OrderSide,
        amount: Decimal,
        price: Decimal,
    ) -> ExchangeResult<SubmittedOrder> {
        if amount <= Decimal::ZERO {
            return Err(ExchangeError::InvalidParameter(format!("amount must be positive, got {}", amount)));
        }
        if price <= Decimal::ZERO {
            return Err(ExchangeError::InvalidParameter(format!("price must be positive, got {}", price)));
        }

        let mut params = ParamSet::new();
        params.insert("pair".to_string(), self.inner.translator.to_wire(pair));
        params.insert("type".to_string(), side.as_str().to_string());
        params.insert("amount".to_string(), amount.normalize().to_string());
        params.insert("rate".to_string(), price.normalize().to_string());

        let payload = self
            .inner
            .post_private(Operation::SubmitOrder, "Trade", params)
            .await?;
        let raw: LiquiTradeResult = decode(payload)?;
        Ok(SubmittedOrder {
            order_id: (raw.order_id != 0).then(|| OrderId::new(raw.order_id.to_string())),
            received: raw.received,
            remains: raw.remains,
            balances: conversions::balances(raw.funds),
        })
    }

    async fn open_orders(&self, pair: Option<&CurrencyPair>) -> ExchangeResult<Vec<Order>> {
        let mut params = ParamSet::new();
        if let Some(pair) = pair {
            params.insert("pair".to_string(), self.inner.translator.to_wire(pair));
        }

        let payload = self
            .inner
            .post_private(Operation::OpenOrders, "ActiveOrders", params)
            .await?;
        let mut orders = self
            .inner
            .decode_keyed::<LiquiOrder, _, _>(payload, conversions::order)?;
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }

    async fn order_status(&self, id: &OrderId) -> ExchangeResult<Order> {
        let mut params = ParamSet::new();
        params.insert("order_id".to_string(), id.as_str().to_string());

        let payload = self
            .inner
            .post_private(Operation::OrderStatus, "OrderInfo", params)
            .await?;
        self.inner
            .decode_keyed::<LiquiOrder, _, _>(payload, conversions::order)?
            .into_iter()
            .find(|order| &order.id == id)
            .ok_or_else(|| ExchangeError::Decode(format!("order {} missing from response", id)))
    }

    async fn cancel_order(&self, id: &OrderId) -> ExchangeResult<()> {
        let mut params = ParamSet::new();
        params.insert("order_id".to_string(), id.as_str().to_string());

        let payload = self
            .inner
            .post_private(Operation::CancelOrder, "CancelOrder", params)
            .await?;
        let raw: LiquiCancelResult = decode(payload)?;
        debug!(exchange = %ExchangeId::Liqui, order_id = raw.order_id, "Order cancelled");
        Ok(())
    }

    async fn trade_history(&self, filter: &TradeHistoryFilter) -> ExchangeResult<Vec<TradeHistoryEntry>> {
        let mut params = ParamSet::new();
        let mut set = |name: &str, value: Option<String>| {
            if let Some(value) = value {
                params.insert(name.to_string(), value);
            }
        };
        set("from", filter.from.map(|v| v.to_string()));
        set("count", filter.count.map(|v| v.to_string()));
        set("from_id", filter.from_id.clone());
        set("end_id", filter.end_id.clone());
        set(
            "order",
            filter.order.map(|o| match o {
                SortOrder::Ascending => "ASC".to_string(),
                SortOrder::Descending => "DESC".to_string(),
            }),
        );
        set("since", filter.since.map(|t| t.timestamp().to_string()));
        set("end", filter.end.map(|t| t.timestamp().to_string()));
        set("pair", filter.pair.as_ref().map(|p| self.inner.translator.to_wire(p)));

        let payload = self
            .inner
            .post_private(Operation::TradeHistory, "TradeHistory", params)
            .await?;
        let mut entries = self
            .inner
            .decode_keyed::<LiquiHistoryEntry, _, _>(payload, conversions::history_entry)?;
        match filter.order.unwrap_or_default() {
            SortOrder::Ascending => entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp)),
            SortOrder::Descending => entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
        }
        Ok(entries)
    }

    async fn withdraw(
        &self,
        currency: &str,
        amount: Decimal,
        address: &str,
    ) -> ExchangeResult<WithdrawalReceipt> {
        if amount <= Decimal::ZERO {
            return Err(ExchangeError::InvalidParameter(format!("amount must be positive, got {}", amount)));
        }
        if address.trim().is_empty() {
            return Err(ExchangeError::InvalidParameter("withdrawal address is empty".to_string()));
        }

        let mut params = ParamSet::new();
        params.insert("coinName".to_string(), currency.to_ascii_uppercase());
        params.insert("amount".to_string(), amount.normalize().to_string());
        params.insert("address".to_string(), address.to_string());

        let payload = self
            .inner
            .post_private(Operation::Withdraw, "WithdrawCoin", params)
            .await?;
        let raw: LiquiWithdrawResult = decode(payload)?;
        let transaction_id = match raw.transaction_id {
            Value::String(id) => id,
            other => other.to_string(),
        };
        Ok(WithdrawalReceipt {
            transaction_id,
            amount_sent: raw.amount_sent,
            balances: conversions::balances(raw.funds),
        })
    }

    fn estimate_fee(&self, request: &FeeRequest) -> ExchangeResult<Decimal> {
        self.inner.capabilities.require(ExchangeId::Liqui, Operation::EstimateFee)?;
        Ok(estimate_fee(&self.inner.fees, request))
    }
}
