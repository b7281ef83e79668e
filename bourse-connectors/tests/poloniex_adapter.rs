//! Poloniex adapter against a mocked transport.

use std::sync::Arc;

use rust_decimal_macros::dec;

use bourse_connectors::{PoloniexAdapter, PoloniexConfig, SharedCache};
use bourse_domain::{ApiCredentials, AssetType, ExchangeId, FeeRequest, OrderId, OrderSide};
use bourse_exec::{ExchangeError, ExchangePort, HttpMethod, Operation};
use bourse_store::CacheKey;
use bourse_testkit::{assert_capabilities_hold, pair, MockTransport};

const PUBLIC: &str = "http://polo.test/public";
const PRIVATE: &str = "http://polo.test/tradingApi";

const TICKERS: &str = r#"{
    "BTC_ETH": {"id":148,"last":"0.0251","lowestAsk":"0.0252","highestBid":"0.0250",
                "percentChange":"0.01","baseVolume":"134.5","quoteVolume":"5300.1",
                "isFrozen":"0","high24hr":"0.0260","low24hr":"0.0240"},
    "BTC_LTC": {"id":50,"last":"0.0090","lowestAsk":"0.0091","highestBid":"0.0089",
                "percentChange":"0.00","baseVolume":"20.1","quoteVolume":"2233.3",
                "isFrozen":"0","high24hr":"0.0093","low24hr":"0.0088"}
}"#;

fn adapter(transport: &Arc<MockTransport>, cache: &SharedCache, pairs: &[&str]) -> PoloniexAdapter {
    let config =
        PoloniexConfig::new(pairs.iter().map(|p| pair(p)).collect()).with_urls(PUBLIC, PRIVATE);
    PoloniexAdapter::new(config, transport.clone(), cache.clone())
}

#[tokio::test]
async fn test_ticker_picks_pair_from_all_pairs_response() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(format!("{PUBLIC}?command=returnTicker"), 200, TICKERS);
    let cache = SharedCache::new();
    let polo = adapter(&transport, &cache, &["ETH/BTC"]);

    let ticker = polo.ticker(&pair("ETH/BTC")).await.unwrap();

    assert_eq!(ticker.bid(), dec!(0.0250));
    assert_eq!(ticker.ask(), dec!(0.0252));
    assert_eq!(ticker.volume(), dec!(134.5));

    // Unconfigured pairs in the response stay out of the cache.
    let ltc = CacheKey::new(ExchangeId::Poloniex, pair("LTC/BTC"), AssetType::Spot);
    assert!(cache.tickers().get(&ltc).is_none());
}

#[tokio::test]
async fn test_refresh_reports_pairs_missing_from_response() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(format!("{PUBLIC}?command=returnTicker"), 200, TICKERS);
    let polo = adapter(&transport, &SharedCache::new(), &["ETH/BTC", "XMR/BTC"]);

    let report = polo.refresh_tickers().await.unwrap();

    assert_eq!(report.updated, vec![pair("ETH/BTC")]);
    assert!(!report.is_complete());
    assert!(report.failure(&pair("XMR/BTC")).is_some());
}

#[tokio::test]
async fn test_orderbook_query_and_levels() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
        format!("{PUBLIC}?command=returnOrderBook"),
        200,
        r#"{"BTC_ETH":{"asks":[["0.0252",10.5],["0.0253",1]],
                       "bids":[["0.0250",3]],"isFrozen":"0","seq":9}}"#,
    );
    let polo = adapter(&transport, &SharedCache::new(), &["ETH/BTC"]);

    let book = polo.orderbook(&pair("ETH/BTC")).await.unwrap();

    assert_eq!(book.best_bid(), Some(dec!(0.0250)));
    assert_eq!(book.best_ask(), Some(dec!(0.0252)));
    assert_eq!(
        transport.requests()[0].url,
        format!("{PUBLIC}?command=returnOrderBook&currencyPair=all&depth=1000")
    );
}

#[tokio::test]
async fn test_error_field_is_an_api_error() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
        format!("{PUBLIC}?command=returnTicker"),
        200,
        r#"{"error":"Please do not make more than 6 API calls per second."}"#,
    );
    let polo = adapter(&transport, &SharedCache::new(), &["ETH/BTC"]);

    let err = polo.ticker(&pair("ETH/BTC")).await.unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::ExchangeApi {
            exchange: ExchangeId::Poloniex,
            ..
        }
    ));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unsupported_operations() {
    let transport = Arc::new(MockTransport::new());
    let polo = adapter(&transport, &SharedCache::new(), &["ETH/BTC"]);

    assert!(!polo.capabilities().supports(Operation::SubmitOrder));

    let err = polo
        .submit_order(&pair("ETH/BTC"), OrderSide::Buy, dec!(1), dec!(0.025))
        .await
        .unwrap_err();
    assert!(err.is_unsupported());

    assert!(polo.cancel_order(&OrderId::new("1")).await.unwrap_err().is_unsupported());
    assert!(polo.trades(&pair("ETH/BTC"), None).await.unwrap_err().is_unsupported());
    assert!(polo.exchange_info().await.unwrap_err().is_unsupported());
    assert!(polo
        .withdraw("BTC", dec!(1), "addr")
        .await
        .unwrap_err()
        .is_unsupported());
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_every_operation_matches_declared_capabilities() {
    let transport = Arc::new(MockTransport::new());
    let config = PoloniexConfig::new(vec![pair("ETH/BTC")])
        .with_urls(PUBLIC, PRIVATE)
        .with_credentials(ApiCredentials::new("polo-key", "polo-secret"));
    let polo = PoloniexAdapter::new(config, transport.clone(), SharedCache::new());

    assert_capabilities_hold(&polo, &transport).await;
    // Ticker, orderbook and balances each tried the network once.
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test]
async fn test_fee_estimate_is_supported() {
    let transport = Arc::new(MockTransport::new());
    let polo = adapter(&transport, &SharedCache::new(), &["ETH/BTC"]);

    let fee = polo
        .estimate_fee(&FeeRequest::trade(dec!(0.025), dec!(100), true))
        .unwrap();
    assert_eq!(fee, dec!(0.00375));
}

#[tokio::test]
async fn test_balances_use_command_field() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(PRIVATE, 200, r#"{"BTC":"0.59098578","LTC":"3.31117268"}"#);
    let config = PoloniexConfig::new(vec![pair("ETH/BTC")])
        .with_urls(PUBLIC, PRIVATE)
        .with_credentials(ApiCredentials::new("polo-key", "polo-secret"));
    let polo = PoloniexAdapter::new(config, transport.clone(), SharedCache::new());

    let info = polo.account_info().await.unwrap();
    assert_eq!(info.balances.available("LTC"), dec!(3.31117268));

    let requests = transport.requests();
    let request = &requests[0];
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.header("Key"), Some("polo-key"));
    let body = request.body.as_deref().unwrap();
    assert!(body.starts_with("command=returnBalances&nonce="));
}

#[tokio::test]
async fn test_balances_without_credentials() {
    let transport = Arc::new(MockTransport::new());
    let polo = adapter(&transport, &SharedCache::new(), &["ETH/BTC"]);

    let err = polo.account_info().await.unwrap_err();
    assert_eq!(err, ExchangeError::MissingCredentials(ExchangeId::Poloniex));
    assert_eq!(transport.call_count(), 0);
}
