//! End-to-end: configured adapters over a mocked venue, polled into the shared
//! cache and served through the HTTP API.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use tokio_util::sync::CancellationToken;
use tower::util::ServiceExt;

use bourse_domain::{AssetType, ExchangeId, TickerSnapshot};
use bourse_store::CacheKey;
use bourse_testkit::{pair, MockTransport};
use boursed::api::{create_router, ApiState};
use boursed::{Config, ExchangeRegistry, MarketDataPoller, Metrics};

const LIQUI_TICKERS: &str = r#"{
    "eth_btc": {"high":0.08,"low":0.07,"avg":0.075,"vol":1,"vol_cur":160.5,
                "last":0.0755,"buy":0.0756,"sell":0.0754,"updated":1510000000},
    "ltc_btc": {"high":0.011,"low":"broken","avg":0.01,"vol":1,"vol_cur":20,
                "last":0.0105,"buy":0.0106,"sell":0.0104,"updated":1510000000}
}"#;

fn liqui_only_config() -> Config {
    let mut config = Config::default();
    for exchange in &mut config.exchanges {
        exchange.enabled = exchange.id == ExchangeId::Liqui;
        exchange.pairs = vec![pair("ETH/BTC"), pair("LTC/BTC")];
    }
    config
}

fn mock_liqui() -> Arc<MockTransport> {
    let transport = Arc::new(MockTransport::new());
    transport
        .respond("https://api.liqui.io/api/3/ticker/", 200, LIQUI_TICKERS)
        .respond("https://api.liqui.io/api/3/depth/", 200, r#"{"success":0,"error":"maintenance"}"#);
    transport
}

#[tokio::test]
async fn test_poll_then_serve_from_cache() {
    let transport = mock_liqui();
    let registry = Arc::new(
        ExchangeRegistry::with_transport(&liqui_only_config(), transport.clone()).unwrap(),
    );
    let metrics = Arc::new(Metrics::new().unwrap());
    let poller = MarketDataPoller::new(
        registry.clone(),
        metrics.clone(),
        Duration::from_secs(60),
        CancellationToken::new(),
    );

    let summary = poller.poll_once().await;

    assert_eq!(summary.updated, 1);
    assert_eq!(summary.failed_pairs, 1);
    assert_eq!(summary.failed_batches, 1);
    let key = CacheKey::new(ExchangeId::Liqui, pair("ETH/BTC"), AssetType::Spot);
    assert!(registry.cache().tickers().get(&key).is_some());

    // Served from the warm cache: no further venue traffic.
    let calls_after_poll = transport.call_count();
    let app = create_router(Arc::new(ApiState {
        registry,
        metrics,
    }));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/exchanges/liqui/ticker/ETH_BTC")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let ticker: TickerSnapshot = serde_json::from_slice(&body).unwrap();
    assert_eq!(ticker.bid(), dec!(0.0754));
    assert_eq!(transport.call_count(), calls_after_poll);
}

#[tokio::test]
async fn test_cold_orderbook_request_surfaces_api_error() {
    let transport = mock_liqui();
    let registry = Arc::new(
        ExchangeRegistry::with_transport(&liqui_only_config(), transport.clone()).unwrap(),
    );
    let app = create_router(Arc::new(ApiState {
        registry,
        metrics: Arc::new(Metrics::new().unwrap()),
    }));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/exchanges/liqui/orderbook/ETH_BTC")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(transport.call_count(), 1);
}
