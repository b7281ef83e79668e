//! Bourse Market-Data Store
//!
//! Process-wide, in-memory cache of the latest ticker and orderbook snapshot
//! per (exchange, pair, asset type).
//!
//! # Architecture
//!
//! - **SnapshotCache**: one keyed map of immutable snapshots with
//!   get-or-refresh semantics; concurrent misses on a key share one refresh
//! - **MarketDataCache**: a ticker cache plus an orderbook cache
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use bourse_domain::{AssetType, CurrencyPair, ExchangeId, TickerSnapshot};
//! use bourse_store::{CacheKey, MarketDataCache};
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache: MarketDataCache<String> = MarketDataCache::new();
//!     let pair = CurrencyPair::new("ETH", "BTC").unwrap();
//!     let key = CacheKey::new(ExchangeId::Liqui, pair.clone(), AssetType::Spot);
//!
//!     let ticker = cache
//!         .tickers()
//!         .get_or_refresh(key.clone(), move || async move {
//!             let one = Decimal::ONE;
//!             TickerSnapshot::new(pair, one, one, one, one, one, one, chrono::Utc::now())
//!                 .map(Arc::new)
//!                 .map_err(|e| e.to_string())
//!         })
//!         .await
//!         .unwrap();
//!
//!     assert!(Arc::ptr_eq(&ticker, &cache.tickers().get(&key).unwrap()));
//! }
//! ```

#![warn(clippy::all)]

// Modules
mod cache;

// Re-exports
pub use cache::{CacheKey, CacheStats, MarketDataCache, SnapshotCache};
