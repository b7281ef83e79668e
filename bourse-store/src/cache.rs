//! Single-flight snapshot cache.
//!
//! Populated entries live behind an `RwLock` so lookups never wait on a
//! network fetch. Misses go through a `Mutex`-guarded map of in-flight
//! refreshes: the first caller installs a shared future, later callers for the
//! same key await that same future and receive its value or its error.
//!
//! Each installed refresh is driven by its own tokio task, so it runs to
//! completion even when every caller stops waiting.
//!
//! Lock order: the in-flight lock may be held while reading `entries`; the
//! refresh future never holds both at once. Caller-supplied refresh code is
//! never invoked under either lock.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tracing::debug;

use bourse_domain::{AssetType, CurrencyPair, ExchangeId, OrderbookSnapshot, TickerSnapshot};

// =============================================================================
// Key
// =============================================================================

/// Cache key: one snapshot per (exchange, pair, asset type).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Exchange the snapshot came from
    pub exchange: ExchangeId,
    /// Canonical pair
    pub pair: CurrencyPair,
    /// Market category
    pub asset: AssetType,
}

impl CacheKey {
    /// Create a key.
    pub fn new(exchange: ExchangeId, pair: CurrencyPair, asset: AssetType) -> Self {
        Self {
            exchange,
            pair,
            asset,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.exchange, self.pair, self.asset)
    }
}

/// Counters for one snapshot cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups served from a populated entry
    pub hits: u64,
    /// Misses that started a refresh
    pub misses: u64,
    /// Misses that joined a refresh already in flight
    pub coalesced: u64,
    /// Refreshes that completed with an error
    pub failed_refreshes: u64,
    /// Populated entries
    pub entries: u64,
}

// =============================================================================
// SnapshotCache
// =============================================================================

type SharedRefresh<V, E> = Shared<BoxFuture<'static, Result<Arc<V>, E>>>;

struct Inner<V, E> {
    entries: RwLock<HashMap<CacheKey, Arc<V>>>,
    inflight: Mutex<HashMap<CacheKey, SharedRefresh<V, E>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    failed_refreshes: AtomicU64,
}

/// Keyed store of immutable snapshots with single-flight refresh.
///
/// Cloning is cheap and every clone shares the same entries.
/// Errors from a refresh are handed to every waiter and never cached.
pub struct SnapshotCache<V, E> {
    inner: Arc<Inner<V, E>>,
}

impl<V, E> Clone for SnapshotCache<V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, E> Default for SnapshotCache<V, E>
where
    V: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> SnapshotCache<V, E>
where
    V: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                inflight: Mutex::new(HashMap::new()),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                coalesced: AtomicU64::new(0),
                failed_refreshes: AtomicU64::new(0),
            }),
        }
    }

    /// Non-blocking lookup.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<V>> {
        let found = read(&self.inner.entries).get(key).cloned();
        if found.is_some() {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Unconditional overwrite.
    pub fn put(&self, key: CacheKey, snapshot: impl Into<Arc<V>>) {
        write(&self.inner.entries).insert(key, snapshot.into());
    }

    /// Replace every given entry under a single write lock.
    ///
    /// Readers observe either none or all of the batch.
    pub fn put_many(&self, batch: impl IntoIterator<Item = (CacheKey, Arc<V>)>) -> usize {
        let mut entries = write(&self.inner.entries);
        let mut stored = 0;
        for (key, snapshot) in batch {
            entries.insert(key, snapshot);
            stored += 1;
        }
        stored
    }

    /// Cached snapshot, or the result of `refresh` stored under `key`.
    ///
    /// Concurrent callers missing on the same key share one call to
    /// `refresh`, which is invoked with no lock held. Dropping the returned
    /// future never cancels the refresh; its result still lands in the cache.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn get_or_refresh<F, Fut>(&self, key: CacheKey, refresh: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Arc<V>, E>> + Send + 'static,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }

        if let Some(existing) = self.join_inflight(&key) {
            return existing.await;
        }

        // Built outside the lock; dropped unpolled if another caller won.
        let candidate = self.shared_refresh(key.clone(), refresh());

        let pending = {
            let mut inflight = lock(&self.inner.inflight);

            // A refresh may have landed since the first lookup.
            if let Some(hit) = self.get(&key) {
                return Ok(hit);
            }

            match inflight.get(&key) {
                Some(existing) => {
                    self.inner.coalesced.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, "Joining in-flight refresh");
                    existing.clone()
                }
                None => {
                    self.inner.misses.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, "Cache miss, starting refresh");
                    inflight.insert(key, candidate.clone());
                    tokio::spawn(candidate.clone());
                    candidate
                }
            }
        };

        pending.await
    }

    /// The refresh already running for `key`, if any.
    fn join_inflight(&self, key: &CacheKey) -> Option<SharedRefresh<V, E>> {
        let existing = lock(&self.inner.inflight).get(key).cloned()?;
        self.inner.coalesced.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "Joining in-flight refresh");
        Some(existing)
    }

    fn shared_refresh<Fut>(&self, key: CacheKey, fetch: Fut) -> SharedRefresh<V, E>
    where
        Fut: Future<Output = Result<Arc<V>, E>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);

        async move {
            let result = fetch.await;
            match &result {
                Ok(snapshot) => {
                    write(&inner.entries).insert(key.clone(), Arc::clone(snapshot));
                }
                Err(_) => {
                    inner.failed_refreshes.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, "Refresh failed");
                }
            }
            lock(&inner.inflight).remove(&key);
            result
        }
        .boxed()
        .shared()
    }

    /// Number of populated entries.
    pub fn len(&self) -> usize {
        read(&self.inner.entries).len()
    }

    /// Whether no entry is populated.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            coalesced: self.inner.coalesced.load(Ordering::Relaxed),
            failed_refreshes: self.inner.failed_refreshes.load(Ordering::Relaxed),
            entries: self.len() as u64,
        }
    }
}

#[cfg(test)]
impl<V, E> SnapshotCache<V, E> {
    fn is_refreshing(&self, key: &CacheKey) -> bool {
        lock(&self.inner.inflight).contains_key(key)
    }

    fn keys_for(&self, exchange: ExchangeId) -> Vec<CacheKey> {
        read(&self.inner.entries)
            .keys()
            .filter(|key| key.exchange == exchange)
            .cloned()
            .collect()
    }
}

// Poisoning only means another thread panicked mid-insert; the maps stay
// structurally valid, so keep serving.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<K: Eq + Hash, T>(mutex: &Mutex<HashMap<K, T>>) -> MutexGuard<'_, HashMap<K, T>> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// MarketDataCache
// =============================================================================

/// Latest tickers and orderbooks for every adapter in the process.
pub struct MarketDataCache<E> {
    tickers: SnapshotCache<TickerSnapshot, E>,
    orderbooks: SnapshotCache<OrderbookSnapshot, E>,
}

impl<E> Clone for MarketDataCache<E> {
    fn clone(&self) -> Self {
        Self {
            tickers: self.tickers.clone(),
            orderbooks: self.orderbooks.clone(),
        }
    }
}

impl<E: Clone + Send + Sync + 'static> Default for MarketDataCache<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Send + Sync + 'static> MarketDataCache<E> {
    /// Create empty caches.
    pub fn new() -> Self {
        Self {
            tickers: SnapshotCache::new(),
            orderbooks: SnapshotCache::new(),
        }
    }

    /// Ticker snapshots
    pub fn tickers(&self) -> &SnapshotCache<TickerSnapshot, E> {
        &self.tickers
    }

    /// Orderbook snapshots
    pub fn orderbooks(&self) -> &SnapshotCache<OrderbookSnapshot, E> {
        &self.orderbooks
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::oneshot;

    type Tickers = SnapshotCache<TickerSnapshot, String>;

    fn pair(base: &str, quote: &str) -> CurrencyPair {
        CurrencyPair::new(base, quote).unwrap()
    }

    fn key(base: &str, quote: &str) -> CacheKey {
        CacheKey::new(ExchangeId::Liqui, pair(base, quote), AssetType::Spot)
    }

    fn ticker(base: &str, quote: &str, last: Decimal) -> Arc<TickerSnapshot> {
        Arc::new(
            TickerSnapshot::new(
                pair(base, quote),
                last,
                last,
                last,
                last,
                last,
                dec!(10),
                Utc::now(),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_get_misses_on_empty_cache() {
        let cache = Tickers::new();

        assert!(cache.get(&key("ETH", "BTC")).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 0);
    }

    #[tokio::test]
    async fn test_put_overwrites_and_keeps_old_views_intact() {
        let cache = Tickers::new();
        let k = key("ETH", "BTC");

        cache.put(k.clone(), ticker("ETH", "BTC", dec!(0.03)));
        let old = cache.get(&k).unwrap();
        cache.put(k.clone(), ticker("ETH", "BTC", dec!(0.04)));

        assert_eq!(old.last(), dec!(0.03));
        assert_eq!(cache.get(&k).unwrap().last(), dec!(0.04));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_hit_skips_refresh() {
        let cache = Tickers::new();
        let k = key("ETH", "BTC");
        cache.put(k.clone(), ticker("ETH", "BTC", dec!(0.03)));

        let value = cache
            .get_or_refresh(k, || async { Err::<Arc<TickerSnapshot>, _>("must not run".to_string()) })
            .await
            .unwrap();

        assert_eq!(value.last(), dec!(0.03));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_share_one_refresh() {
        let cache = Tickers::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_refresh(key("ETH", "BTC"), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(ticker("ETH", "BTC", dec!(0.03)))
                    })
                    .await
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
        assert!(!cache.is_refreshing(&key("ETH", "BTC")));
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_share_one_error() {
        let cache = Tickers::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_refresh(key("ETH", "BTC"), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err::<Arc<TickerSnapshot>, _>("exchange down".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap_err(), "exchange down");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.get(&key("ETH", "BTC")).is_none());
        assert_eq!(cache.stats().failed_refreshes, 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = Tickers::new();
        let k = key("ETH", "BTC");

        let first = cache
            .get_or_refresh(k.clone(), || async { Err("timeout".to_string()) })
            .await;
        assert!(first.is_err());

        let second = cache
            .get_or_refresh(k, || async { Ok(ticker("ETH", "BTC", dec!(0.05))) })
            .await
            .unwrap();
        assert_eq!(second.last(), dec!(0.05));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_abandoned_leader_does_not_cancel_waiters() {
        let cache = Tickers::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let (release, gate) = oneshot::channel::<()>();

        let leader = {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                cache
                    .get_or_refresh(key("ETH", "BTC"), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        let _ = gate.await;
                        Ok(ticker("ETH", "BTC", dec!(0.07)))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let waiter = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_refresh(key("ETH", "BTC"), || async {
                        Err::<Arc<TickerSnapshot>, _>("second refresh must not run".to_string())
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.stats().coalesced, 1);

        leader.abort();
        let _ = release.send(());

        let value = waiter.await.unwrap().unwrap();
        assert_eq!(value.last(), dec!(0.07));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_refresh_completes_after_its_only_caller_leaves() {
        let cache = Tickers::new();
        let (release, gate) = oneshot::channel::<()>();

        let caller = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_refresh(key("ETH", "BTC"), move || async move {
                        let _ = gate.await;
                        Ok(ticker("ETH", "BTC", dec!(0.08)))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        caller.abort();
        let _ = caller.await;
        let _ = release.send(());

        for _ in 0..50 {
            if !cache.is_refreshing(&key("ETH", "BTC")) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!cache.is_refreshing(&key("ETH", "BTC")));
        assert_eq!(cache.get(&key("ETH", "BTC")).unwrap().last(), dec!(0.08));
    }

    #[tokio::test]
    async fn test_refresh_closure_runs_without_locks_held() {
        let cache = Tickers::new();
        let observer = cache.clone();

        let value = cache
            .get_or_refresh(key("ETH", "BTC"), move || {
                assert!(observer.get(&key("ETH", "BTC")).is_none());
                assert!(!observer.is_refreshing(&key("ETH", "BTC")));
                async { Ok(ticker("ETH", "BTC", dec!(0.09))) }
            })
            .await
            .unwrap();

        assert_eq!(value.last(), dec!(0.09));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_other_keys_are_not_blocked_by_a_refresh() {
        let cache = Tickers::new();
        cache.put(key("LTC", "BTC"), ticker("LTC", "BTC", dec!(0.01)));
        let (release, gate) = oneshot::channel::<()>();

        let slow = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_refresh(key("ETH", "BTC"), move || async move {
                        let _ = gate.await;
                        Ok(ticker("ETH", "BTC", dec!(0.03)))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(cache.get(&key("LTC", "BTC")).is_some());
        let other = cache
            .get_or_refresh(key("BTC", "USDT"), || async { Ok(ticker("BTC", "USDT", dec!(6000))) })
            .await
            .unwrap();
        assert_eq!(other.last(), dec!(6000));
        assert!(cache.is_refreshing(&key("ETH", "BTC")));

        let _ = release.send(());
        assert!(slow.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_put_many_replaces_batch() {
        let cache = Tickers::new();
        cache.put(key("ETH", "BTC"), ticker("ETH", "BTC", dec!(0.01)));

        let stored = cache.put_many(vec![
            (key("ETH", "BTC"), ticker("ETH", "BTC", dec!(0.02))),
            (key("LTC", "BTC"), ticker("LTC", "BTC", dec!(0.005))),
        ]);

        assert_eq!(stored, 2);
        assert_eq!(cache.get(&key("ETH", "BTC")).unwrap().last(), dec!(0.02));
        assert_eq!(cache.keys_for(ExchangeId::Liqui).len(), 2);
        assert!(cache.keys_for(ExchangeId::Poloniex).is_empty());
    }

    #[test]
    fn test_market_data_cache_keeps_kinds_apart() {
        let cache: MarketDataCache<String> = MarketDataCache::new();
        cache.tickers().put(key("ETH", "BTC"), ticker("ETH", "BTC", dec!(0.03)));

        assert_eq!(cache.tickers().len(), 1);
        assert!(cache.orderbooks().is_empty());
        assert!(cache.clone().tickers().get(&key("ETH", "BTC")).is_some());
    }
}
