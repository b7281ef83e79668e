//! Prometheus metrics for the poller and the market-data cache.

use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use bourse_connectors::SharedCache;
use bourse_domain::ExchangeId;
use bourse_exec::{BatchReport, ExchangeResult};
use bourse_store::CacheStats;

use crate::error::{DaemonError, DaemonResult};

/// Daemon metrics on a private registry.
pub struct Metrics {
    registry: Registry,
    polls: IntCounterVec,
    pair_failures: IntCounterVec,
    cache: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> DaemonResult<Self> {
        let registry = Registry::new();

        let polls = IntCounterVec::new(
            Opts::new("bourse_polls_total", "Batch refreshes by exchange, kind and outcome"),
            &["exchange", "kind", "outcome"],
        )?;
        let pair_failures = IntCounterVec::new(
            Opts::new(
                "bourse_pair_failures_total",
                "Pairs that failed inside an otherwise successful batch",
            ),
            &["exchange", "kind"],
        )?;
        let cache = IntGaugeVec::new(
            Opts::new("bourse_cache", "Market-data cache counters"),
            &["kind", "stat"],
        )?;

        registry.register(Box::new(polls.clone()))?;
        registry.register(Box::new(pair_failures.clone()))?;
        registry.register(Box::new(cache.clone()))?;

        Ok(Self {
            registry,
            polls,
            pair_failures,
            cache,
        })
    }

    /// Count one batch refresh.
    ///
    /// `outcome` is `ok`, `partial` when some pairs failed, or `error`.
    pub fn record_poll(&self, exchange: ExchangeId, kind: &str, result: &ExchangeResult<BatchReport>) {
        let outcome = match result {
            Ok(report) if report.is_complete() => "ok",
            Ok(report) => {
                self.pair_failures
                    .with_label_values(&[exchange.as_str(), kind])
                    .inc_by(report.failed.len() as u64);
                "partial"
            }
            Err(_) => "error",
        };
        self.polls
            .with_label_values(&[exchange.as_str(), kind, outcome])
            .inc();
    }

    /// Copy the cache counters into the gauges.
    pub fn observe_cache(&self, cache: &SharedCache) {
        self.set_cache_stats("ticker", cache.tickers().stats());
        self.set_cache_stats("orderbook", cache.orderbooks().stats());
    }

    fn set_cache_stats(&self, kind: &str, stats: CacheStats) {
        let values = [
            ("hits", stats.hits),
            ("misses", stats.misses),
            ("coalesced", stats.coalesced),
            ("failed_refreshes", stats.failed_refreshes),
            ("entries", stats.entries),
        ];
        for (stat, value) in values {
            self.cache
                .with_label_values(&[kind, stat])
                .set(i64::try_from(value).unwrap_or(i64::MAX));
        }
    }

    /// Prometheus text exposition of every metric.
    pub fn render(&self) -> DaemonResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| DaemonError::Metrics(e.to_string()))
    }
}
