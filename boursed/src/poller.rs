//! Market-data poller.
//!
//! On every tick each registered exchange refreshes all of its enabled pairs
//! in one batch per kind, warming the shared cache. Exchanges are polled
//! concurrently; a failing exchange or pair never stops the others.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bourse_exec::{BatchReport, ExchangePort, ExchangeResult, Operation};

use crate::metrics::Metrics;
use crate::registry::ExchangeRegistry;

/// Totals for one polling round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Snapshots stored
    pub updated: usize,
    /// Pairs that failed inside a batch
    pub failed_pairs: usize,
    /// Batch calls that failed as a whole
    pub failed_batches: usize,
}

impl PollSummary {
    fn add(&mut self, result: &ExchangeResult<BatchReport>) {
        match result {
            Ok(report) => {
                self.updated += report.updated.len();
                self.failed_pairs += report.failed.len();
            }
            Err(_) => self.failed_batches += 1,
        }
    }
}

/// Periodic batch refresher.
pub struct MarketDataPoller {
    registry: Arc<ExchangeRegistry>,
    metrics: Arc<Metrics>,
    interval: Duration,
    cancel_token: CancellationToken,
}

impl MarketDataPoller {
    pub fn new(
        registry: Arc<ExchangeRegistry>,
        metrics: Arc<Metrics>,
        interval: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            registry,
            metrics,
            interval,
            cancel_token,
        }
    }

    /// Poll until the token is cancelled. The first round runs immediately.
    pub async fn run(self) {
        info!(
            exchanges = self.registry.len(),
            interval_ms = self.interval.as_millis() as u64,
            "Market-data poller started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Market-data poller stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let summary = self.poll_once().await;
                    debug!(
                        updated = summary.updated,
                        failed_pairs = summary.failed_pairs,
                        failed_batches = summary.failed_batches,
                        "Poll round complete"
                    );
                }
            }
        }
    }

    /// One round over every registered exchange.
    pub async fn poll_once(&self) -> PollSummary {
        let rounds = self
            .registry
            .exchanges()
            .map(|exchange| self.poll_exchange(Arc::clone(exchange)));

        let mut summary = PollSummary::default();
        for result in join_all(rounds).await.iter().flatten() {
            summary.add(result);
        }
        self.metrics.observe_cache(self.registry.cache());
        summary
    }

    async fn poll_exchange(&self, exchange: Arc<dyn ExchangePort>) -> Vec<ExchangeResult<BatchReport>> {
        let mut results = Vec::with_capacity(2);

        if exchange.capabilities().supports(Operation::Ticker) {
            let result = exchange.refresh_tickers().await;
            self.record(exchange.as_ref(), "ticker", &result);
            results.push(result);
        }
        if exchange.capabilities().supports(Operation::Orderbook) {
            let result = exchange.refresh_orderbooks().await;
            self.record(exchange.as_ref(), "orderbook", &result);
            results.push(result);
        }

        results
    }

    fn record(&self, exchange: &dyn ExchangePort, kind: &str, result: &ExchangeResult<BatchReport>) {
        match result {
            Ok(report) => {
                for (pair, error) in &report.failed {
                    warn!(exchange = %exchange.id(), kind, pair = %pair, error = %error, "Pair refresh failed");
                }
            }
            Err(error) => {
                warn!(exchange = %exchange.id(), kind, error = %error, "Batch refresh failed");
            }
        }
        self.metrics.record_poll(exchange.id(), kind, result);
    }
}

// =============================================================================
// Tests
// =============================================================================
