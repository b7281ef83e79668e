//! Installing batch-endpoint results into the cache.

use std::sync::Arc;

use tracing::warn;

use bourse_domain::{AssetType, CurrencyPair, ExchangeId};
use bourse_exec::{BatchReport, ExchangeError, ExchangeResult};
use bourse_store::{CacheKey, SnapshotCache};

/// Per-pair results of one batch request.
pub(crate) type PairResults<V> = Vec<(CurrencyPair, ExchangeResult<V>)>;

/// Snapshots installed by a batch plus the per-pair report.
pub(crate) struct BatchOutcome<V> {
    pub snapshots: Vec<(CurrencyPair, Arc<V>)>,
    pub report: BatchReport,
}

impl<V> BatchOutcome<V> {
    /// Result for `pair`: its snapshot, its recorded failure, or a decode error
    /// when the batch did not cover it.
    pub fn take(mut self, pair: &CurrencyPair) -> ExchangeResult<Arc<V>> {
        if let Some(index) = self.snapshots.iter().position(|(p, _)| p == pair) {
            return Ok(self.snapshots.swap_remove(index).1);
        }
        Err(self
            .report
            .failure(pair)
            .cloned()
            .unwrap_or_else(|| ExchangeError::Decode(format!("{} missing from batch", pair))))
    }
}

/// Store every valid snapshot in one atomic replacement and report the rest.
pub(crate) fn install<V>(
    cache: &SnapshotCache<V, ExchangeError>,
    exchange: ExchangeId,
    kind: &'static str,
    results: PairResults<V>,
) -> BatchOutcome<V>
where
    V: Send + Sync + 'static,
{
    let mut snapshots = Vec::with_capacity(results.len());
    let mut report = BatchReport::default();

    for (pair, result) in results {
        match result {
            Ok(snapshot) => {
                report.updated.push(pair.clone());
                snapshots.push((pair, Arc::new(snapshot)));
            }
            Err(err) => {
                warn!(exchange = %exchange, pair = %pair, kind, error = %err, "Batch entry rejected");
                report.failed.push((pair, err));
            }
        }
    }

    cache.put_many(snapshots.iter().map(|(pair, snapshot)| {
        (
            CacheKey::new(exchange, pair.clone(), AssetType::Spot),
            Arc::clone(snapshot),
        )
    }));

    BatchOutcome { snapshots, report }
}

/// Union of the enabled pairs and `extra`, enabled order first, no duplicates.
pub(crate) fn covering(enabled: &[CurrencyPair], extra: Option<&CurrencyPair>) -> Vec<CurrencyPair> {
    let mut pairs = enabled.to_vec();
    if let Some(pair) = extra {
        if !pairs.contains(pair) {
            pairs.push(pair.clone());
        }
    }
    pairs
}
