//! Exchange registry: the adapters this daemon serves, over one shared cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use bourse_connectors::{
    HttpTransport, LiquiAdapter, LiquiConfig, PoloniexAdapter, PoloniexConfig, SharedCache,
};
use bourse_domain::ExchangeId;
use bourse_exec::{ExchangePort, Transport};

use crate::config::{Config, ExchangeConfig};
use crate::error::{DaemonError, DaemonResult};

/// Enabled adapters keyed by venue.
pub struct ExchangeRegistry {
    exchanges: BTreeMap<ExchangeId, Arc<dyn ExchangePort>>,
    cache: SharedCache,
}

impl ExchangeRegistry {
    /// Empty registry over `cache`.
    pub fn new(cache: SharedCache) -> Self {
        Self {
            exchanges: BTreeMap::new(),
            cache,
        }
    }

    /// Build adapters for every enabled exchange in `config`, sharing one
    /// HTTP client and one cache.
    pub fn from_config(config: &Config) -> DaemonResult<Self> {
        let transport: Arc<dyn Transport> =
            Arc::new(HttpTransport::new(config.market_data.http_timeout)?);
        Self::with_transport(config, transport)
    }

    /// Same as `from_config` over a caller-supplied transport.
    pub fn with_transport(config: &Config, transport: Arc<dyn Transport>) -> DaemonResult<Self> {
        let mut registry = Self::new(SharedCache::new());
        for exchange in config.enabled_exchanges() {
            let adapter = build_adapter(exchange, transport.clone(), registry.cache.clone())?;
            registry.register(adapter);
        }
        Ok(registry)
    }

    /// Add or replace the adapter for its venue.
    pub fn register(&mut self, exchange: Arc<dyn ExchangePort>) {
        let id = exchange.id();
        info!(
            exchange = %id,
            pairs = exchange.enabled_pairs().len(),
            "Exchange registered"
        );
        self.exchanges.insert(id, exchange);
    }

    /// Adapter for `id`.
    pub fn get(&self, id: ExchangeId) -> DaemonResult<Arc<dyn ExchangePort>> {
        self.exchanges
            .get(&id)
            .cloned()
            .ok_or_else(|| DaemonError::ExchangeNotEnabled(id.to_string()))
    }

    /// Registered adapters in venue order.
    pub fn exchanges(&self) -> impl Iterator<Item = &Arc<dyn ExchangePort>> {
        self.exchanges.values()
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Cache shared by every registered adapter.
    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }
}

fn build_adapter(
    exchange: &ExchangeConfig,
    transport: Arc<dyn Transport>,
    cache: SharedCache,
) -> DaemonResult<Arc<dyn ExchangePort>> {
    match exchange.id {
        ExchangeId::Liqui => {
            let mut config = LiquiConfig::new(exchange.pairs.clone());
            config.credentials = exchange.credentials.clone();
            config.orderbook_depth = exchange.orderbook_depth;
            Ok(Arc::new(LiquiAdapter::new(config, transport, cache)))
        }
        ExchangeId::Poloniex => {
            let mut config = PoloniexConfig::new(exchange.pairs.clone());
            config.credentials = exchange.credentials.clone();
            if let Some(depth) = exchange.orderbook_depth {
                config.orderbook_depth = depth;
            }
            Ok(Arc::new(PoloniexAdapter::new(config, transport, cache)))
        }
        ExchangeId::Stub => Err(DaemonError::Config(
            "the stub exchange cannot be configured from the environment".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bourse_exec::{Operation, StubExchange};
    use bourse_testkit::MockTransport;

    #[test]
    fn test_builds_enabled_exchanges_only() {
        let mut config = Config::default();
        for exchange in &mut config.exchanges {
            exchange.enabled = exchange.id == ExchangeId::Poloniex;
        }

        let registry = ExchangeRegistry::with_transport(&config, Arc::new(MockTransport::new())).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.get(ExchangeId::Poloniex).is_ok());
        assert!(matches!(
            registry.get(ExchangeId::Liqui),
            Err(DaemonError::ExchangeNotEnabled(_))
        ));
    }

    #[test]
    fn test_capabilities_differ_per_venue() {
        let config = Config::default();
        let registry = ExchangeRegistry::with_transport(&config, Arc::new(MockTransport::new())).unwrap();

        let liqui = registry.get(ExchangeId::Liqui).unwrap();
        let poloniex = registry.get(ExchangeId::Poloniex).unwrap();
        assert!(liqui.capabilities().supports(Operation::Withdraw));
        assert!(!poloniex.capabilities().supports(Operation::Withdraw));
    }

    #[test]
    fn test_register_replaces_same_venue() {
        let mut registry = ExchangeRegistry::new(SharedCache::new());
        registry.register(Arc::new(StubExchange::new()));
        registry.register(Arc::new(StubExchange::new()));

        assert_eq!(registry.len(), 1);
    }
}
