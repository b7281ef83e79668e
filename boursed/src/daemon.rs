//! Daemon: Main runtime orchestrator.
//!
//! The Daemon ties together all components:
//! - Exchange registry (adapters over one shared cache)
//! - Market-data poller (periodic batch refresh)
//! - API Server (HTTP endpoints)
//! - Metrics
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Build adapters for enabled exchanges
//! 3. Start API server
//! 4. Start the poller
//! 5. Graceful shutdown on SIGINT

use std::net::SocketAddr;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use bourse_connectors::SharedCache;
use bourse_domain::{CurrencyPair, TickerSnapshot};
use bourse_exec::StubExchange;

use crate::api::{create_router, ApiState};
use crate::config::Config;
use crate::error::{DaemonError, DaemonResult};
use crate::metrics::Metrics;
use crate::poller::MarketDataPoller;
use crate::registry::ExchangeRegistry;

// =============================================================================
// Daemon
// =============================================================================

/// The main Bourse daemon.
pub struct Daemon {
    /// Configuration
    config: Config,
    /// Enabled exchanges
    registry: Arc<ExchangeRegistry>,
    /// Metrics registry
    metrics: Arc<Metrics>,
    /// Cancelled on shutdown
    shutdown_token: CancellationToken,
}

impl Daemon {
    /// Create a daemon with live adapters for every enabled exchange.
    pub fn new(config: Config) -> DaemonResult<Self> {
        let registry = ExchangeRegistry::from_config(&config)?;
        Self::with_registry(config, registry)
    }

    /// Create a daemon serving a stub exchange (for testing/development).
    pub fn new_stub(config: Config) -> DaemonResult<Self> {
        let stub = StubExchange::new();
        let pair = CurrencyPair::new("ETH", "BTC")?;
        let bid = Decimal::new(74, 3);
        let ask = Decimal::new(76, 3);
        stub.set_ticker(TickerSnapshot::new(
            pair,
            bid,
            ask,
            Decimal::new(75, 3),
            ask,
            bid,
            Decimal::ONE,
            chrono::Utc::now(),
        )?);

        let mut registry = ExchangeRegistry::new(SharedCache::new());
        registry.register(Arc::new(stub));
        Self::with_registry(config, registry)
    }

    /// Create a daemon over a prepared registry.
    pub fn with_registry(config: Config, registry: ExchangeRegistry) -> DaemonResult<Self> {
        Ok(Self {
            config,
            registry: Arc::new(registry),
            metrics: Arc::new(Metrics::new()?),
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Registered exchanges.
    pub fn registry(&self) -> &Arc<ExchangeRegistry> {
        &self.registry
    }

    /// Token that stops the daemon when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Run the daemon.
    ///
    /// This method blocks until shutdown is requested (SIGINT or the
    /// shutdown token).
    pub async fn run(self) -> DaemonResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            exchanges = self.registry.len(),
            "Starting Bourse daemon"
        );

        // 1. Start API server
        let api_addr = self.start_api_server().await?;
        info!(%api_addr, "API server started");

        // 2. Start the poller
        let poller = MarketDataPoller::new(
            self.registry.clone(),
            self.metrics.clone(),
            self.config.market_data.poll_interval,
            self.shutdown_token.child_token(),
        );
        let poller_handle = tokio::spawn(poller.run());

        // 3. Wait for shutdown
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
            }
            _ = self.shutdown_token.cancelled() => {
                info!("Shutdown requested");
            }
        }

        // 4. Graceful shutdown
        self.shutdown_token.cancel();
        if let Err(e) = poller_handle.await {
            error!(error = %e, "Poller task failed");
        }
        info!("Shutdown complete");

        Ok(())
    }

    /// Start the API server.
    pub async fn start_api_server(&self) -> DaemonResult<SocketAddr> {
        let state = Arc::new(ApiState {
            registry: self.registry.clone(),
            metrics: self.metrics.clone(),
        });

        let router = create_router(state);
        let addr = format!("{}:{}", self.config.api.host, self.config.api.port);

        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            DaemonError::Config(format!("Failed to bind to {}: {}", addr, e))
        })?;

        let local_addr = listener.local_addr().map_err(|e| {
            DaemonError::Config(format!("Failed to get local address: {}", e))
        })?;

        let shutdown = self.shutdown_token.clone();
        tokio::spawn(async move {
            let server = axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await });
            if let Err(e) = server.await {
                error!(error = %e, "API server error");
            }
        });

        Ok(local_addr)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_daemon_stub_creation() {
        let daemon = Daemon::new_stub(Config::test()).unwrap();

        assert_eq!(daemon.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_daemon_api_server_start() {
        let daemon = Daemon::new_stub(Config::test()).unwrap();

        let addr = daemon.start_api_server().await.unwrap();

        // Server should be running on a port
        assert!(addr.port() > 0);

        // Can make a health check request
        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .unwrap();

        assert!(response.status().is_success());
        daemon.shutdown_token().cancel();
    }

    #[tokio::test]
    async fn test_run_returns_after_cancel() {
        let daemon = Daemon::new_stub(Config::test()).unwrap();
        let token = daemon.shutdown_token();

        let handle = tokio::spawn(daemon.run());
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        token.cancel();

        handle.await.unwrap().unwrap();
    }
}
