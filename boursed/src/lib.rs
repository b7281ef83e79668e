//! Bourse Daemon Library
//!
//! Runtime host for the exchange adapters.
//!
//! # Architecture
//!
//! ```text
//! HTTP API ──→ ExchangeRegistry ──→ ExchangePort (Liqui, Poloniex)
//!                    │                     │
//!                    └── MarketDataCache ←─┘   (single-flight refresh)
//!                             ↑
//!                    MarketDataPoller (periodic batch refresh)
//! ```
//!
//! # Components
//!
//! - **Daemon**: Main runtime orchestrator
//! - **Registry**: Adapters built from configuration, one shared cache
//! - **Poller**: Keeps the cache warm for every enabled pair
//! - **API**: HTTP endpoints for market data and health
//! - **Metrics**: Prometheus counters and cache gauges
//! - **Config**: Environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use boursed::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let daemon = Daemon::new(config).expect("Failed to build daemon");
//!     daemon.run().await.expect("Daemon error");
//! }
//! ```

#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod daemon;
pub mod error;
pub mod metrics;
pub mod poller;
pub mod registry;

// Re-exports for convenience
pub use config::{ApiConfig, Config, Environment, ExchangeConfig, MarketDataConfig};
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};
pub use metrics::Metrics;
pub use poller::{MarketDataPoller, PollSummary};
pub use registry::ExchangeRegistry;
