//! Bourse Daemon
//!
//! Serves cached market data from the configured exchanges.
//!
//! # Usage
//!
//! ```bash
//! # Start with default configuration
//! cargo run -p boursed
//!
//! # Stub exchange only, custom port
//! BOURSE_ENV=test BOURSE_API_PORT=8081 cargo run -p boursed
//! ```
//!
//! # Environment Variables
//!
//! - `BOURSE_ENV`: Environment (test, development, production)
//! - `BOURSE_API_HOST`: API host (default: 0.0.0.0)
//! - `BOURSE_API_PORT`: API port (default: 8080)
//! - `BOURSE_POLL_INTERVAL_SECS`: Batch refresh interval (default: 15)
//! - `BOURSE_HTTP_TIMEOUT_SECS`: Exchange request timeout (default: 10)
//! - `BOURSE_<EXCHANGE>_ENABLED`, `_PAIRS`, `_API_KEY`, `_API_SECRET`,
//!   `_ORDERBOOK_DEPTH`: per-exchange settings (`LIQUI`, `POLONIEX`)

use boursed::{Config, Daemon, Environment};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("boursed=info".parse()?)
                .add_directive("bourse_connectors=info".parse()?),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        api_host = %config.api.host,
        api_port = config.api.port,
        "Bourse Daemon"
    );

    // Test environment serves the stub exchange only
    let daemon = match config.environment {
        Environment::Test => Daemon::new_stub(config)?,
        Environment::Development | Environment::Production => Daemon::new(config)?,
    };
    daemon.run().await?;

    Ok(())
}
