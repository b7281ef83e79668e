//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Per-exchange settings use the `BOURSE_<EXCHANGE>_` prefix, e.g.
//! `BOURSE_LIQUI_PAIRS=ETH_BTC,LTC_BTC`. Pairs are written in the venue's
//! config format.

use std::env;
use std::time::Duration;

use bourse_connectors::{liqui, poloniex};
use bourse_domain::{ApiCredentials, CurrencyPair, ExchangeId, PairFormat};

use crate::error::{DaemonError, DaemonResult};

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Polling and HTTP client settings
    pub market_data: MarketDataConfig,

    /// Per-exchange settings, one entry per supported venue
    pub exchanges: Vec<ExchangeConfig>,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

/// Market-data polling configuration.
#[derive(Debug, Clone)]
pub struct MarketDataConfig {
    /// Time between batch refreshes
    pub poll_interval: Duration,
    /// Per-request HTTP timeout
    pub http_timeout: Duration,
}

/// Settings for one venue.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// Venue
    pub id: ExchangeId,
    /// Whether the daemon builds an adapter for it
    pub enabled: bool,
    /// Pairs refreshed by the poller
    pub pairs: Vec<CurrencyPair>,
    /// API key and secret, when private calls are wanted
    pub credentials: Option<ApiCredentials>,
    /// Orderbook depth override
    pub orderbook_depth: Option<u32>,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (uses stubs)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

/// Venues configurable from the environment, with their default pairs.
const CONFIGURABLE: [(ExchangeId, &str); 2] = [
    (ExchangeId::Liqui, "ETH_BTC"),
    (ExchangeId::Poloniex, "BTC_ETH"),
];

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> DaemonResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = Self::load_environment(&lookup)?;
        let api = Self::load_api_config(&lookup)?;
        let market_data = Self::load_market_data_config(&lookup)?;
        let exchanges = CONFIGURABLE
            .iter()
            .map(|(id, default_pairs)| Self::load_exchange_config(&lookup, *id, default_pairs))
            .collect::<DaemonResult<Vec<_>>>()?;

        Ok(Self {
            api,
            market_data,
            exchanges,
            environment,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            market_data: MarketDataConfig {
                poll_interval: Duration::from_millis(50),
                http_timeout: Duration::from_secs(1),
            },
            exchanges: Vec::new(),
            environment: Environment::Test,
        }
    }

    /// Settings for `id`, if it is configurable.
    pub fn exchange(&self, id: ExchangeId) -> Option<&ExchangeConfig> {
        self.exchanges.iter().find(|ex| ex.id == id)
    }

    /// Enabled venues only.
    pub fn enabled_exchanges(&self) -> impl Iterator<Item = &ExchangeConfig> {
        self.exchanges.iter().filter(|ex| ex.enabled)
    }

    fn load_environment(lookup: &impl Fn(&str) -> Option<String>) -> DaemonResult<Environment> {
        let env_str = lookup("BOURSE_ENV").unwrap_or_else(|| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid BOURSE_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_api_config(lookup: &impl Fn(&str) -> Option<String>) -> DaemonResult<ApiConfig> {
        let host = lookup("BOURSE_API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = Self::load_parsed(lookup, "BOURSE_API_PORT", 8080u16)?;

        Ok(ApiConfig { host, port })
    }

    fn load_market_data_config(
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> DaemonResult<MarketDataConfig> {
        let poll_secs = Self::load_parsed(lookup, "BOURSE_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        if poll_secs == 0 {
            return Err(DaemonError::Config(
                "BOURSE_POLL_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }
        let timeout_secs = Self::load_parsed(
            lookup,
            "BOURSE_HTTP_TIMEOUT_SECS",
            bourse_connectors::DEFAULT_TIMEOUT_SECS,
        )?;

        Ok(MarketDataConfig {
            poll_interval: Duration::from_secs(poll_secs),
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }

    fn load_exchange_config(
        lookup: &impl Fn(&str) -> Option<String>,
        id: ExchangeId,
        default_pairs: &str,
    ) -> DaemonResult<ExchangeConfig> {
        let prefix = format!("BOURSE_{}_", id.as_str().to_ascii_uppercase());
        let var = |name: &str| lookup(&format!("{}{}", prefix, name));

        let enabled = match var("ENABLED") {
            Some(value) => parse_bool(&format!("{}ENABLED", prefix), &value)?,
            None => true,
        };

        let format = config_format(id);
        let pairs = var("PAIRS")
            .unwrap_or_else(|| default_pairs.to_string())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                format.parse(s).map_err(|_| {
                    DaemonError::Config(format!("Invalid pair in {}PAIRS: {}", prefix, s))
                })
            })
            .collect::<DaemonResult<Vec<_>>>()?;

        let credentials = ApiCredentials::from_parts(var("API_KEY"), var("API_SECRET"));
        let orderbook_depth = var("ORDERBOOK_DEPTH")
            .map(|v| {
                v.parse::<u32>().map_err(|_| {
                    DaemonError::Config(format!("Invalid {}ORDERBOOK_DEPTH: {}", prefix, v))
                })
            })
            .transpose()?;

        Ok(ExchangeConfig {
            id,
            enabled,
            pairs,
            credentials,
            orderbook_depth,
        })
    }

    fn load_parsed<T: std::str::FromStr>(
        lookup: &impl Fn(&str) -> Option<String>,
        key: &str,
        default: T,
    ) -> DaemonResult<T> {
        match lookup(key) {
            Some(val) => val
                .trim()
                .parse()
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            None => Ok(default),
        }
    }
}

fn config_format(id: ExchangeId) -> PairFormat {
    match id {
        ExchangeId::Poloniex => poloniex::pair_formats().config,
        ExchangeId::Liqui | ExchangeId::Stub => liqui::pair_formats().config,
    }
}

fn parse_bool(key: &str, value: &str) -> DaemonResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(DaemonError::Config(format!("Invalid {}: {}", key, other))),
    }
}

impl Default for Config {
    fn default() -> Self {
        let exchanges = CONFIGURABLE
            .iter()
            .map(|(id, default_pairs)| ExchangeConfig {
                id: *id,
                enabled: true,
                pairs: config_format(*id).parse(default_pairs).into_iter().collect(),
                credentials: None,
                orderbook_depth: None,
            })
            .collect();

        Self {
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            market_data: MarketDataConfig {
                poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
                http_timeout: Duration::from_secs(bourse_connectors::DEFAULT_TIMEOUT_SECS),
            },
            exchanges,
            environment: Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.api.port, 8080);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(
            config.exchange(ExchangeId::Poloniex).unwrap().pairs,
            vec![CurrencyPair::new("ETH", "BTC").unwrap()]
        );
    }

    #[test]
    fn test_test_config() {
        let config = Config::test();

        assert_eq!(config.api.port, 0);
        assert_eq!(config.environment, Environment::Test);
        assert!(config.exchanges.is_empty());
    }

    #[test]
    fn test_empty_environment_matches_default() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        let default = Config::default();

        assert_eq!(config.api.port, default.api.port);
        assert_eq!(config.market_data.poll_interval, default.market_data.poll_interval);
        assert_eq!(config.exchanges.len(), 2);
    }

    #[test]
    fn test_exchange_variables() {
        let config = Config::from_lookup(lookup(&[
            ("BOURSE_LIQUI_PAIRS", "ETH_BTC, ltc_btc"),
            ("BOURSE_LIQUI_API_KEY", "key"),
            ("BOURSE_LIQUI_API_SECRET", "secret"),
            ("BOURSE_LIQUI_ORDERBOOK_DEPTH", "50"),
            ("BOURSE_POLONIEX_ENABLED", "false"),
        ]))
        .unwrap();

        let liqui = config.exchange(ExchangeId::Liqui).unwrap();
        assert_eq!(
            liqui.pairs,
            vec![
                CurrencyPair::new("ETH", "BTC").unwrap(),
                CurrencyPair::new("LTC", "BTC").unwrap()
            ]
        );
        assert!(liqui.credentials.is_some());
        assert_eq!(liqui.orderbook_depth, Some(50));

        let enabled: Vec<_> = config.enabled_exchanges().map(|ex| ex.id).collect();
        assert_eq!(enabled, vec![ExchangeId::Liqui]);
    }

    #[test]
    fn test_key_without_secret_gives_no_credentials() {
        let config = Config::from_lookup(lookup(&[("BOURSE_POLONIEX_API_KEY", "key")])).unwrap();

        assert!(config.exchange(ExchangeId::Poloniex).unwrap().credentials.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_lookup(lookup(&[("BOURSE_ENV", "staging")])).is_err());
        assert!(Config::from_lookup(lookup(&[("BOURSE_API_PORT", "http")])).is_err());
        assert!(Config::from_lookup(lookup(&[("BOURSE_POLL_INTERVAL_SECS", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("BOURSE_LIQUI_PAIRS", "ETHBTC")])).is_err());
        assert!(Config::from_lookup(lookup(&[("BOURSE_LIQUI_ENABLED", "maybe")])).is_err());
    }

    #[test]
    fn test_environment_display() {
        assert_eq!(Environment::Test.to_string(), "test");
        assert_eq!(Environment::Development.to_string(), "development");
        assert_eq!(Environment::Production.to_string(), "production");
    }
}
