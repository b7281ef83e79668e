//! Value Objects for the Bourse Domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Currency code is empty or contains non-alphanumeric characters
    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    /// Wire string cannot be resolved into exactly two known currencies
    #[error("Invalid pair format: {0}")]
    InvalidPairFormat(String),

    /// Price must be positive
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Amount must be non-negative
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Ticker fields failed validation
    #[error("Invalid ticker: {0}")]
    InvalidTicker(String),

    /// Orderbook levels failed validation
    #[error("Invalid orderbook: {0}")]
    InvalidOrderbook(String),

    /// Unknown exchange name
    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    /// Unknown order side or status string
    #[error("Invalid order field: {0}")]
    InvalidOrderField(String),
}

// =============================================================================
// ExchangeId
// =============================================================================

/// Venues with an adapter in this workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeId {
    /// Liqui (form-signed `tapi` private API)
    Liqui,
    /// Poloniex
    Poloniex,
    /// In-memory venue used by tests and the `test` environment
    Stub,
}

impl ExchangeId {
    /// Every known exchange, in display order.
    pub const ALL: [ExchangeId; 3] = [ExchangeId::Liqui, ExchangeId::Poloniex, ExchangeId::Stub];

    /// Get the exchange name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::Liqui => "liqui",
            ExchangeId::Poloniex => "poloniex",
            ExchangeId::Stub => "stub",
        }
    }
}

impl FromStr for ExchangeId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "liqui" => Ok(ExchangeId::Liqui),
            "poloniex" => Ok(ExchangeId::Poloniex),
            "stub" => Ok(ExchangeId::Stub),
            other => Err(DomainError::UnknownExchange(other.to_string())),
        }
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// AssetType
// =============================================================================

/// Market category a pair belongs to. Part of every cache key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    /// Spot market
    #[default]
    Spot,
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetType::Spot => write!(f, "spot"),
        }
    }
}

// =============================================================================
// CurrencyPair
// =============================================================================

/// Canonical currency pair (e.g., ETH/BTC).
///
/// # Invariants
/// - Base and quote are non-empty, ASCII alphanumeric, stored uppercase
/// - The canonical form is delimiter-free (`ETHBTC`); both parts are kept so
///   the pair never has to be re-split from that form
///
/// Serialized as its display form (`"ETH/BTC"`) so it can key JSON maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyPair {
    base: String,
    quote: String,
}

impl CurrencyPair {
    /// Create a pair from explicit base and quote codes.
    ///
    /// # Examples
    /// ```
    /// # use bourse_domain::CurrencyPair;
    /// let pair = CurrencyPair::new("eth", "btc").unwrap();
    /// assert_eq!(pair.base(), "ETH");
    /// assert_eq!(pair.quote(), "BTC");
    /// assert_eq!(pair.canonical(), "ETHBTC");
    /// ```
    ///
    /// # Errors
    /// Returns `DomainError::InvalidCurrency` if either code is malformed
    pub fn new(base: impl AsRef<str>, quote: impl AsRef<str>) -> Result<Self, DomainError> {
        Ok(Self {
            base: normalize_code(base.as_ref())?,
            quote: normalize_code(quote.as_ref())?,
        })
    }

    /// Get the base currency
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Get the quote currency
    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Delimiter-free uppercase form (e.g., "ETHBTC")
    pub fn canonical(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }

    /// Both currency codes, base first.
    pub fn currencies(&self) -> [&str; 2] {
        [&self.base, &self.quote]
    }
}

/// Validate and uppercase a currency code.
pub(crate) fn normalize_code(code: &str) -> Result<String, DomainError> {
    let code = code.trim();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DomainError::InvalidCurrency(format!("'{}'", code)));
    }
    Ok(code.to_ascii_uppercase())
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Parses the human forms `BTC/USD`, `BTC_USD` and `BTC-USD`.
///
/// Delimiter-free strings are rejected here: splitting them needs a known
/// currency set, see [`crate::PairTranslator`].
impl FromStr for CurrencyPair {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(['/', '_', '-']);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(base), Some(quote), None) => Self::new(base, quote)
                .map_err(|_| DomainError::InvalidPairFormat(s.to_string())),
            _ => Err(DomainError::InvalidPairFormat(s.to_string())),
        }
    }
}

impl TryFrom<String> for CurrencyPair {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyPair> for String {
    fn from(pair: CurrencyPair) -> Self {
        pair.to_string()
    }
}

// =============================================================================
// OrderSide
// =============================================================================

/// OrderSide represents the order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    /// Buy order
    Buy,
    /// Sell order
    Sell,
}

impl OrderSide {
    /// Lowercase wire name used by form-encoded APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl FromStr for OrderSide {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" | "bid" => Ok(OrderSide::Buy),
            "sell" | "ask" => Ok(OrderSide::Sell),
            other => Err(DomainError::InvalidOrderField(format!("side '{}'", other))),
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_uppercases_codes() {
        let pair = CurrencyPair::new("eth", "btc").unwrap();

        assert_eq!(pair.base(), "ETH");
        assert_eq!(pair.quote(), "BTC");
        assert_eq!(pair.canonical(), "ETHBTC");
        assert_eq!(pair.to_string(), "ETH/BTC");
    }

    #[test]
    fn test_pair_rejects_bad_codes() {
        assert!(CurrencyPair::new("", "BTC").is_err());
        assert!(CurrencyPair::new("ET H", "BTC").is_err());
        assert!(CurrencyPair::new("ETH", "B_TC").is_err());
    }

    #[test]
    fn test_pair_from_str_accepts_human_forms() {
        let expected = CurrencyPair::new("BTC", "USD").unwrap();

        assert_eq!("BTC/USD".parse::<CurrencyPair>().unwrap(), expected);
        assert_eq!("btc_usd".parse::<CurrencyPair>().unwrap(), expected);
        assert_eq!("BTC-USD".parse::<CurrencyPair>().unwrap(), expected);
        assert!("BTCUSD".parse::<CurrencyPair>().is_err());
        assert!("BTC_USD_EUR".parse::<CurrencyPair>().is_err());
    }

    #[test]
    fn test_pair_serializes_as_display_form() {
        let pair = CurrencyPair::new("ETH", "BTC").unwrap();
        let json = serde_json::to_string(&pair).unwrap();

        assert_eq!(json, "\"ETH/BTC\"");
        assert_eq!(serde_json::from_str::<CurrencyPair>(&json).unwrap(), pair);
    }

    #[test]
    fn test_exchange_id_round_trip() {
        for id in ExchangeId::ALL {
            assert_eq!(id.as_str().parse::<ExchangeId>().unwrap(), id);
        }
        assert!("binance".parse::<ExchangeId>().is_err());
    }

    #[test]
    fn test_order_side_parsing() {
        assert_eq!("buy".parse::<OrderSide>().unwrap(), OrderSide::Buy);
        assert_eq!("ASK".parse::<OrderSide>().unwrap(), OrderSide::Sell);
        assert!("hold".parse::<OrderSide>().is_err());
        assert_eq!(OrderSide::Sell.as_str(), "sell");
    }
}
