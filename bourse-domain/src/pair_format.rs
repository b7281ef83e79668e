//! Pair wire-format translation.
//!
//! Every venue renders a pair differently: `eth_btc` (Liqui requests),
//! `ETH_BTC` (Liqui config), `BTC_ETH` (Poloniex, quote first). Translation is
//! pure and invertible for every pair in a venue's supported set.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::value_objects::{CurrencyPair, DomainError};

/// Letter case of a rendered pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LetterCase {
    /// `ETH_BTC`
    Upper,
    /// `eth_btc`
    Lower,
}

/// Which currency is rendered first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairOrder {
    /// `ETH_BTC` for ETH priced in BTC
    BaseFirst,
    /// `BTC_ETH` for ETH priced in BTC
    QuoteFirst,
}

/// Rendering rule for a single pair string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairFormat {
    /// Delimiter between the two codes; empty for `ETHBTC` style
    pub delimiter: String,
    /// Letter case
    pub case: LetterCase,
    /// Currency order
    pub order: PairOrder,
}

impl PairFormat {
    /// Create a new format.
    pub fn new(delimiter: impl Into<String>, case: LetterCase, order: PairOrder) -> Self {
        Self {
            delimiter: delimiter.into(),
            case,
            order,
        }
    }

    /// Render `pair` in this format.
    pub fn to_wire(&self, pair: &CurrencyPair) -> String {
        let (first, second) = match self.order {
            PairOrder::BaseFirst => (pair.base(), pair.quote()),
            PairOrder::QuoteFirst => (pair.quote(), pair.base()),
        };
        let rendered = format!("{}{}{}", first, self.delimiter, second);
        match self.case {
            LetterCase::Upper => rendered.to_ascii_uppercase(),
            LetterCase::Lower => rendered.to_ascii_lowercase(),
        }
    }

    /// Parse a wire string whose codes must both appear in `known`.
    ///
    /// # Errors
    /// `DomainError::InvalidPairFormat` unless the string resolves to exactly
    /// two known currency codes.
    pub fn from_wire(&self, wire: &str, known: &HashSet<String>) -> Result<CurrencyPair, DomainError> {
        let invalid = || DomainError::InvalidPairFormat(wire.to_string());
        let upper = wire.trim().to_ascii_uppercase();

        let (first, second) = if self.delimiter.is_empty() {
            // Ambiguous splits (both "AB|C" and "A|BC" known) are rejected.
            let mut splits = (1..upper.len())
                .filter(|&i| upper.is_char_boundary(i))
                .filter(|&i| known.contains(&upper[..i]) && known.contains(&upper[i..]));
            match (splits.next(), splits.next()) {
                (Some(i), None) => (upper[..i].to_string(), upper[i..].to_string()),
                _ => return Err(invalid()),
            }
        } else {
            let delimiter = self.delimiter.to_ascii_uppercase();
            let mut parts = upper.split(delimiter.as_str());
            match (parts.next(), parts.next(), parts.next()) {
                (Some(a), Some(b), None) if known.contains(a) && known.contains(b) => {
                    (a.to_string(), b.to_string())
                }
                _ => return Err(invalid()),
            }
        };

        let pair = match self.order {
            PairOrder::BaseFirst => CurrencyPair::new(first, second),
            PairOrder::QuoteFirst => CurrencyPair::new(second, first),
        };
        pair.map_err(|_| invalid())
    }
}

impl PairFormat {
    /// Parse a delimited string without a known-currency set.
    ///
    /// Used for configuration input, where the supported set is being built.
    ///
    /// # Errors
    /// `DomainError::InvalidPairFormat` for delimiter-free formats or when the
    /// string does not hold exactly two valid codes.
    pub fn parse(&self, wire: &str) -> Result<CurrencyPair, DomainError> {
        let invalid = || DomainError::InvalidPairFormat(wire.to_string());
        if self.delimiter.is_empty() {
            return Err(invalid());
        }

        let mut parts = wire.trim().split(self.delimiter.as_str());
        let (first, second) = match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), None) => (a, b),
            _ => return Err(invalid()),
        };
        let pair = match self.order {
            PairOrder::BaseFirst => CurrencyPair::new(first, second),
            PairOrder::QuoteFirst => CurrencyPair::new(second, first),
        };
        pair.map_err(|_| invalid())
    }
}

/// The set of formats a venue uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangePairFormats {
    /// Format used in request URLs and response keys
    pub request: PairFormat,
    /// Format used in configuration and display
    pub config: PairFormat,
    /// Separator joining several pairs in one batch request
    pub separator: String,
}

/// Translator bound to a venue's formats and supported pairs.
#[derive(Debug, Clone)]
pub struct PairTranslator {
    formats: ExchangePairFormats,
    supported: Vec<CurrencyPair>,
    known: HashSet<String>,
}

impl PairTranslator {
    /// Create a translator. The known currency set is derived from `supported`.
    pub fn new(formats: ExchangePairFormats, supported: Vec<CurrencyPair>) -> Self {
        let known = supported
            .iter()
            .flat_map(|p| p.currencies())
            .map(str::to_string)
            .collect();
        Self {
            formats,
            supported,
            known,
        }
    }

    /// Formats in use.
    pub fn formats(&self) -> &ExchangePairFormats {
        &self.formats
    }

    /// Supported pairs, in configuration order.
    pub fn supported(&self) -> &[CurrencyPair] {
        &self.supported
    }

    /// Whether `pair` is in the supported set.
    pub fn is_supported(&self, pair: &CurrencyPair) -> bool {
        self.supported.contains(pair)
    }

    /// Render in request format.
    pub fn to_wire(&self, pair: &CurrencyPair) -> String {
        self.formats.request.to_wire(pair)
    }

    /// Parse a request-format string.
    pub fn from_wire(&self, wire: &str) -> Result<CurrencyPair, DomainError> {
        self.formats.request.from_wire(wire, &self.known)
    }

    /// Join pairs for a batch endpoint (e.g., `eth_btc-ltc_btc`).
    pub fn join_wire<'a>(&self, pairs: impl IntoIterator<Item = &'a CurrencyPair>) -> String {
        pairs
            .into_iter()
            .map(|p| self.to_wire(p))
            .collect::<Vec<_>>()
            .join(&self.formats.separator)
    }
}

#[cfg(test)]
impl PairTranslator {
    fn to_config(&self, pair: &CurrencyPair) -> String {
        self.formats.config.to_wire(pair)
    }
}

// =============================================================================
// Tests
// =============================================================================
