//! Market Data Types
//!
//! Canonical ticker and orderbook snapshots shared by every adapter.
//! Snapshots are immutable once built; a cache update swaps the whole value.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::value_objects::{CurrencyPair, DomainError};

// =============================================================================
// Ticker
// =============================================================================

/// Point-in-time ticker for one pair.
///
/// # Invariants
/// - All prices and the volume are non-negative
///
/// Deserialization goes through [`TickerSnapshot::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TickerSnapshotRaw")]
pub struct TickerSnapshot {
    pair: CurrencyPair,
    bid: Decimal,
    ask: Decimal,
    last: Decimal,
    high: Decimal,
    low: Decimal,
    volume: Decimal,
    captured_at: DateTime<Utc>,
}

impl TickerSnapshot {
    /// Create a validated ticker snapshot.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidTicker` if any field is negative
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pair: CurrencyPair,
        bid: Decimal,
        ask: Decimal,
        last: Decimal,
        high: Decimal,
        low: Decimal,
        volume: Decimal,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let fields = [
            ("bid", bid),
            ("ask", ask),
            ("last", last),
            ("high", high),
            ("low", low),
            ("volume", volume),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| *v < Decimal::ZERO) {
            return Err(DomainError::InvalidTicker(format!(
                "{} {} is negative for {}",
                name, value, pair
            )));
        }

        Ok(Self {
            pair,
            bid,
            ask,
            last,
            high,
            low,
            volume,
            captured_at,
        })
    }

    /// Trading pair
    pub fn pair(&self) -> &CurrencyPair {
        &self.pair
    }

    /// Best bid
    pub fn bid(&self) -> Decimal {
        self.bid
    }

    /// Best ask
    pub fn ask(&self) -> Decimal {
        self.ask
    }

    /// Last traded price
    pub fn last(&self) -> Decimal {
        self.last
    }

    /// 24h high
    pub fn high(&self) -> Decimal {
        self.high
    }

    /// 24h low
    pub fn low(&self) -> Decimal {
        self.low
    }

    /// 24h volume in base currency
    pub fn volume(&self) -> Decimal {
        self.volume
    }

    /// When the snapshot was captured
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

/// Unchecked wire shape of [`TickerSnapshot`].
#[derive(Deserialize)]
struct TickerSnapshotRaw {
    pair: CurrencyPair,
    bid: Decimal,
    ask: Decimal,
    last: Decimal,
    high: Decimal,
    low: Decimal,
    volume: Decimal,
    captured_at: DateTime<Utc>,
}

impl TryFrom<TickerSnapshotRaw> for TickerSnapshot {
    type Error = DomainError;

    fn try_from(raw: TickerSnapshotRaw) -> Result<Self, Self::Error> {
        Self::new(
            raw.pair,
            raw.bid,
            raw.ask,
            raw.last,
            raw.high,
            raw.low,
            raw.volume,
            raw.captured_at,
        )
    }
}

// =============================================================================
// Orderbook
// =============================================================================

/// One price level of an orderbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Level price
    pub price: Decimal,
    /// Total amount resting at this price
    pub amount: Decimal,
}

impl PriceLevel {
    /// Create a level.
    pub fn new(price: Decimal, amount: Decimal) -> Self {
        Self { price, amount }
    }
}

/// Snapshot of the order book at a point in time.
///
/// # Invariants
/// - Bids strictly descending by price, asks strictly ascending
/// - No duplicate price levels, no zero-amount levels
/// - All prices positive
///
/// Deserialization is strict: levels must already satisfy the invariants,
/// they are not re-sorted or merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OrderbookSnapshotRaw")]
pub struct OrderbookSnapshot {
    pair: CurrencyPair,
    bids: Vec<PriceLevel>,
    asks: Vec<PriceLevel>,
    captured_at: DateTime<Utc>,
}

impl OrderbookSnapshot {
    /// Build a snapshot from raw exchange levels in any order.
    ///
    /// Levels sharing a price are merged (amounts summed) and empty levels
    /// dropped, so exchange responses with repeated prices still produce a
    /// strictly ordered book.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidOrderbook` for a non-positive price or a
    /// negative amount.
    pub fn new(
        pair: CurrencyPair,
        bids: impl IntoIterator<Item = PriceLevel>,
        asks: impl IntoIterator<Item = PriceLevel>,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let bids = aggregate(&pair, "bid", bids)?.into_iter().rev().collect();
        let asks = aggregate(&pair, "ask", asks)?.into_iter().collect();

        Ok(Self {
            pair,
            bids,
            asks,
            captured_at,
        })
    }

    /// Trading pair
    pub fn pair(&self) -> &CurrencyPair {
        &self.pair
    }

    /// Bid levels, best (highest) first
    pub fn bids(&self) -> &[PriceLevel] {
        &self.bids
    }

    /// Ask levels, best (lowest) first
    pub fn asks(&self) -> &[PriceLevel] {
        &self.asks
    }

    /// When the snapshot was captured
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Get the best bid price (highest bid).
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|level| level.price)
    }

    /// Get the best ask price (lowest ask).
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|level| level.price)
    }

    /// Get the spread (best ask - best bid).
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Get the midpoint price (best bid + best ask) / 2.
    pub fn midpoint(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::from(2)),
            _ => None,
        }
    }
}

/// Unchecked wire shape of [`OrderbookSnapshot`].
#[derive(Deserialize)]
struct OrderbookSnapshotRaw {
    pair: CurrencyPair,
    bids: Vec<PriceLevel>,
    asks: Vec<PriceLevel>,
    captured_at: DateTime<Utc>,
}

impl TryFrom<OrderbookSnapshotRaw> for OrderbookSnapshot {
    type Error = DomainError;

    fn try_from(raw: OrderbookSnapshotRaw) -> Result<Self, Self::Error> {
        check_side(&raw.pair, "bid", &raw.bids, |better, worse| better > worse)?;
        check_side(&raw.pair, "ask", &raw.asks, |better, worse| better < worse)?;

        Ok(Self {
            pair: raw.pair,
            bids: raw.bids,
            asks: raw.asks,
            captured_at: raw.captured_at,
        })
    }
}

/// Reject a side that is out of order or holds an empty or non-positive level.
fn check_side(
    pair: &CurrencyPair,
    side: &str,
    levels: &[PriceLevel],
    ordered: impl Fn(Decimal, Decimal) -> bool,
) -> Result<(), DomainError> {
    if let Some(level) = levels
        .iter()
        .find(|l| l.price <= Decimal::ZERO || l.amount <= Decimal::ZERO)
    {
        return Err(DomainError::InvalidOrderbook(format!(
            "{} {} level {} @ {} is not positive",
            pair, side, level.amount, level.price
        )));
    }
    if let Some(pair_of_levels) = levels.windows(2).find(|w| !ordered(w[0].price, w[1].price)) {
        return Err(DomainError::InvalidOrderbook(format!(
            "{} {} levels {} and {} are out of order",
            pair, side, pair_of_levels[0].price, pair_of_levels[1].price
        )));
    }
    Ok(())
}

/// Merge levels by price into ascending order.
fn aggregate(
    pair: &CurrencyPair,
    side: &str,
    levels: impl IntoIterator<Item = PriceLevel>,
) -> Result<Vec<PriceLevel>, DomainError> {
    let mut book: BTreeMap<Decimal, Decimal> = BTreeMap::new();

    for level in levels {
        if level.price <= Decimal::ZERO {
            return Err(DomainError::InvalidOrderbook(format!(
                "{} {} price {} is not positive",
                pair, side, level.price
            )));
        }
        if level.amount < Decimal::ZERO {
            return Err(DomainError::InvalidOrderbook(format!(
                "{} {} amount {} is negative",
                pair, side, level.amount
            )));
        }
        // normalize() so 1.0 and 1.00 land on the same key
        *book.entry(level.price.normalize()).or_insert(Decimal::ZERO) += level.amount;
    }

    Ok(book
        .into_iter()
        .filter(|(_, amount)| !amount.is_zero())
        .map(|(price, amount)| PriceLevel::new(price, amount))
        .collect())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn eth_btc() -> CurrencyPair {
        CurrencyPair::new("ETH", "BTC").unwrap()
    }

    #[test]
    fn test_ticker_rejects_negative_fields() {
        let err = TickerSnapshot::new(
            eth_btc(),
            dec!(0.03),
            dec!(0.031),
            dec!(-1),
            dec!(0.04),
            dec!(0.02),
            dec!(100),
            Utc::now(),
        )
        .unwrap_err();

        assert!(matches!(err, DomainError::InvalidTicker(msg) if msg.contains("last")));
    }

    #[test]
    fn test_orderbook_sorts_each_side() {
        let bids = vec![
            PriceLevel::new(dec!(0.029), dec!(1)),
            PriceLevel::new(dec!(0.030), dec!(2)),
            PriceLevel::new(dec!(0.028), dec!(3)),
        ];
        let asks = vec![
            PriceLevel::new(dec!(0.033), dec!(1)),
            PriceLevel::new(dec!(0.031), dec!(2)),
        ];
        let book = OrderbookSnapshot::new(eth_btc(), bids, asks, Utc::now()).unwrap();

        let bid_prices: Vec<_> = book.bids().iter().map(|l| l.price).collect();
        let ask_prices: Vec<_> = book.asks().iter().map(|l| l.price).collect();
        assert_eq!(bid_prices, vec![dec!(0.030), dec!(0.029), dec!(0.028)]);
        assert_eq!(ask_prices, vec![dec!(0.031), dec!(0.033)]);
        assert_eq!(book.best_bid(), Some(dec!(0.030)));
        assert_eq!(book.best_ask(), Some(dec!(0.031)));
        assert_eq!(book.spread(), Some(dec!(0.001)));
        assert_eq!(book.midpoint(), Some(dec!(0.0305)));
    }

    #[test]
    fn test_orderbook_merges_duplicate_levels() {
        let bids = vec![
            PriceLevel::new(dec!(10.0), dec!(1)),
            PriceLevel::new(dec!(10.00), dec!(2)),
            PriceLevel::new(dec!(9), dec!(0)),
        ];
        let book = OrderbookSnapshot::new(eth_btc(), bids, vec![], Utc::now()).unwrap();

        assert_eq!(book.bids().len(), 1);
        assert_eq!(book.bids()[0].amount, dec!(3));
        assert!(book.asks().is_empty());
        assert_eq!(book.spread(), None);
    }

    #[test]
    fn test_orderbook_rejects_bad_levels() {
        let zero_price = vec![PriceLevel::new(dec!(0), dec!(1))];
        assert!(OrderbookSnapshot::new(eth_btc(), zero_price, vec![], Utc::now()).is_err());

        let negative_amount = vec![PriceLevel::new(dec!(1), dec!(-1))];
        assert!(OrderbookSnapshot::new(eth_btc(), vec![], negative_amount, Utc::now()).is_err());
    }

    #[test]
    fn test_deserialized_ticker_is_validated() {
        let ticker = TickerSnapshot::new(
            eth_btc(),
            dec!(0.03),
            dec!(0.031),
            dec!(0.0305),
            dec!(0.04),
            dec!(0.02),
            dec!(100),
            Utc::now(),
        )
        .unwrap();
        let json = serde_json::to_string(&ticker).unwrap();
        assert_eq!(serde_json::from_str::<TickerSnapshot>(&json).unwrap(), ticker);

        let negative = json.replace(r#""volume":"100""#, r#""volume":"-100""#);
        assert_ne!(negative, json);
        assert!(serde_json::from_str::<TickerSnapshot>(&negative).is_err());
    }

    #[test]
    fn test_deserialized_orderbook_is_validated() {
        let book = OrderbookSnapshot::new(
            eth_btc(),
            vec![PriceLevel::new(dec!(5), dec!(1)), PriceLevel::new(dec!(1), dec!(2))],
            vec![PriceLevel::new(dec!(6), dec!(1))],
            Utc::now(),
        )
        .unwrap();
        let json = serde_json::to_string(&book).unwrap();
        assert_eq!(serde_json::from_str::<OrderbookSnapshot>(&json).unwrap(), book);

        let level = |price: &str, amount: &str| format!(r#"{{"price":"{}","amount":"{}"}}"#, price, amount);
        let book_json = |bids: &[String]| {
            format!(
                r#"{{"pair":"ETH/BTC","bids":[{}],"asks":[],"captured_at":"2024-01-01T00:00:00Z"}}"#,
                bids.join(",")
            )
        };

        let unordered = book_json(&[level("1", "1"), level("5", "1")]);
        let err = serde_json::from_str::<OrderbookSnapshot>(&unordered).unwrap_err();
        assert!(err.to_string().contains("out of order"));

        let duplicate = book_json(&[level("5", "1"), level("5", "2")]);
        assert!(serde_json::from_str::<OrderbookSnapshot>(&duplicate).is_err());

        let empty_level = book_json(&[level("5", "1"), level("1", "0")]);
        assert!(serde_json::from_str::<OrderbookSnapshot>(&empty_level).is_err());
    }

    #[test]
    fn test_orderbook_levels_strictly_ordered() {
        let raw: Vec<PriceLevel> = [5, 3, 9, 3, 7, 1, 9]
            .iter()
            .map(|p| PriceLevel::new(Decimal::from(*p), dec!(1)))
            .collect();
        let book = OrderbookSnapshot::new(eth_btc(), raw.clone(), raw, Utc::now()).unwrap();

        assert!(book.bids().windows(2).all(|w| w[0].price > w[1].price));
        assert!(book.asks().windows(2).all(|w| w[0].price < w[1].price));
    }
}
