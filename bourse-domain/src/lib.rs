//! Bourse Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Canonical currency pairs, market data snapshots, orders, balances and fees
//! shared by every exchange adapter.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod credentials;
pub mod entities;
pub mod fees;
pub mod market_data;
pub mod pair_format;
pub mod value_objects;

// Re-export commonly used types
pub use credentials::ApiCredentials;
pub use entities::{
    AccountBalance, AccountInfo, ApiRights, ExchangeInfo, Order, OrderId, OrderStatus, PairInfo,
    SortOrder, SubmittedOrder, Trade, TradeHistoryEntry, TradeHistoryFilter, WithdrawalReceipt,
};
pub use fees::{estimate_fee, FeeRequest, FeeSchedule, FeeType};
pub use market_data::{OrderbookSnapshot, PriceLevel, TickerSnapshot};
pub use pair_format::{ExchangePairFormats, LetterCase, PairFormat, PairOrder, PairTranslator};
pub use value_objects::{AssetType, CurrencyPair, DomainError, ExchangeId, OrderSide};
