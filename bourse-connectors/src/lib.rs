//! Bourse Exchange Connectors
//!
//! REST adapters for Liqui and Poloniex behind the generic `ExchangePort`.
//! Shared plumbing lives here too: the nonce sequencer, the HMAC-SHA512
//! request signer and the reqwest transport.

#![warn(clippy::all)]

// Public modules
pub mod liqui;
pub mod nonce;
pub mod poloniex;
pub mod signer;
pub mod transport;

// Adapter plumbing
mod batch;
mod envelope;

/// Market-data cache shared by every adapter in a process.
pub type SharedCache = bourse_store::MarketDataCache<bourse_exec::ExchangeError>;

// Re-exports
pub use liqui::{LiquiAdapter, LiquiConfig};
pub use nonce::{Nonce, NonceSequencer};
pub use poloniex::{PoloniexAdapter, PoloniexConfig};
pub use signer::{
    encode_form, hmac_sha512_hex, ParamSet, RequestSigner, SignedRequest, SigningScheme,
    FORM_CONTENT_TYPE,
};
pub use transport::{HttpTransport, DEFAULT_TIMEOUT_SECS};
