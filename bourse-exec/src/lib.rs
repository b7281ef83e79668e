//! Bourse Exchange Contract
//!
//! The generic exchange interface every venue adapter implements, the
//! transport seam adapters send HTTP through, and the shared error taxonomy.
//!
//! # Architecture
//!
//! ```text
//! Caller → ExchangePort → (cache | PairTranslator | RequestSigner) → Transport
//! ```
//!
//! # Components
//!
//! - **Ports**: `ExchangePort`, `Transport`, `Capabilities`
//! - **Error**: `ExchangeError`, separating venue limitations from live failures
//! - **Stub**: in-memory venue for tests and the `test` environment
//!
//! # Example
//!
//! ```rust
//! use bourse_exec::{ExchangePort, Operation, StubExchange};
//!
//! let stub = StubExchange::new();
//! assert!(stub.capabilities().supports(Operation::Ticker));
//! assert!(!stub.capabilities().supports(Operation::Withdraw));
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod ports;
pub mod stub;

// Re-exports for convenience
pub use error::{ExchangeError, ExchangeResult};
pub use ports::{
    BatchReport, Capabilities, ExchangePort, HttpMethod, HttpRequest, HttpResponse, Operation,
    Transport,
};
pub use stub::StubExchange;
