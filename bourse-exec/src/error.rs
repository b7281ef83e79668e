//! Exchange error types.

use thiserror::Error;

use bourse_domain::{DomainError, ExchangeId};

use crate::ports::Operation;

/// Errors surfaced by exchange adapters.
///
/// `Clone` so one failed single-flight refresh can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// Network, timeout or connection failure reported by the transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// The exchange envelope reported a logical failure
    #[error("{exchange} API error: {message}")]
    ExchangeApi {
        /// Venue that rejected the call
        exchange: ExchangeId,
        /// Exchange-supplied message, verbatim
        message: String,
    },

    /// Private call attempted without an API key and secret
    #[error("Missing API credentials for {0}")]
    MissingCredentials(ExchangeId),

    /// Pair string cannot be resolved into two known currencies
    #[error("Invalid pair format: {0}")]
    InvalidPairFormat(String),

    /// The venue does not offer this operation
    #[error("{operation} is not supported by {exchange}")]
    Unsupported {
        /// Venue lacking the operation
        exchange: ExchangeId,
        /// Operation requested
        operation: Operation,
    },

    /// Response payload could not be decoded into canonical types
    #[error("Decode error: {0}")]
    Decode(String),

    /// Caller supplied an invalid argument
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Request signing failed
    #[error("Signature error: {0}")]
    Signature(String),
}

impl ExchangeError {
    /// Shorthand for an `Unsupported` outcome.
    pub fn unsupported(exchange: ExchangeId, operation: Operation) -> Self {
        Self::Unsupported {
            exchange,
            operation,
        }
    }

    /// Shorthand for an `ExchangeApi` failure.
    pub fn api(exchange: ExchangeId, message: impl Into<String>) -> Self {
        Self::ExchangeApi {
            exchange,
            message: message.into(),
        }
    }

    /// Whether the venue lacks the operation (as opposed to a failed call).
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Whether repeating the call later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::ExchangeApi { .. })
    }
}

impl From<DomainError> for ExchangeError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidPairFormat(s) | DomainError::InvalidCurrency(s) => {
                Self::InvalidPairFormat(s)
            }
            other => Self::Decode(other.to_string()),
        }
    }
}

/// Result type for exchange operations.
pub type ExchangeResult<T> = Result<T, ExchangeError>;
