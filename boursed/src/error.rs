//! Daemon error types.

use bourse_domain::DomainError;
use bourse_exec::ExchangeError;
use thiserror::Error;

/// Daemon-level errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Domain error (bad pair, unknown exchange name)
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Exchange adapter error
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    /// Exchange known but not enabled in this daemon
    #[error("Exchange not enabled: {0}")]
    ExchangeNotEnabled(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(String),
}

impl From<prometheus::Error> for DaemonError {
    fn from(error: prometheus::Error) -> Self {
        Self::Metrics(error.to_string())
    }
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
