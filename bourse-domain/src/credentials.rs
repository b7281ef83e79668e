//! Exchange API credentials.
//!
//! Plaintext key and secret held in memory only. The secret is zeroized on
//! drop and neither field is ever printed by `Debug`.

use std::fmt;

use zeroize::Zeroizing;

/// API key + secret used to sign private requests.
///
/// This struct contains plaintext credentials and should:
/// - Never be logged
/// - Never be serialized to disk
/// - Have its secret zeroized when dropped (via `Zeroizing`)
#[derive(Clone)]
pub struct ApiCredentials {
    /// API Key (public identifier, sent as the `Key` header)
    pub api_key: String,
    /// API Secret (HMAC key)
    pub api_secret: Zeroizing<String>,
}

impl ApiCredentials {
    /// Create new API credentials.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: Zeroizing::new(api_secret.into()),
        }
    }

    /// Build credentials only when both parts are present and non-blank.
    pub fn from_parts(api_key: Option<String>, api_secret: Option<String>) -> Option<Self> {
        match (api_key, api_secret) {
            (Some(key), Some(secret)) if !key.trim().is_empty() && !secret.trim().is_empty() => {
                Some(Self::new(key.trim(), secret.trim()))
            }
            _ => None,
        }
    }

    /// The secret as bytes, for HMAC keying.
    pub fn secret_bytes(&self) -> &[u8] {
        self.api_secret.as_bytes()
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
