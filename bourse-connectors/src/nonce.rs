//! Nonce sequencing for signed requests.
//!
//! One sequencer per exchange session. The first value is the wall-clock
//! second at first use; every later value is the previous one plus one.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::Serialize;

/// Sentinel for "no nonce issued yet".
const UNSET: i64 = i64::MIN;

/// Replay-protection counter carried by every signed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Nonce(pub(crate) i64);

impl Nonce {
    /// Raw value
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strictly increasing nonce source, safe to share between tasks.
///
/// The read-then-increment is one compare-and-swap, so concurrent callers
/// never observe the same value and a later call always gets a larger one.
#[derive(Debug)]
pub struct NonceSequencer {
    last: AtomicI64,
}

impl NonceSequencer {
    /// Sequencer seeded from the clock on first use.
    pub fn new() -> Self {
        Self {
            last: AtomicI64::new(UNSET),
        }
    }

    /// Sequencer whose first nonce is `first`.
    pub fn seeded(first: i64) -> Self {
        Self {
            last: AtomicI64::new(first.saturating_sub(1).max(UNSET + 1)),
        }
    }

    /// Issue the next nonce.
    pub fn next(&self) -> Nonce {
        let mut last = self.last.load(Ordering::Acquire);
        loop {
            let next = if last == UNSET {
                Utc::now().timestamp()
            } else {
                last + 1
            };
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Nonce(next),
                Err(actual) => last = actual,
            }
        }
    }

    /// Last nonce issued, if any.
    pub fn current(&self) -> Option<Nonce> {
        match self.last.load(Ordering::Acquire) {
            UNSET => None,
            value => Some(Nonce(value)),
        }
    }
}

impl Default for NonceSequencer {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
