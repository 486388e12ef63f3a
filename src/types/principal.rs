//! Principal identifiers and per-principal aggregates
//!
//! A principal is any party the engine deals with: payers, payees, the fee
//! recipient, the owner and administrators.

use super::stream::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a party (account name, address, key fingerprint, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    /// Create a principal from any string-like value
    ///
    /// Surrounding whitespace is trimmed. No other validation is applied here;
    /// use [`Principal::is_valid`] before accepting one as a payee.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.len() == id.len() {
            Principal(id)
        } else {
            Principal(trimmed.to_string())
        }
    }

    /// A principal is valid when it is non-empty
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(id: &str) -> Self {
        Principal::new(id)
    }
}

/// Per-principal aggregate counters
///
/// Both counters only ever increase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    /// Streams this principal takes part in, as payer or payee
    pub stream_count: u64,

    /// Net value received as a payee, after protocol fees
    pub total_received: Amount,
}

/// Engine-wide aggregate counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStats {
    /// Streams ever created
    pub stream_count: u64,

    /// Sum of `total_amount` over every stream ever created
    pub total_volume: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::plain("alice", "alice", true)]
    #[case::padded("  bob ", "bob", true)]
    #[case::empty("", "", false)]
    #[case::blank("   ", "", false)]
    fn test_principal_new(#[case] raw: &str, #[case] expected: &str, #[case] valid: bool) {
        let principal = Principal::new(raw);
        assert_eq!(principal.as_str(), expected);
        assert_eq!(principal.is_valid(), valid);
    }

    #[test]
    fn test_stats_default_to_zero() {
        assert_eq!(UserStats::default().stream_count, 0);
        assert_eq!(UserStats::default().total_received, 0);
        assert_eq!(GlobalStats::default().total_volume, 0);
    }
}
