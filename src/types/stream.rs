//! Stream-related types for the payment streams engine
//!
//! This module defines the Stream record, its opaque handle, lifecycle status,
//! and the small validated wrappers carried on every stream.

use super::principal::Principal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value in abstract integer units
pub type Amount = u128;

/// Seconds since the Unix epoch
pub type Timestamp = u64;

/// A 32-byte opaque stream handle.
///
/// Derived from Blake3 over the creation parameters and an engine nonce,
/// so it is decoupled from any participant's identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(pub [u8; 32]);

impl StreamId {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// Opaque category tag in the range 1..=10
///
/// The engine never interprets the value; it is carried through for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamType(u8);

impl StreamType {
    /// Smallest accepted tag
    pub const MIN: u8 = 1;
    /// Largest accepted tag
    pub const MAX: u8 = 10;

    /// Validate a raw tag, returning `None` when it is out of range
    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a stream
///
/// `Active` is the only non-terminal state. A stream leaves it exactly once,
/// either by paying out its full amount (`Completed`) or by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    /// Accruing; releases and cancellation are allowed
    Active,
    /// Every unit of `total_amount` has been released
    Completed,
    /// Terminated early by the payer or an administrator
    Cancelled,
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StreamStatus::Active => "active",
            StreamStatus::Completed => "completed",
            StreamStatus::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// A committed sum released continuously between `start_time` and `end_time`
///
/// Immutable fields are fixed at creation. `released_amount`,
/// `last_release_time` and `status` are only changed by release and
/// cancellation, and never again once the status is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    /// Opaque unique handle
    pub id: StreamId,

    /// Principal who funded the stream
    pub payer: Principal,

    /// Beneficiary of releases (never equal to `payer`)
    pub payee: Principal,

    /// Accrual start, always strictly before `end_time`
    pub start_time: Timestamp,

    /// Accrual end; everything remaining is releasable from here on
    pub end_time: Timestamp,

    /// Committed gross value, fixed at creation and strictly positive
    pub total_amount: Amount,

    /// Cumulative gross amount already released, never above `total_amount`
    pub released_amount: Amount,

    /// Time of the most recent release (informational)
    pub last_release_time: Timestamp,

    /// Lifecycle status
    pub status: StreamStatus,

    /// Opaque category tag
    pub stream_type: StreamType,
}

impl Stream {
    /// Whether the stream still accepts releases and cancellation
    pub fn is_active(&self) -> bool {
        self.status == StreamStatus::Active
    }

    /// Length of the accrual window in seconds
    pub fn duration(&self) -> u64 {
        self.end_time - self.start_time
    }

    /// Gross value not yet released
    pub fn remaining(&self) -> Amount {
        self.total_amount - self.released_amount
    }

    /// Record a release of `amount` at `now`
    ///
    /// Completes the stream when the full amount has been released. The
    /// caller guarantees `amount <= self.remaining()`.
    pub fn apply_release(&mut self, amount: Amount, now: Timestamp) {
        self.released_amount += amount;
        self.last_release_time = now;
        if self.released_amount == self.total_amount {
            self.status = StreamStatus::Completed;
        }
    }
}

/// Read-only view of a stream together with its live releasable amount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub stream: Stream,
    pub releasable: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample_stream() -> Stream {
        Stream {
            id: StreamId::from_bytes([7u8; 32]),
            payer: Principal::new("alice"),
            payee: Principal::new("bob"),
            start_time: 1_000,
            end_time: 4_600,
            total_amount: 1_000,
            released_amount: 0,
            last_release_time: 1_000,
            status: StreamStatus::Active,
            stream_type: StreamType::new(1).unwrap(),
        }
    }

    #[rstest]
    #[case::zero(0, false)]
    #[case::min(1, true)]
    #[case::middle(5, true)]
    #[case::max(10, true)]
    #[case::above_max(11, false)]
    fn test_stream_type_range(#[case] value: u8, #[case] valid: bool) {
        assert_eq!(StreamType::new(value).is_some(), valid);
    }

    #[test]
    fn test_stream_id_hex_roundtrip() {
        let id = StreamId::from_bytes([0xab; 32]);
        let parsed = StreamId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(parsed, id);
        assert!(StreamId::from_hex("abcd").is_err());
    }

    #[test]
    fn test_stream_id_display_is_short_prefix() {
        let id = StreamId::from_bytes([0x01; 32]);
        assert_eq!(id.to_string(), "0101010101010101");
    }

    #[test]
    fn test_apply_release_partial_keeps_stream_active() {
        let mut stream = sample_stream();
        stream.apply_release(400, 2_000);

        assert_eq!(stream.released_amount, 400);
        assert_eq!(stream.last_release_time, 2_000);
        assert_eq!(stream.remaining(), 600);
        assert!(stream.is_active());
    }

    #[test]
    fn test_apply_release_of_remainder_completes_stream() {
        let mut stream = sample_stream();
        stream.apply_release(400, 2_000);
        stream.apply_release(600, 4_600);

        assert_eq!(stream.released_amount, stream.total_amount);
        assert_eq!(stream.status, StreamStatus::Completed);
        assert!(!stream.is_active());
    }

    #[test]
    fn test_duration() {
        assert_eq!(sample_stream().duration(), 3_600);
    }
}
