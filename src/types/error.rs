//! Error types for the payment streams engine
//!
//! This module defines all errors that engine operations can return.
//! Every variant carries the offending stream handle or field, and maps onto
//! one of six broad kinds through [`StreamError::kind`].
//!
//! # Error Categories
//!
//! - **InvalidInput**: out-of-range amount, duration or type, self-targeting, nothing to release
//! - **NotFound**: unknown stream handle
//! - **InvalidState**: stream inactive or not yet started, operation already in flight
//! - **Unauthorized**: caller lacks the role the operation requires
//! - **TransferFailure**: an outbound payment did not succeed
//! - **Collision**: a derived handle already exists
//!
//! None of these leave partial state behind: validation failures never touch
//! the store, and payment failures roll back the operation's own mutation.

use super::principal::Principal;
use super::stream::{Amount, StreamId, StreamStatus, Timestamp};
use thiserror::Error;

/// Broad classification of engine errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    InvalidState,
    Unauthorized,
    TransferFailure,
    Collision,
}

/// Main error type for engine operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Committed amount is below the configured minimum
    #[error("Invalid amount {amount}: minimum is {minimum}")]
    InvalidAmount {
        /// The rejected amount
        amount: Amount,
        /// Configured minimum
        minimum: Amount,
    },

    /// Duration is outside the configured bounds
    #[error("Invalid duration {duration}s: must be within [{min}, {max}]")]
    InvalidDuration {
        /// The rejected duration in seconds
        duration: u64,
        /// Configured minimum
        min: u64,
        /// Configured maximum
        max: u64,
    },

    /// Stream type tag is outside 1..=10
    #[error("Invalid stream type {value}: must be within [1, 10]")]
    InvalidStreamType {
        /// The rejected tag
        value: u8,
    },

    /// A principal argument is empty or targets the caller
    #[error("Invalid {field} '{principal}': {reason}")]
    InvalidPrincipal {
        /// Which argument was rejected (payee, fee recipient, ...)
        field: String,
        /// The rejected principal
        principal: Principal,
        /// Why it was rejected
        reason: String,
    },

    /// Batch contains more handles than the configured cap
    #[error("Batch of {size} streams exceeds the maximum of {max}")]
    BatchTooLarge {
        /// Number of handles submitted
        size: usize,
        /// Configured cap
        max: usize,
    },

    /// Nothing has accrued since the last release
    #[error("Nothing to release on stream {stream}")]
    NothingToRelease {
        /// Stream handle
        stream: StreamId,
    },

    /// Checked arithmetic on a timestamp or aggregate would overflow
    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
    },

    /// No stream exists for the handle
    #[error("Stream {stream} not found")]
    StreamNotFound {
        /// Stream handle
        stream: StreamId,
    },

    /// The stream has already completed or been cancelled
    #[error("Stream {stream} is {status}")]
    StreamInactive {
        /// Stream handle
        stream: StreamId,
        /// Terminal status of the stream
        status: StreamStatus,
    },

    /// The stream's accrual window has not opened yet
    #[error("Stream {stream} starts at {start_time}, now is {now}")]
    StreamNotStarted {
        /// Stream handle
        stream: StreamId,
        /// Start of the accrual window
        start_time: Timestamp,
        /// Time of the rejected call
        now: Timestamp,
    },

    /// Another operation on the same stream has not finished yet
    #[error("Stream {stream} already has an operation in flight")]
    OperationInFlight {
        /// Stream handle
        stream: StreamId,
    },

    /// Caller is not allowed to perform the operation
    #[error("{caller} is not authorized to {operation}")]
    Unauthorized {
        /// Rejected caller
        caller: Principal,
        /// Operation that was attempted
        operation: String,
    },

    /// An outbound payment did not succeed; the operation was rolled back
    #[error("Transfer of {amount} to {recipient} failed: {reason}")]
    TransferFailed {
        /// Intended recipient
        recipient: Principal,
        /// Amount that was not delivered
        amount: Amount,
        /// Description of the failure
        reason: String,
    },

    /// The derived handle is already taken
    #[error("Stream handle {stream} already exists")]
    StreamCollision {
        /// Colliding handle
        stream: StreamId,
    },
}

impl StreamError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StreamError::InvalidAmount { .. }
            | StreamError::InvalidDuration { .. }
            | StreamError::InvalidStreamType { .. }
            | StreamError::InvalidPrincipal { .. }
            | StreamError::BatchTooLarge { .. }
            | StreamError::NothingToRelease { .. }
            | StreamError::ArithmeticOverflow { .. } => ErrorKind::InvalidInput,
            StreamError::StreamNotFound { .. } => ErrorKind::NotFound,
            StreamError::StreamInactive { .. }
            | StreamError::StreamNotStarted { .. }
            | StreamError::OperationInFlight { .. } => ErrorKind::InvalidState,
            StreamError::Unauthorized { .. } => ErrorKind::Unauthorized,
            StreamError::TransferFailed { .. } => ErrorKind::TransferFailure,
            StreamError::StreamCollision { .. } => ErrorKind::Collision,
        }
    }

    /// Create a StreamNotFound error
    pub fn not_found(stream: StreamId) -> Self {
        StreamError::StreamNotFound { stream }
    }

    /// Create a StreamInactive error
    pub fn inactive(stream: StreamId, status: StreamStatus) -> Self {
        StreamError::StreamInactive { stream, status }
    }

    /// Create an InvalidPrincipal error
    pub fn invalid_principal(field: &str, principal: &Principal, reason: &str) -> Self {
        StreamError::InvalidPrincipal {
            field: field.to_string(),
            principal: principal.clone(),
            reason: reason.to_string(),
        }
    }

    /// Create an Unauthorized error
    pub fn unauthorized(caller: &Principal, operation: &str) -> Self {
        StreamError::Unauthorized {
            caller: caller.clone(),
            operation: operation.to_string(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str) -> Self {
        StreamError::ArithmeticOverflow {
            operation: operation.to_string(),
        }
    }

    /// Create a TransferFailed error
    pub fn transfer_failed(recipient: &Principal, amount: Amount, reason: &str) -> Self {
        StreamError::TransferFailed {
            recipient: recipient.clone(),
            amount,
            reason: reason.to_string(),
        }
    }
}

/// Errors raised while replaying a command ledger
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    /// The engine rejected the command
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// The command names a stream reference no create has bound
    #[error("Unknown stream reference '{reference}'")]
    UnknownReference {
        /// The unbound reference
        reference: String,
    },

    /// A create command reuses a reference that is already bound
    #[error("Stream reference '{reference}' is already bound")]
    DuplicateReference {
        /// The reused reference
        reference: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const ID: StreamId = StreamId::from_bytes([0x11; 32]);

    #[rstest]
    #[case::invalid_amount(
        StreamError::InvalidAmount { amount: 5, minimum: 100 },
        "Invalid amount 5: minimum is 100"
    )]
    #[case::invalid_duration(
        StreamError::InvalidDuration { duration: 10, min: 3600, max: 7200 },
        "Invalid duration 10s: must be within [3600, 7200]"
    )]
    #[case::invalid_stream_type(
        StreamError::InvalidStreamType { value: 11 },
        "Invalid stream type 11: must be within [1, 10]"
    )]
    #[case::invalid_principal(
        StreamError::invalid_principal("payee", &Principal::new("alice"), "payee equals caller"),
        "Invalid payee 'alice': payee equals caller"
    )]
    #[case::batch_too_large(
        StreamError::BatchTooLarge { size: 51, max: 50 },
        "Batch of 51 streams exceeds the maximum of 50"
    )]
    #[case::nothing_to_release(
        StreamError::NothingToRelease { stream: ID },
        "Nothing to release on stream 1111111111111111"
    )]
    #[case::not_found(StreamError::not_found(ID), "Stream 1111111111111111 not found")]
    #[case::inactive(
        StreamError::inactive(ID, StreamStatus::Cancelled),
        "Stream 1111111111111111 is cancelled"
    )]
    #[case::unauthorized(
        StreamError::unauthorized(&Principal::new("mallory"), "cancel stream"),
        "mallory is not authorized to cancel stream"
    )]
    #[case::transfer_failed(
        StreamError::transfer_failed(&Principal::new("bob"), 488, "recipient rejected payment"),
        "Transfer of 488 to bob failed: recipient rejected payment"
    )]
    fn test_error_display(#[case] error: StreamError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case::amount(StreamError::InvalidAmount { amount: 0, minimum: 1 }, ErrorKind::InvalidInput)]
    #[case::nothing(StreamError::NothingToRelease { stream: ID }, ErrorKind::InvalidInput)]
    #[case::overflow(StreamError::arithmetic_overflow("create"), ErrorKind::InvalidInput)]
    #[case::not_found(StreamError::not_found(ID), ErrorKind::NotFound)]
    #[case::inactive(StreamError::inactive(ID, StreamStatus::Completed), ErrorKind::InvalidState)]
    #[case::not_started(
        StreamError::StreamNotStarted { stream: ID, start_time: 10, now: 5 },
        ErrorKind::InvalidState
    )]
    #[case::in_flight(StreamError::OperationInFlight { stream: ID }, ErrorKind::InvalidState)]
    #[case::unauthorized(
        StreamError::unauthorized(&Principal::new("x"), "withdraw"),
        ErrorKind::Unauthorized
    )]
    #[case::transfer(
        StreamError::transfer_failed(&Principal::new("x"), 1, "no"),
        ErrorKind::TransferFailure
    )]
    #[case::collision(StreamError::StreamCollision { stream: ID }, ErrorKind::Collision)]
    fn test_error_kind(#[case] error: StreamError, #[case] expected: ErrorKind) {
        assert_eq!(error.kind(), expected);
    }

    #[test]
    fn test_replay_error_wraps_stream_error() {
        let error: ReplayError = StreamError::not_found(ID).into();
        assert!(matches!(error, ReplayError::Stream(StreamError::StreamNotFound { .. })));
        assert_eq!(error.to_string(), "Stream 1111111111111111 not found");
    }
}
