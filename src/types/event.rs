//! Notifications emitted for external indexers and observers
//!
//! The engine never consumes its own events; they are buffered and handed
//! out through `StreamEngine::drain_events`.

use super::principal::Principal;
use super::stream::{Amount, StreamId, StreamType, Timestamp};
use serde::Serialize;

/// A state change observed on a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A new stream was funded
    Created {
        stream: StreamId,
        payer: Principal,
        payee: Principal,
        amount: Amount,
        start_time: Timestamp,
        end_time: Timestamp,
        stream_type: StreamType,
    },

    /// Funds were released to the payee
    Released {
        stream: StreamId,
        payer: Principal,
        payee: Principal,
        /// Gross amount of this release
        amount: Amount,
        /// Protocol fee skimmed from `amount`
        fee: Amount,
        /// Cumulative gross amount released after this release
        released_total: Amount,
        time: Timestamp,
    },

    /// The stream was terminated early and the payer refunded
    Cancelled {
        stream: StreamId,
        payer: Principal,
        payee: Principal,
        refund: Amount,
        /// Prorated value earned by the payee up to cancellation
        owed: Amount,
        /// Part of `owed` never released; it stays in custody
        stranded: Amount,
        reason: u8,
        time: Timestamp,
    },

    /// The final release brought `released_amount` up to `total_amount`
    Completed {
        stream: StreamId,
        payer: Principal,
        payee: Principal,
        total_amount: Amount,
        time: Timestamp,
    },
}

impl StreamEvent {
    /// Handle of the stream this event refers to
    pub fn stream(&self) -> StreamId {
        match self {
            StreamEvent::Created { stream, .. }
            | StreamEvent::Released { stream, .. }
            | StreamEvent::Cancelled { stream, .. }
            | StreamEvent::Completed { stream, .. } => *stream,
        }
    }

    /// Short lowercase name used in logs and CSV output
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Created { .. } => "created",
            StreamEvent::Released { .. } => "released",
            StreamEvent::Cancelled { .. } => "cancelled",
            StreamEvent::Completed { .. } => "completed",
        }
    }

    /// Time at which the event happened
    pub fn time(&self) -> Timestamp {
        match self {
            StreamEvent::Created { start_time, .. } => *start_time,
            StreamEvent::Released { time, .. }
            | StreamEvent::Cancelled { time, .. }
            | StreamEvent::Completed { time, .. } => *time,
        }
    }
}
