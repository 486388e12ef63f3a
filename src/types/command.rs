//! Replay commands for the payment streams engine
//!
//! A command ledger is a sequence of calls against the engine, each issued by
//! a caller at a point in time. Streams are named in the ledger by caller-chosen
//! references, because their handles are only known once the engine creates them.

use super::principal::Principal;
use super::stream::{Amount, Timestamp};

/// Caller-chosen name of a stream within a command ledger
pub type StreamRef = String;

/// Operations that can appear in a command ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fund a new stream and bind it to `reference`
    Create {
        reference: StreamRef,
        payee: Principal,
        duration: u64,
        stream_type: u8,
        amount: Amount,
    },

    /// Release whatever has accrued on one stream
    Release { reference: StreamRef },

    /// Best-effort release across several streams
    BatchRelease { references: Vec<StreamRef> },

    /// Terminate a stream early and refund the payer
    Cancel { reference: StreamRef, reason: u8 },

    /// Redirect protocol fees (owner only)
    SetFeeRecipient { recipient: Principal },

    /// Add an administrator (owner only)
    GrantAdmin { principal: Principal },

    /// Remove an administrator (owner only)
    RevokeAdmin { principal: Principal },

    /// Sweep custody to the owner (owner only)
    EmergencyWithdraw,
}

impl Command {
    /// Short lowercase name, matching the `type` column of the input CSV
    pub fn name(&self) -> &'static str {
        match self {
            Command::Create { .. } => "create",
            Command::Release { .. } => "release",
            Command::BatchRelease { .. } => "batch",
            Command::Cancel { .. } => "cancel",
            Command::SetFeeRecipient { .. } => "fee_recipient",
            Command::GrantAdmin { .. } => "grant_admin",
            Command::RevokeAdmin { .. } => "revoke_admin",
            Command::EmergencyWithdraw => "withdraw",
        }
    }
}

/// A single ledger entry: who called, when, and what
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    /// Principal issuing the call
    pub caller: Principal,

    /// Time at which the call is executed
    pub time: Timestamp,

    /// The operation requested
    pub command: Command,
}

impl CommandRecord {
    /// The single stream this record touches, if any
    ///
    /// Records without a partition key (batch and administrative commands)
    /// may touch any stream or engine-wide state, so concurrent replay treats
    /// them as barriers.
    pub fn partition_key(&self) -> Option<&str> {
        match &self.command {
            Command::Create { reference, .. }
            | Command::Release { reference }
            | Command::Cancel { reference, .. } => Some(reference),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record(command: Command) -> CommandRecord {
        CommandRecord {
            caller: Principal::new("alice"),
            time: 0,
            command,
        }
    }

    #[rstest]
    #[case::create(
        Command::Create {
            reference: "s1".to_string(),
            payee: Principal::new("bob"),
            duration: 3600,
            stream_type: 1,
            amount: 1000,
        },
        Some("s1")
    )]
    #[case::release(Command::Release { reference: "s2".to_string() }, Some("s2"))]
    #[case::cancel(Command::Cancel { reference: "s3".to_string(), reason: 0 }, Some("s3"))]
    #[case::batch(Command::BatchRelease { references: vec!["s1".to_string()] }, None)]
    #[case::withdraw(Command::EmergencyWithdraw, None)]
    #[case::fee_recipient(Command::SetFeeRecipient { recipient: Principal::new("t") }, None)]
    fn test_partition_key(#[case] command: Command, #[case] expected: Option<&str>) {
        assert_eq!(record(command).partition_key(), expected);
    }
}
