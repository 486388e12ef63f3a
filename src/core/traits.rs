//! Outbound payment capability
//!
//! The engine never moves value itself. Every payout goes through a [`Payer`],
//! which lets the host plug in a real settlement layer and lets tests inject
//! failures or re-entrant callbacks.

use crate::types::{Amount, Principal};
use thiserror::Error;

/// One outbound payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// Who receives the value
    pub recipient: Principal,
    /// How much is paid
    pub amount: Amount,
}

impl Transfer {
    pub fn new(recipient: Principal, amount: Amount) -> Self {
        Self { recipient, amount }
    }
}

/// Why a settlement did not go through
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transfer of {amount} to {recipient} rejected: {reason}")]
pub struct TransferError {
    /// Recipient of the first transfer that could not be delivered
    pub recipient: Principal,
    /// Amount of that transfer
    pub amount: Amount,
    /// Description of the failure
    pub reason: String,
}

/// Trait for delivering outbound payments
///
/// # Contract
///
/// `settle` is all-or-nothing: either every transfer in the slice is delivered,
/// or none is and an error is returned. Implementations may call back into the
/// engine (a recipient reacting to being paid); the engine holds no locks while
/// `settle` runs, but rejects nested operations on streams it is settling.
pub trait Payer: Send + Sync {
    /// Deliver every transfer in `transfers`, or none of them
    fn settle(&self, transfers: &[Transfer]) -> Result<(), TransferError>;
}

impl<P: Payer + ?Sized> Payer for std::sync::Arc<P> {
    fn settle(&self, transfers: &[Transfer]) -> Result<(), TransferError> {
        (**self).settle(transfers)
    }
}
