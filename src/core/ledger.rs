//! In-memory settlement ledger
//!
//! `LedgerPayer` implements [`Payer`] by crediting balances held in a
//! `DashMap`. It backs the CLI replay and the test suites. Recipients can be
//! blocked to simulate a counterparty that refuses payment.

use crate::core::traits::{Payer, Transfer, TransferError};
use crate::types::{Amount, Principal};
use dashmap::{DashMap, DashSet};
use std::collections::HashMap;

/// Balances of every principal that has ever been paid
#[derive(Debug, Default)]
pub struct LedgerPayer {
    /// Credited balances by principal
    balances: DashMap<Principal, Amount>,

    /// Principals whose incoming transfers are refused
    blocked: DashSet<Principal>,
}

impl LedgerPayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse all future transfers to `principal`
    pub fn block(&self, principal: Principal) {
        self.blocked.insert(principal);
    }

    /// Accept transfers to `principal` again
    pub fn unblock(&self, principal: &Principal) {
        self.blocked.remove(principal);
    }

    /// Current balance of `principal` (zero if never paid)
    pub fn balance(&self, principal: &Principal) -> Amount {
        self.balances
            .get(principal)
            .map(|entry| *entry.value())
            .unwrap_or(0)
    }

    /// Every balance, sorted by principal
    pub fn balances(&self) -> Vec<(Principal, Amount)> {
        let mut balances: Vec<(Principal, Amount)> = self
            .balances
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        balances.sort();
        balances
    }

    /// Sum of every balance
    pub fn total(&self) -> Amount {
        self.balances
            .iter()
            .fold(0, |sum, entry| sum.saturating_add(*entry.value()))
    }
}

impl Payer for LedgerPayer {
    /// Credit every transfer, or none
    ///
    /// All transfers are checked (blocked recipients, balance overflow)
    /// before any balance is touched.
    fn settle(&self, transfers: &[Transfer]) -> Result<(), TransferError> {
        let mut credits: HashMap<&Principal, Amount> = HashMap::new();

        for transfer in transfers {
            if self.blocked.contains(&transfer.recipient) {
                return Err(TransferError {
                    recipient: transfer.recipient.clone(),
                    amount: transfer.amount,
                    reason: "recipient refuses payment".to_string(),
                });
            }

            let credit = credits.entry(&transfer.recipient).or_insert(0);
            let new_credit = credit
                .checked_add(transfer.amount)
                .filter(|total| self.balance(&transfer.recipient).checked_add(*total).is_some())
                .ok_or_else(|| TransferError {
                    recipient: transfer.recipient.clone(),
                    amount: transfer.amount,
                    reason: "recipient balance would overflow".to_string(),
                })?;
            *credit = new_credit;
        }

        for (recipient, amount) in credits {
            let mut balance = self.balances.entry(recipient.clone()).or_insert(0);
            *balance = balance.saturating_add(amount);
            tracing::trace!(%recipient, amount, "ledger credited");
        }

        Ok(())
    }
}
