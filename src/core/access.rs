//! Role checks for privileged operations
//!
//! One owner, plus a membership set of administrators. The owner is
//! implicitly an administrator and is the only principal that can change
//! the set.

use crate::types::{Principal, StreamError};
use dashmap::DashSet;

/// Owner and administrator membership
#[derive(Debug)]
pub struct RoleSet {
    owner: Principal,
    admins: DashSet<Principal>,
}

impl RoleSet {
    pub fn new(owner: Principal) -> Self {
        Self {
            owner,
            admins: DashSet::new(),
        }
    }

    pub fn owner(&self) -> &Principal {
        &self.owner
    }

    pub fn is_owner(&self, principal: &Principal) -> bool {
        *principal == self.owner
    }

    /// Owner or a granted administrator
    pub fn is_admin(&self, principal: &Principal) -> bool {
        self.is_owner(principal) || self.admins.contains(principal)
    }

    /// Fail with `Unauthorized` unless `caller` is the owner
    pub fn require_owner(&self, caller: &Principal, operation: &str) -> Result<(), StreamError> {
        if self.is_owner(caller) {
            Ok(())
        } else {
            Err(StreamError::unauthorized(caller, operation))
        }
    }

    /// Add `principal` to the administrators; returns false if already present
    pub fn grant(&self, principal: Principal) -> Result<bool, StreamError> {
        if !principal.is_valid() {
            return Err(StreamError::invalid_principal("admin", &principal, "empty principal"));
        }
        Ok(self.admins.insert(principal))
    }

    /// Remove `principal` from the administrators; returns false if absent
    ///
    /// The owner's implicit role cannot be revoked.
    pub fn revoke(&self, principal: &Principal) -> Result<bool, StreamError> {
        if self.is_owner(principal) {
            return Err(StreamError::invalid_principal(
                "admin",
                principal,
                "the owner cannot be revoked",
            ));
        }
        Ok(self.admins.remove(principal).is_some())
    }
}
