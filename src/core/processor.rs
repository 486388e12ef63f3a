//! Command ledger dispatch
//!
//! This module provides the `CommandProcessor`, which replays `CommandRecord`s
//! against a shared `StreamEngine`. Ledgers name streams by caller-chosen
//! references; the processor binds each reference to the handle returned by
//! its `create` command and resolves it for every later command.
//!
//! # Thread Safety
//!
//! Reference bindings live in a `DashMap` and the engine is shared behind an
//! `Arc`, so one processor can serve several replay tasks at once as long as
//! each reference is only driven from one task.

use std::sync::Arc;

use dashmap::DashMap;

use crate::core::config::EngineConfig;
use crate::core::engine::{CallContext, StreamEngine};
use crate::core::ledger::LedgerPayer;
use crate::types::{
    Command, CommandRecord, Principal, ReplayError, Stream, StreamId, StreamRef,
};

/// Everything needed to build an engine for a replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Creation bounds and fee rate
    pub config: EngineConfig,
    /// Owner principal
    pub owner: Principal,
    /// Initial fee recipient
    pub fee_recipient: Principal,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let owner = Principal::new("owner");
        Self {
            config: EngineConfig::default(),
            fee_recipient: owner.clone(),
            owner,
        }
    }
}

impl EngineSettings {
    /// Build a fresh engine paying into an in-memory ledger
    pub fn build_engine(&self) -> StreamEngine<LedgerPayer> {
        StreamEngine::new(
            self.config.clone(),
            self.owner.clone(),
            self.fee_recipient.clone(),
            LedgerPayer::new(),
        )
    }
}

/// Replays ledger commands against a shared engine
#[derive(Clone)]
pub struct CommandProcessor {
    /// Engine the commands are applied to
    engine: Arc<StreamEngine<LedgerPayer>>,

    /// Stream handles by ledger reference
    references: Arc<DashMap<StreamRef, StreamId>>,
}

impl CommandProcessor {
    pub fn new(engine: Arc<StreamEngine<LedgerPayer>>) -> Self {
        Self {
            engine,
            references: Arc::new(DashMap::new()),
        }
    }

    pub fn engine(&self) -> &Arc<StreamEngine<LedgerPayer>> {
        &self.engine
    }

    /// Handle bound to `reference`
    ///
    /// # Errors
    ///
    /// `UnknownReference` if no successful create has bound it
    pub fn resolve(&self, reference: &str) -> Result<StreamId, ReplayError> {
        self.references
            .get(reference)
            .map(|entry| *entry.value())
            .ok_or_else(|| ReplayError::UnknownReference {
                reference: reference.to_string(),
            })
    }

    /// Apply one ledger record to the engine
    ///
    /// # Arguments
    ///
    /// * `record` - The command with its caller and execution time
    ///
    /// # Errors
    ///
    /// - `UnknownReference` if the command names an unbound reference
    ///   (batch releases skip unbound references instead)
    /// - `DuplicateReference` if a create reuses a bound reference
    /// - `Stream` for any error returned by the engine
    pub fn process(&self, record: CommandRecord) -> Result<(), ReplayError> {
        let ctx = CallContext::new(record.caller, record.time);

        match record.command {
            Command::Create {
                reference,
                payee,
                duration,
                stream_type,
                amount,
            } => {
                if self.references.contains_key(&reference) {
                    return Err(ReplayError::DuplicateReference { reference });
                }
                let id = self
                    .engine
                    .create_stream(&ctx, payee, duration, stream_type, amount)?;
                tracing::debug!(%reference, stream = %id, "reference bound");
                self.references.insert(reference, id);
            }
            Command::Release { reference } => {
                let id = self.resolve(&reference)?;
                self.engine.release_funds(&ctx, &id)?;
            }
            Command::BatchRelease { references } => {
                let mut ids = Vec::with_capacity(references.len());
                for reference in &references {
                    match self.resolve(reference) {
                        Ok(id) => ids.push(id),
                        Err(_) => tracing::debug!(%reference, "batch skip: unknown reference"),
                    }
                }
                self.engine.batch_release_funds(&ctx, &ids)?;
            }
            Command::Cancel { reference, reason } => {
                let id = self.resolve(&reference)?;
                self.engine.cancel_stream(&ctx, &id, reason)?;
            }
            Command::SetFeeRecipient { recipient } => {
                self.engine.set_fee_recipient(&ctx, recipient)?;
            }
            Command::GrantAdmin { principal } => {
                self.engine.grant_admin(&ctx, principal)?;
            }
            Command::RevokeAdmin { principal } => {
                self.engine.revoke_admin(&ctx, &principal)?;
            }
            Command::EmergencyWithdraw => {
                self.engine.emergency_withdraw(&ctx)?;
            }
        }

        Ok(())
    }

    /// Every bound stream with its reference, sorted by reference
    pub fn stream_rows(&self) -> Vec<(StreamRef, Stream)> {
        let mut rows: Vec<(StreamRef, Stream)> = self
            .references
            .iter()
            .filter_map(|entry| {
                self.engine
                    .stream(entry.value())
                    .ok()
                    .map(|stream| (entry.key().clone(), stream))
            })
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }
}
