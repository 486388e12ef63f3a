//! Payment stream engine
//!
//! This module provides the `StreamEngine`, which orchestrates stream creation,
//! release, batch release and cancellation by coordinating the `StreamStore`,
//! the pure calculators, the in-flight guards and the outbound `Payer`.
//!
//! # Ordering
//!
//! Every mutating operation follows the same sequence:
//! 1. Mark the stream as in flight (nested calls on it are rejected)
//! 2. Validate against a snapshot of the stream
//! 3. Persist the new state
//! 4. Settle the outbound payments
//! 5. On payment failure, restore the snapshot and return `TransferFailed`
//! 6. Otherwise update payout counters and emit notifications
//!
//! State is written before any value leaves the engine, so a recipient calling
//! back in during settlement sees the stream as already paid. Callers observe
//! each operation as all-or-nothing.
//!
//! # Thread Safety
//!
//! The engine is `Sync` when its payer is, and is meant to be shared behind an
//! `Arc`. Operations on different streams run in parallel; operations on the
//! same stream are serialised by the in-flight guard.
//!
//! Releases and cancellations write the store before paying out. Until the
//! payment settles, queries are served the stream's last committed state, so
//! a rolled-back operation is never observed.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use crate::core::access::RoleSet;
use crate::core::calculator::{self, FeeSplit};
use crate::core::config::EngineConfig;
use crate::core::guard::{InFlightGuard, InFlightSet};
use crate::core::id_generator::StreamIdGenerator;
use crate::core::stream_store::StreamStore;
use crate::core::traits::{Payer, Transfer};
use crate::types::{
    Amount, GlobalStats, Principal, Stream, StreamError, StreamEvent, StreamId, StreamInfo,
    StreamStatus, StreamType, Timestamp, UserStats,
};

/// Who is calling, and when
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// Principal issuing the call
    pub caller: Principal,
    /// Time at which the call executes
    pub now: Timestamp,
}

impl CallContext {
    pub fn new(caller: impl Into<Principal>, now: Timestamp) -> Self {
        Self {
            caller: caller.into(),
            now,
        }
    }
}

/// Outcome of a successful release on one stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Stream handle
    pub stream: StreamId,
    /// Gross amount released
    pub amount: Amount,
    /// Protocol fee taken from `amount`
    pub fee: Amount,
    /// Amount paid to the payee
    pub net: Amount,
    /// Cumulative gross amount released after this release
    pub released_total: Amount,
    /// Whether this release completed the stream
    pub completed: bool,
}

/// Outcome of a batch release
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchRelease {
    /// Streams that released funds, in submission order
    pub released: Vec<Release>,
    /// Handles skipped as ineligible (missing, inactive, not started, busy,
    /// nothing accrued, or a repeat of an earlier handle in the batch)
    pub skipped: Vec<StreamId>,
}

impl BatchRelease {
    /// Gross amount released across the batch
    pub fn total_released(&self) -> Amount {
        self.released.iter().map(|release| release.amount).sum()
    }
}

/// Outcome of a successful cancellation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancellation {
    /// Stream handle
    pub stream: StreamId,
    /// Amount returned to the payer
    pub refund: Amount,
    /// Prorated value earned by the payee up to cancellation
    pub owed: Amount,
    /// Part of `owed` that was never released and stays in custody
    pub stranded: Amount,
}

/// Payment stream engine
///
/// Owns the stream store and all engine-wide state, and pays out through `P`.
pub struct StreamEngine<P: Payer> {
    /// Creation bounds and fee rate
    config: EngineConfig,

    /// Stream records and aggregate counters
    store: StreamStore,

    /// Handle derivation
    ids: StreamIdGenerator,

    /// Streams with an operation currently running
    in_flight: InFlightSet,

    /// Owner and administrators
    roles: RoleSet,

    /// Receiver of protocol fees
    fee_recipient: RwLock<Principal>,

    /// Value committed to the engine and not yet paid out
    custody: Mutex<Amount>,

    /// Notifications not yet drained
    events: Mutex<Vec<StreamEvent>>,

    /// Outbound payment capability
    payer: P,
}

impl<P: Payer> StreamEngine<P> {
    /// Create an engine with no streams
    ///
    /// # Arguments
    ///
    /// * `config` - Creation bounds and fee rate
    /// * `owner` - Principal allowed to run administrative operations
    /// * `fee_recipient` - Initial receiver of protocol fees
    /// * `payer` - Capability used for every outbound payment
    pub fn new(config: EngineConfig, owner: Principal, fee_recipient: Principal, payer: P) -> Self {
        Self {
            config,
            store: StreamStore::new(),
            ids: StreamIdGenerator::new(),
            in_flight: InFlightSet::new(),
            roles: RoleSet::new(owner),
            fee_recipient: RwLock::new(fee_recipient),
            custody: Mutex::new(0),
            events: Mutex::new(Vec::new()),
            payer,
        }
    }

    fn custody(&self) -> MutexGuard<'_, Amount> {
        self.custody.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: StreamEvent) {
        tracing::debug!(event = event.name(), stream = %event.stream(), "stream event");
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Take `amount` out of custody and settle `transfers`
    ///
    /// Custody is restored if settlement fails. The custody lock is not held
    /// while the payer runs.
    fn pay_from_custody(&self, amount: Amount, transfers: &[Transfer]) -> Result<(), StreamError> {
        if transfers.is_empty() {
            return Ok(());
        }

        {
            let mut custody = self.custody();
            if *custody < amount {
                return Err(StreamError::transfer_failed(
                    &transfers[0].recipient,
                    amount,
                    &format!("insufficient custody ({} held)", *custody),
                ));
            }
            *custody -= amount;
        }

        self.payer.settle(transfers).map_err(|e| {
            *self.custody() += amount;
            StreamError::transfer_failed(&e.recipient, e.amount, &e.reason)
        })
    }

    /// Transfers paying `split` to the payee and the fee recipient, skipping zero amounts
    fn payout_transfers(payee: &Principal, fee_recipient: &Principal, split: FeeSplit) -> Vec<Transfer> {
        let mut transfers = Vec::with_capacity(2);
        if split.net > 0 {
            transfers.push(Transfer::new(payee.clone(), split.net));
        }
        if split.fee > 0 {
            transfers.push(Transfer::new(fee_recipient.clone(), split.fee));
        }
        transfers
    }

    /// Create and fund a new stream
    ///
    /// The caller becomes the payer and is taken to have attached `amount`,
    /// which is credited to custody. Accrual starts at `ctx.now` and ends
    /// `duration` seconds later.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Caller (payer) and creation time
    /// * `payee` - Beneficiary of the stream
    /// * `duration` - Length of the accrual window in seconds
    /// * `stream_type` - Opaque tag in 1..=10
    /// * `amount` - Committed gross value
    ///
    /// # Returns
    ///
    /// The handle of the new stream
    ///
    /// # Errors
    ///
    /// Returns an error, without creating anything or consuming a handle, if:
    /// - `amount` is below the configured minimum
    /// - `duration` is outside the configured bounds
    /// - `payee` is empty or equal to the caller
    /// - `stream_type` is outside 1..=10
    /// - the end time or an aggregate counter would overflow
    ///
    /// Fails without creating anything, but after consuming a nonce, if the
    /// derived handle already exists.
    pub fn create_stream(
        &self,
        ctx: &CallContext,
        payee: Principal,
        duration: u64,
        stream_type: u8,
        amount: Amount,
    ) -> Result<StreamId, StreamError> {
        if amount < self.config.min_amount {
            return Err(StreamError::InvalidAmount {
                amount,
                minimum: self.config.min_amount,
            });
        }

        if duration < self.config.min_duration || duration > self.config.max_duration {
            return Err(StreamError::InvalidDuration {
                duration,
                min: self.config.min_duration,
                max: self.config.max_duration,
            });
        }

        if !ctx.caller.is_valid() {
            return Err(StreamError::invalid_principal("payer", &ctx.caller, "empty principal"));
        }
        if !payee.is_valid() {
            return Err(StreamError::invalid_principal("payee", &payee, "empty principal"));
        }
        if payee == ctx.caller {
            return Err(StreamError::invalid_principal("payee", &payee, "payee equals caller"));
        }

        let stream_type = StreamType::new(stream_type)
            .ok_or(StreamError::InvalidStreamType { value: stream_type })?;

        let end_time = ctx
            .now
            .checked_add(duration)
            .ok_or_else(|| StreamError::arithmetic_overflow("stream end time"))?;

        self.store.check_capacity(amount)?;

        let id = self.ids.next(&ctx.caller, &payee, duration, ctx.now);
        let stream = Stream {
            id,
            payer: ctx.caller.clone(),
            payee,
            start_time: ctx.now,
            end_time,
            total_amount: amount,
            released_amount: 0,
            last_release_time: ctx.now,
            status: StreamStatus::Active,
            stream_type,
        };

        self.store.insert(stream.clone())?;
        // Custody never exceeds the global volume the store just checked.
        {
            let mut custody = self.custody();
            *custody = custody.saturating_add(amount);
        }

        tracing::info!(
            stream = %id,
            payer = %stream.payer,
            payee = %stream.payee,
            amount,
            duration,
            "stream created"
        );
        self.emit(StreamEvent::Created {
            stream: id,
            payer: stream.payer,
            payee: stream.payee,
            amount,
            start_time: stream.start_time,
            end_time,
            stream_type,
        });

        Ok(id)
    }

    /// Release everything accrued on a stream
    ///
    /// Splits the releasable amount into protocol fee and net payout, records
    /// the release, then pays the payee and the fee recipient in a single
    /// settlement. Completes the stream when its full amount has been released.
    ///
    /// Safe to retry: once paid, the releasable amount drops to zero.
    ///
    /// # Errors
    ///
    /// - `StreamNotFound` if the handle is unknown
    /// - `StreamInactive` if the stream is completed or cancelled
    /// - `StreamNotStarted` if `ctx.now` is before the start time
    /// - `OperationInFlight` if another operation on the stream is running
    /// - `NothingToRelease` if nothing has accrued since the last release
    /// - `TransferFailed` if settlement fails; the release is rolled back
    pub fn release_funds(&self, ctx: &CallContext, id: &StreamId) -> Result<Release, StreamError> {
        let guard = self.in_flight.enter(*id)?;

        let snapshot = self.store.get(id)?;
        if !snapshot.is_active() {
            return Err(StreamError::inactive(*id, snapshot.status));
        }
        if ctx.now < snapshot.start_time {
            return Err(StreamError::StreamNotStarted {
                stream: *id,
                start_time: snapshot.start_time,
                now: ctx.now,
            });
        }

        let amount = calculator::releasable(&snapshot, ctx.now);
        if amount == 0 {
            return Err(StreamError::NothingToRelease { stream: *id });
        }

        let split = calculator::split_fee(amount, self.config.protocol_fee_bps);
        let fee_recipient = self.fee_recipient();

        guard.pin(&snapshot);
        let updated = self.store.update(id, |stream| {
            stream.apply_release(amount, ctx.now);
            Ok(stream.clone())
        })?;

        let transfers = Self::payout_transfers(&updated.payee, &fee_recipient, split);
        if let Err(error) = self.pay_from_custody(amount, &transfers) {
            self.store.restore(snapshot);
            tracing::warn!(stream = %id, %error, "release rolled back");
            return Err(error);
        }
        guard.settled();

        let release = Release {
            stream: *id,
            amount,
            fee: split.fee,
            net: split.net,
            released_total: updated.released_amount,
            completed: !updated.is_active(),
        };
        self.finish_release(&updated, &release, ctx.now);

        Ok(release)
    }

    /// Counters, logs and notifications after a settled release
    fn finish_release(&self, stream: &Stream, release: &Release, now: Timestamp) {
        self.store.record_payout(&stream.payee, release.net);

        tracing::info!(
            stream = %release.stream,
            amount = release.amount,
            fee = release.fee,
            released_total = release.released_total,
            "funds released"
        );
        self.emit(StreamEvent::Released {
            stream: release.stream,
            payer: stream.payer.clone(),
            payee: stream.payee.clone(),
            amount: release.amount,
            fee: release.fee,
            released_total: release.released_total,
            time: now,
        });

        if release.completed {
            tracing::info!(stream = %release.stream, "stream completed");
            self.emit(StreamEvent::Completed {
                stream: release.stream,
                payer: stream.payer.clone(),
                payee: stream.payee.clone(),
                total_amount: stream.total_amount,
                time: now,
            });
        }
    }

    /// Release accrued funds across up to `max_batch_size` streams
    ///
    /// Ineligible handles are skipped silently: unknown, completed, cancelled,
    /// not yet started, busy with another operation, or with nothing accrued.
    /// A handle repeated in the batch releases once; later occurrences find
    /// nothing left and are skipped.
    ///
    /// All eligible releases settle in one payment. If it fails, every
    /// release in the batch is rolled back and the call fails as a whole.
    ///
    /// # Errors
    ///
    /// - `BatchTooLarge` if more handles than the configured cap are given
    /// - `TransferFailed` if settlement fails; nothing in the batch is kept
    pub fn batch_release_funds(
        &self,
        ctx: &CallContext,
        ids: &[StreamId],
    ) -> Result<BatchRelease, StreamError> {
        if ids.len() > self.config.max_batch_size {
            return Err(StreamError::BatchTooLarge {
                size: ids.len(),
                max: self.config.max_batch_size,
            });
        }

        let fee_recipient = self.fee_recipient();
        let mut guards: HashMap<StreamId, InFlightGuard<'_>> = HashMap::new();
        let mut snapshots = Vec::new();
        let mut updated_streams = Vec::new();
        let mut transfers = Vec::new();
        let mut gross: Amount = 0;
        let mut outcome = BatchRelease::default();

        for id in ids {
            if !guards.contains_key(id) {
                match self.in_flight.enter(*id) {
                    Ok(guard) => {
                        guards.insert(*id, guard);
                    }
                    Err(_) => {
                        tracing::debug!(stream = %id, "batch skip: operation in flight");
                        outcome.skipped.push(*id);
                        continue;
                    }
                }
            }

            let Ok(snapshot) = self.store.get(id) else {
                tracing::debug!(stream = %id, "batch skip: not found");
                outcome.skipped.push(*id);
                continue;
            };
            if !snapshot.is_active() || ctx.now < snapshot.start_time {
                tracing::debug!(stream = %id, status = %snapshot.status, "batch skip: not eligible");
                outcome.skipped.push(*id);
                continue;
            }

            let amount = calculator::releasable(&snapshot, ctx.now);
            if amount == 0 {
                tracing::debug!(stream = %id, "batch skip: nothing to release");
                outcome.skipped.push(*id);
                continue;
            }

            let split = calculator::split_fee(amount, self.config.protocol_fee_bps);
            if let Some(guard) = guards.get(id) {
                guard.pin(&snapshot);
            }
            let updated = self.store.update(id, |stream| {
                stream.apply_release(amount, ctx.now);
                Ok(stream.clone())
            })?;

            transfers.extend(Self::payout_transfers(&updated.payee, &fee_recipient, split));
            // Bounded by the global volume, which the store keeps within u128.
            gross += amount;
            outcome.released.push(Release {
                stream: *id,
                amount,
                fee: split.fee,
                net: split.net,
                released_total: updated.released_amount,
                completed: !updated.is_active(),
            });
            snapshots.push(snapshot);
            updated_streams.push(updated);
        }

        if let Err(error) = self.pay_from_custody(gross, &transfers) {
            for snapshot in snapshots.into_iter().rev() {
                self.store.restore(snapshot);
            }
            tracing::warn!(
                streams = outcome.released.len(),
                %error,
                "batch release rolled back"
            );
            return Err(error);
        }
        for guard in guards.values() {
            guard.settled();
        }

        for (stream, release) in updated_streams.iter().zip(&outcome.released) {
            self.finish_release(stream, release, ctx.now);
        }

        tracing::info!(
            released = outcome.released.len(),
            skipped = outcome.skipped.len(),
            gross,
            "batch release settled"
        );

        Ok(outcome)
    }

    /// Cancel a stream and refund the payer its unearned share
    ///
    /// The payee's share is prorated over the elapsed time, clamped to the
    /// stream window: `owed = floor(total * elapsed / duration)` and
    /// `refund = total - owed`. Only the refund moves. Whatever part of `owed`
    /// was never released stays in custody and is reported as `stranded`.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Caller (the payer or an administrator) and cancellation time
    /// * `id` - Stream handle
    /// * `reason` - Opaque reason code carried into the notification
    ///
    /// # Errors
    ///
    /// - `StreamNotFound` if the handle is unknown
    /// - `Unauthorized` if the caller is neither the payer nor an administrator
    /// - `StreamInactive` if the stream is completed or cancelled
    /// - `StreamNotStarted` if `ctx.now` is before the start time
    /// - `OperationInFlight` if another operation on the stream is running
    /// - `TransferFailed` if the refund fails; the cancellation is rolled back
    pub fn cancel_stream(
        &self,
        ctx: &CallContext,
        id: &StreamId,
        reason: u8,
    ) -> Result<Cancellation, StreamError> {
        let guard = self.in_flight.enter(*id)?;

        let snapshot = self.store.get(id)?;
        if ctx.caller != snapshot.payer && !self.roles.is_admin(&ctx.caller) {
            return Err(StreamError::unauthorized(&ctx.caller, "cancel stream"));
        }
        if !snapshot.is_active() {
            return Err(StreamError::inactive(*id, snapshot.status));
        }
        if ctx.now < snapshot.start_time {
            return Err(StreamError::StreamNotStarted {
                stream: *id,
                start_time: snapshot.start_time,
                now: ctx.now,
            });
        }

        let owed = calculator::owed_at(&snapshot, ctx.now);
        let refund = snapshot.total_amount - owed;
        let stranded = owed - snapshot.released_amount;

        guard.pin(&snapshot);
        self.store.update(id, |stream| {
            stream.status = StreamStatus::Cancelled;
            Ok(())
        })?;

        let transfers = if refund > 0 {
            vec![Transfer::new(snapshot.payer.clone(), refund)]
        } else {
            Vec::new()
        };
        if let Err(error) = self.pay_from_custody(refund, &transfers) {
            self.store.restore(snapshot);
            tracing::warn!(stream = %id, %error, "cancellation rolled back");
            return Err(error);
        }
        guard.settled();

        tracing::info!(stream = %id, refund, owed, reason, "stream cancelled");
        if stranded > 0 {
            tracing::warn!(
                stream = %id,
                stranded,
                "owed value was never released and remains in custody"
            );
        }
        self.emit(StreamEvent::Cancelled {
            stream: *id,
            payer: snapshot.payer,
            payee: snapshot.payee,
            refund,
            owed,
            stranded,
            reason,
            time: ctx.now,
        });

        Ok(Cancellation {
            stream: *id,
            refund,
            owed,
            stranded,
        })
    }

    /// Amount a release at `now` would pay out (zero for inactive streams)
    ///
    /// # Errors
    ///
    /// `StreamNotFound` if the handle is unknown
    pub fn calculate_releasable(&self, id: &StreamId, now: Timestamp) -> Result<Amount, StreamError> {
        let stream = self.stream(id)?;
        Ok(Self::live_releasable(&stream, now))
    }

    fn live_releasable(stream: &Stream, now: Timestamp) -> Amount {
        if stream.is_active() {
            calculator::releasable(stream, now)
        } else {
            0
        }
    }

    /// Snapshot of a stream with its live releasable amount
    ///
    /// # Errors
    ///
    /// `StreamNotFound` if the handle is unknown
    pub fn stream_info(&self, id: &StreamId, now: Timestamp) -> Result<StreamInfo, StreamError> {
        let stream = self.stream(id)?;
        let releasable = Self::live_releasable(&stream, now);
        Ok(StreamInfo { stream, releasable })
    }

    /// Last committed state of a stream
    ///
    /// A release or cancellation whose payment is still running is not
    /// visible until it settles.
    ///
    /// # Errors
    ///
    /// `StreamNotFound` if the handle is unknown
    pub fn stream(&self, id: &StreamId) -> Result<Stream, StreamError> {
        self.in_flight.committed(*id, || self.store.get(id))
    }

    /// Committed snapshot of every stream, ordered by handle
    pub fn streams(&self) -> Vec<Stream> {
        self.store
            .all()
            .into_iter()
            .filter_map(|stream| self.stream(&stream.id).ok())
            .collect()
    }

    pub fn user_stats(&self, principal: &Principal) -> UserStats {
        self.store.user_stats(principal)
    }

    pub fn global_stats(&self) -> GlobalStats {
        self.store.global_stats()
    }

    /// Value committed and not yet paid out
    pub fn custody_balance(&self) -> Amount {
        *self.custody()
    }

    pub fn fee_recipient(&self) -> Principal {
        self.fee_recipient
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_admin(&self, principal: &Principal) -> bool {
        self.roles.is_admin(principal)
    }

    pub fn payer(&self) -> &P {
        &self.payer
    }

    /// Take every notification emitted since the last call
    pub fn drain_events(&self) -> Vec<StreamEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Redirect protocol fees to `recipient` (owner only)
    pub fn set_fee_recipient(&self, ctx: &CallContext, recipient: Principal) -> Result<(), StreamError> {
        self.roles.require_owner(&ctx.caller, "set fee recipient")?;
        if !recipient.is_valid() {
            return Err(StreamError::invalid_principal(
                "fee recipient",
                &recipient,
                "empty principal",
            ));
        }

        tracing::info!(%recipient, "fee recipient updated");
        *self
            .fee_recipient
            .write()
            .unwrap_or_else(PoisonError::into_inner) = recipient;
        Ok(())
    }

    /// Grant the administrator role (owner only)
    pub fn grant_admin(&self, ctx: &CallContext, principal: Principal) -> Result<bool, StreamError> {
        self.roles.require_owner(&ctx.caller, "grant admin")?;
        tracing::info!(%principal, "admin granted");
        self.roles.grant(principal)
    }

    /// Revoke the administrator role (owner only)
    pub fn revoke_admin(&self, ctx: &CallContext, principal: &Principal) -> Result<bool, StreamError> {
        self.roles.require_owner(&ctx.caller, "revoke admin")?;
        tracing::info!(%principal, "admin revoked");
        self.roles.revoke(principal)
    }

    /// Pay the whole custody balance to the owner (owner only)
    ///
    /// Streams are left untouched; releases that later exceed the remaining
    /// custody fail with `TransferFailed`.
    ///
    /// # Returns
    ///
    /// The amount swept
    pub fn emergency_withdraw(&self, ctx: &CallContext) -> Result<Amount, StreamError> {
        self.roles.require_owner(&ctx.caller, "emergency withdraw")?;

        let amount = *self.custody();
        let transfers = if amount > 0 {
            vec![Transfer::new(self.roles.owner().clone(), amount)]
        } else {
            Vec::new()
        };
        self.pay_from_custody(amount, &transfers)?;

        tracing::warn!(amount, owner = %self.roles.owner(), "custody swept by emergency withdraw");
        Ok(amount)
    }
}
