//! Thread-safe stream storage
//!
//! This module provides the `StreamStore` struct, which owns every stream record
//! together with the aggregate counters maintained alongside them.
//!
//! # Design
//!
//! Streams live in a `DashMap` keyed by handle, giving fine-grained locking so
//! operations on unrelated streams never contend. Records are never removed:
//! a completed or cancelled stream stays in the map as history.
//!
//! # Guarantees
//!
//! - A handle maps to at most one stream for its whole lifetime
//! - Updates to an inactive stream are refused
//! - Aggregate counters change exactly once per successful creation or payout

use crate::types::{
    Amount, GlobalStats, Principal, Stream, StreamError, StreamId, UserStats,
};
use dashmap::DashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Owner of all stream records and aggregate counters
#[derive(Debug, Default)]
pub struct StreamStore {
    /// Stream records by handle
    streams: DashMap<StreamId, Stream>,

    /// Per-principal counters
    user_stats: DashMap<Principal, UserStats>,

    /// Engine-wide counters
    ///
    /// Also serialises insertions, so the collision check and the insert
    /// cannot interleave with another creation.
    global: Mutex<GlobalStats>,
}

impl StreamStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn global(&self) -> MutexGuard<'_, GlobalStats> {
        self.global.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a newly created stream
    ///
    /// Updates the global stream count and volume and the stream count of both
    /// parties. Nothing is written if the handle already exists or a counter
    /// would overflow.
    ///
    /// # Errors
    ///
    /// - `StreamCollision` if the handle is already taken
    /// - `ArithmeticOverflow` if the global volume or a count would overflow
    pub fn insert(&self, stream: Stream) -> Result<(), StreamError> {
        let mut global = self.global();

        if self.streams.contains_key(&stream.id) {
            return Err(StreamError::StreamCollision { stream: stream.id });
        }

        let stream_count = global
            .stream_count
            .checked_add(1)
            .ok_or_else(|| StreamError::arithmetic_overflow("global stream count"))?;
        let total_volume = global
            .total_volume
            .checked_add(stream.total_amount)
            .ok_or_else(|| StreamError::arithmetic_overflow("global volume"))?;

        for party in [&stream.payer, &stream.payee] {
            self.user_stats.entry(party.clone()).or_default().stream_count += 1;
        }
        global.stream_count = stream_count;
        global.total_volume = total_volume;
        self.streams.insert(stream.id, stream);

        Ok(())
    }

    /// Fail if one more stream of `amount` would overflow a global counter
    ///
    /// Lets creation reject an oversized stream before deriving its handle.
    /// `insert` checks again under the same lock.
    ///
    /// # Errors
    ///
    /// `ArithmeticOverflow` if the global volume or stream count would overflow
    pub fn check_capacity(&self, amount: Amount) -> Result<(), StreamError> {
        let global = self.global();
        global
            .stream_count
            .checked_add(1)
            .ok_or_else(|| StreamError::arithmetic_overflow("global stream count"))?;
        global
            .total_volume
            .checked_add(amount)
            .ok_or_else(|| StreamError::arithmetic_overflow("global volume"))?;
        Ok(())
    }

    /// Snapshot of a stream
    ///
    /// # Errors
    ///
    /// `StreamNotFound` if no stream has this handle
    pub fn get(&self, id: &StreamId) -> Result<Stream, StreamError> {
        self.streams
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StreamError::not_found(*id))
    }

    pub fn contains(&self, id: &StreamId) -> bool {
        self.streams.contains_key(id)
    }

    /// Apply a closure to an active stream while holding its entry lock
    ///
    /// The closure sees a consistent record and its changes are visible
    /// atomically. It must not call back into the store.
    ///
    /// # Errors
    ///
    /// - `StreamNotFound` if no stream has this handle
    /// - `StreamInactive` if the stream is completed or cancelled
    /// - any error returned by the closure, in which case it is responsible
    ///   for not having modified the record
    pub fn update<F, R>(&self, id: &StreamId, f: F) -> Result<R, StreamError>
    where
        F: FnOnce(&mut Stream) -> Result<R, StreamError>,
    {
        let mut entry = self
            .streams
            .get_mut(id)
            .ok_or_else(|| StreamError::not_found(*id))?;
        let stream = entry.value_mut();
        if !stream.is_active() {
            return Err(StreamError::inactive(*id, stream.status));
        }
        f(stream)
    }

    /// Put back a snapshot taken earlier in the same operation
    ///
    /// Only used to undo an operation's own mutation after its payment
    /// failed. The per-stream in-flight guard ensures nobody else changed the
    /// record in between.
    pub fn restore(&self, snapshot: Stream) {
        self.streams.insert(snapshot.id, snapshot);
    }

    /// Credit a completed payout to the payee's received total
    ///
    /// Called after funds have moved, so it saturates instead of failing.
    pub fn record_payout(&self, payee: &Principal, net: Amount) {
        let mut stats = self.user_stats.entry(payee.clone()).or_default();
        stats.total_received = stats.total_received.saturating_add(net);
    }

    /// Counters for one principal (zero if it has never taken part in a stream)
    pub fn user_stats(&self, principal: &Principal) -> UserStats {
        self.user_stats
            .get(principal)
            .map(|entry| *entry.value())
            .unwrap_or_default()
    }

    /// Engine-wide counters
    pub fn global_stats(&self) -> GlobalStats {
        *self.global()
    }

    /// Snapshot of every stream, ordered by handle
    pub fn all(&self) -> Vec<Stream> {
        let mut streams: Vec<Stream> = self
            .streams
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        streams.sort_by_key(|stream| stream.id);
        streams
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
