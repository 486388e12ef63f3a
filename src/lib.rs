//! Rust Payment Streams Library
//! # Overview
//!
//! This library implements a payment streaming engine: a payer commits a sum
//! that becomes claimable by a payee linearly over a time window. Anyone can
//! trigger a release of the accrued part; a protocol fee is skimmed from every
//! release; the payer or an administrator can cancel early, refunding the
//! unearned share.
//!
//! The crate also ships a CSV ledger replayer with a sync and an async strategy.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (Stream, StreamId, Principal, events, errors)
//! - [`cli`] - CLI argument parsing and logging setup
//! - [`core`] - Business logic components:
//!   - [`core::calculator`] - Release, fee and proration arithmetic
//!   - [`core::engine`] - Create, release, batch release, cancel and admin operations
//!   - [`core::stream_store`] - Stream records and aggregate counters
//!   - [`core::processor`] - Command ledger dispatch
//! - [`io`] - Ledger parsing and CSV output
//! - [`strategy`] - Sync and async replay pipelines
//!
//! # Stream Lifecycle
//!
//! - **Active**: accruing; releases and cancellation allowed
//! - **Completed**: the full amount has been released
//! - **Cancelled**: terminated early; the payer got back the unearned share
//!
//! # Example
//!
//! ```
//! use rust_payment_streams::core::{CallContext, EngineConfig, LedgerPayer, StreamEngine};
//! use rust_payment_streams::types::Principal;
//!
//! let engine = StreamEngine::new(
//!     EngineConfig::default(),
//!     Principal::new("owner"),
//!     Principal::new("treasury"),
//!     LedgerPayer::new(),
//! );
//!
//! let id = engine
//!     .create_stream(&CallContext::new("alice", 0), Principal::new("bob"), 3_600, 1, 1_000)
//!     .unwrap();
//! let release = engine.release_funds(&CallContext::new("bob", 1_800), &id).unwrap();
//!
//! assert_eq!(release.amount, 500);
//! assert_eq!(release.fee, 12);
//! assert_eq!(engine.payer().balance(&Principal::new("bob")), 488);
//! ```

pub mod cli;
pub mod core;
pub mod io;
pub mod strategy;
pub mod types;

pub use core::{CallContext, EngineConfig, LedgerPayer, Payer, StreamEngine};
pub use io::{write_balances_csv, write_events_csv, write_streams_csv};
pub use types::{
    Amount, ErrorKind, Principal, Stream, StreamError, StreamEvent, StreamId, StreamStatus,
    Timestamp,
};
