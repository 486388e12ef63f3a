//! Core business logic module
//!
//! This module contains the stream engine and its components:
//! - `calculator` - Pure release, fee and proration arithmetic
//! - `id_generator` - Stream handle derivation
//! - `stream_store` - Stream records and aggregate counters
//! - `guard` - Per-stream in-flight markers
//! - `traits` - The outbound payment capability
//! - `ledger` - In-memory payment ledger
//! - `access` - Owner and administrator roles
//! - `config` - Engine bounds and fee rate
//! - `engine` - Stream operation orchestration
//! - `processor` - Command ledger dispatch
//! - `batch_processor` - Concurrent, reference-partitioned replay

pub mod access;
pub mod batch_processor;
pub mod calculator;
pub mod config;
pub mod engine;
pub mod guard;
pub mod id_generator;
pub mod ledger;
pub mod processor;
pub mod stream_store;
pub mod traits;

pub use access::RoleSet;
pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use config::EngineConfig;
pub use engine::{BatchRelease, CallContext, Cancellation, Release, StreamEngine};
pub use guard::{InFlightGuard, InFlightSet};
pub use id_generator::StreamIdGenerator;
pub use ledger::LedgerPayer;
pub use processor::{CommandProcessor, EngineSettings};
pub use stream_store::StreamStore;
pub use traits::{Payer, Transfer, TransferError};
