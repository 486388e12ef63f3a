//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `stream`: the Stream record, its handle, status and tag
//! - `principal`: party identifiers and aggregate counters
//! - `event`: notifications for external observers
//! - `command`: replay ledger commands
//! - `error`: Error types for the engine and replay

pub mod command;
pub mod error;
pub mod event;
pub mod principal;
pub mod stream;

pub use command::{Command, CommandRecord, StreamRef};
pub use error::{ErrorKind, ReplayError, StreamError};
pub use event::StreamEvent;
pub use principal::{GlobalStats, Principal, UserStats};
pub use stream::{Amount, Stream, StreamId, StreamInfo, StreamStatus, StreamType, Timestamp};
