//! Replay strategies
//!
//! A strategy reads a command ledger, replays it against a fresh engine and
//! writes the final stream snapshots as CSV.
//!
//! - [`SyncProcessingStrategy`] replays records one at a time, in file order
//! - [`AsyncProcessingStrategy`] reads batches and replays independent streams
//!   concurrently on a tokio runtime
//!
//! Both strategies produce the same streams, balances and counters for the
//! same ledger. Only the order of emitted events and the stream handles may
//! differ, since handles depend on creation order.

use crate::cli::StrategyType;
use crate::core::{CommandProcessor, EngineSettings};
use crate::types::{Amount, GlobalStats, Principal, Stream, StreamEvent, StreamRef};
use std::io::Write;
use std::path::Path;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Final engine state after a replay
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Records read from the ledger
    pub records: usize,
    /// Records the engine or the processor rejected
    pub rejected: usize,
    /// Every created stream with its ledger reference, sorted by reference
    pub streams: Vec<(StreamRef, Stream)>,
    /// Ledger balance of every principal that was paid, sorted by principal
    pub balances: Vec<(Principal, Amount)>,
    /// Notifications emitted during the replay
    pub events: Vec<StreamEvent>,
    /// Value still held by the engine
    pub custody: Amount,
    /// Engine-wide counters
    pub global: GlobalStats,
}

impl ReplayReport {
    /// Collect the final state of a replay, draining the engine's events
    pub fn collect(processor: &CommandProcessor, records: usize, rejected: usize) -> Self {
        let engine = processor.engine();
        Self {
            records,
            rejected,
            streams: processor.stream_rows(),
            balances: engine.payer().balances(),
            events: engine.drain_events(),
            custody: engine.custody_balance(),
            global: engine.global_stats(),
        }
    }
}

/// Trait for ledger replay strategies
pub trait ProcessingStrategy: Send + Sync {
    /// Replay the ledger at `input_path` and write stream snapshots to `output`
    ///
    /// # Arguments
    ///
    /// * `input_path` - Path to the command ledger CSV
    /// * `output` - Writer receiving the streams CSV
    ///
    /// # Returns
    ///
    /// * `Ok(ReplayReport)` - Final engine state
    /// * `Err(String)` - The ledger could not be read or the output not written
    ///
    /// Rejected records are logged and counted; they do not stop the replay.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<ReplayReport, String>;
}

/// Create a processing strategy
///
/// # Arguments
///
/// * `strategy_type` - Which strategy to build
/// * `settings` - Engine configuration and roles for the replay
/// * `config` - Batch configuration (async only; defaults when `None`)
pub fn create_strategy(
    strategy_type: StrategyType,
    settings: EngineSettings,
    config: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(settings)),
        StrategyType::Async => {
            let config = config.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(settings, config))
        }
    }
}
