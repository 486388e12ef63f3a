//! Asynchronous batch replay strategy
//!
//! This module provides a multi-threaded implementation of the
//! ProcessingStrategy trait. The ledger is read in batches, and each batch is
//! replayed with reference-based partitioning on a tokio runtime.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     └── BatchProcessor (barrier segmentation + reference partitioning)
//!         └── CommandProcessor
//!             └── Arc<StreamEngine<LedgerPayer>>
//! ```
//!
//! # Ordering
//!
//! - Batches are replayed one after another
//! - Within a batch, batch releases and administrative commands are barriers
//! - Between barriers, each stream reference replays on its own task, in order

use crate::core::{BatchProcessor, CommandProcessor, EngineSettings};
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_streams_csv;
use crate::strategy::{ProcessingStrategy, ReplayReport};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Configuration for batch replay
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of records per batch
    pub batch_size: usize,
    /// Number of runtime worker threads
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig, replacing zero values by their defaults
    ///
    /// # Arguments
    ///
    /// * `batch_size` - Records per batch
    /// * `max_concurrent_batches` - Runtime worker threads
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            tracing::warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            tracing::warn!(
                max_concurrent_batches,
                default = default.max_concurrent_batches,
                "invalid max_concurrent_batches, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Batched, reference-partitioned concurrent replay
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    settings: EngineSettings,
    config: BatchConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(settings: EngineSettings, config: BatchConfig) -> Self {
        Self { settings, config }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<ReplayReport, String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        let (processor, records, rejected) = runtime.block_on(async {
            let processor = CommandProcessor::new(Arc::new(self.settings.build_engine()));
            let batch_processor = BatchProcessor::new(processor.clone());

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| format!("Failed to open file '{}': {}", input_path.display(), e))?;

            // csv-async reads through the futures AsyncRead traits
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut records = 0;
            let mut rejected = 0;
            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                // Finish the batch before reading the next, so a reference
                // spanning batches keeps its order
                for result in batch_processor.process_batch(batch).await {
                    records += 1;
                    if let Err(e) = result.result {
                        rejected += 1;
                        tracing::warn!(
                            command = result.record.command.name(),
                            time = result.record.time,
                            error = %e,
                            "command rejected"
                        );
                    }
                }
            }

            Ok::<_, String>((processor, records, rejected))
        })?;

        let report = ReplayReport::collect(&processor, records, rejected);
        write_streams_csv(&report.streams, output)?;
        tracing::info!(records, rejected, streams = report.streams.len(), "async replay finished");

        Ok(report)
    }
}
