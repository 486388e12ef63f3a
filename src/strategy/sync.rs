//! Synchronous replay strategy
//!
//! Reads the ledger with [`SyncReader`] and replays every record in file
//! order on the calling thread.

use crate::core::{CommandProcessor, EngineSettings};
use crate::io::csv_format::write_streams_csv;
use crate::io::sync_reader::SyncReader;
use crate::strategy::{ProcessingStrategy, ReplayReport};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Single-threaded, in-order replay
#[derive(Debug, Clone, Default)]
pub struct SyncProcessingStrategy {
    settings: EngineSettings,
}

impl SyncProcessingStrategy {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<ReplayReport, String> {
        let processor = CommandProcessor::new(Arc::new(self.settings.build_engine()));
        let reader = SyncReader::new(input_path)?;

        let mut records = 0;
        let mut rejected = 0;
        for result in reader {
            match result {
                Ok(record) => {
                    records += 1;
                    let command = record.command.name();
                    let time = record.time;
                    if let Err(e) = processor.process(record) {
                        rejected += 1;
                        tracing::warn!(command, time, error = %e, "command rejected");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "skipping unreadable record"),
            }
        }

        let report = ReplayReport::collect(&processor, records, rejected);
        write_streams_csv(&report.streams, output)?;
        tracing::info!(records, rejected, streams = report.streams.len(), "sync replay finished");

        Ok(report)
    }
}
