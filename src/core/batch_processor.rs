//! Batch replay with reference-based partitioning
//!
//! This module provides the `BatchProcessor` struct, which replays a batch of
//! ledger records concurrently while keeping every stream's commands in order.
//!
//! # Design
//!
//! A batch is first split into segments at barrier records. Barriers are the
//! records without a partition key (batch releases and administrative
//! commands): they may touch any stream or engine-wide state, so they run
//! alone, after everything before them and before everything after them.
//!
//! Within a segment, records are partitioned by stream reference. Each
//! partition runs sequentially on its own tokio task; partitions run in
//! parallel.
//!
//! # Architecture
//!
//! ```text
//! BatchProcessor
//!     └── CommandProcessor  (reference bindings + Arc<StreamEngine>)
//! ```

use std::collections::HashMap;

use crate::core::processor::CommandProcessor;
use crate::types::{CommandRecord, ReplayError, StreamRef};

/// Result of replaying a single record
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The record that was replayed
    pub record: CommandRecord,

    /// The result of replaying it
    pub result: Result<(), ReplayError>,
}

/// A run of records between barriers, or a single barrier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Records that each touch one stream reference
    Partitioned(Vec<CommandRecord>),
    /// A record that must run alone
    Barrier(CommandRecord),
}

/// Concurrent batch replay with per-reference ordering
#[derive(Clone)]
pub struct BatchProcessor {
    /// Shared command dispatcher
    processor: CommandProcessor,
}

impl BatchProcessor {
    pub fn new(processor: CommandProcessor) -> Self {
        Self { processor }
    }

    pub fn processor(&self) -> &CommandProcessor {
        &self.processor
    }

    /// Split a batch at barrier records, preserving order
    pub fn segment(batch: Vec<CommandRecord>) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut current = Vec::new();

        for record in batch {
            if record.partition_key().is_some() {
                current.push(record);
            } else {
                if !current.is_empty() {
                    segments.push(Segment::Partitioned(std::mem::take(&mut current)));
                }
                segments.push(Segment::Barrier(record));
            }
        }
        if !current.is_empty() {
            segments.push(Segment::Partitioned(current));
        }

        segments
    }

    /// Group records by stream reference, preserving order within each group
    ///
    /// Records without a partition key share one group keyed by the empty string.
    pub fn partition_by_reference(
        records: Vec<CommandRecord>,
    ) -> HashMap<StreamRef, Vec<CommandRecord>> {
        let mut partitions: HashMap<StreamRef, Vec<CommandRecord>> = HashMap::new();

        for record in records {
            let key = record.partition_key().unwrap_or_default().to_string();
            partitions.entry(key).or_default().push(record);
        }

        partitions
    }

    /// Replay one partition's records in order
    pub async fn process_partition(&self, records: Vec<CommandRecord>) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(records.len());

        for record in records {
            let result = self.processor.process(record.clone());
            results.push(ProcessingResult { record, result });
        }

        results
    }

    /// Replay a batch
    ///
    /// Segments run one after another. Within a partitioned segment every
    /// reference gets its own task. Results are returned per segment in
    /// completion order, so they are not guaranteed to follow the input order.
    pub async fn process_batch(&self, batch: Vec<CommandRecord>) -> Vec<ProcessingResult> {
        let mut results = Vec::new();

        for segment in Self::segment(batch) {
            match segment {
                Segment::Barrier(record) => {
                    let result = self.processor.process(record.clone());
                    results.push(ProcessingResult { record, result });
                }
                Segment::Partitioned(records) => {
                    let mut tasks = Vec::new();
                    for (_reference, records) in Self::partition_by_reference(records) {
                        let processor = self.clone();
                        tasks.push(tokio::spawn(async move {
                            processor.process_partition(records).await
                        }));
                    }

                    for task in tasks {
                        match task.await {
                            Ok(partition_results) => results.extend(partition_results),
                            Err(e) => tracing::error!(error = %e, "replay task panicked"),
                        }
                    }
                }
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::processor::EngineSettings;
    use crate::types::{Command, Principal, StreamStatus};
    use std::sync::Arc;

    fn batch_processor() -> BatchProcessor {
        let engine = Arc::new(EngineSettings::default().build_engine());
        BatchProcessor::new(CommandProcessor::new(engine))
    }

    fn record(caller: &str, time: u64, command: Command) -> CommandRecord {
        CommandRecord {
            caller: Principal::new(caller),
            time,
            command,
        }
    }

    fn create(reference: &str) -> CommandRecord {
        record(
            "alice",
            0,
            Command::Create {
                reference: reference.to_string(),
                payee: Principal::new("bob"),
                duration: 3_600,
                stream_type: 1,
                amount: 1_000,
            },
        )
    }

    fn release(reference: &str, time: u64) -> CommandRecord {
        record(
            "bob",
            time,
            Command::Release {
                reference: reference.to_string(),
            },
        )
    }

    #[test]
    fn test_segment_splits_at_barriers() {
        let batch = vec![
            create("a"),
            create("b"),
            record("owner", 0, Command::EmergencyWithdraw),
            release("a", 10),
        ];

        let segments = BatchProcessor::segment(batch);

        assert_eq!(segments.len(), 3);
        assert!(matches!(&segments[0], Segment::Partitioned(records) if records.len() == 2));
        assert!(matches!(&segments[1], Segment::Barrier(_)));
        assert!(matches!(&segments[2], Segment::Partitioned(records) if records.len() == 1));
    }

    #[test]
    fn test_segment_empty_batch() {
        assert!(BatchProcessor::segment(vec![]).is_empty());
    }

    #[test]
    fn test_partition_by_reference_keeps_order() {
        let records = vec![
            create("a"),
            create("b"),
            release("a", 10),
            release("b", 20),
            release("a", 30),
        ];

        let partitions = BatchProcessor::partition_by_reference(records);

        assert_eq!(partitions.len(), 2);
        let a: Vec<u64> = partitions["a"].iter().map(|r| r.time).collect();
        assert_eq!(a, vec![0, 10, 30]);
        assert_eq!(partitions["b"].len(), 2);
    }

    #[tokio::test]
    async fn test_process_batch_runs_every_record() {
        let processor = batch_processor();
        let batch = vec![
            create("a"),
            create("b"),
            release("a", 1_800),
            release("b", 3_600),
            release("missing", 10),
        ];

        let results = processor.process_batch(batch).await;

        assert_eq!(results.len(), 5);
        assert_eq!(results.iter().filter(|r| r.result.is_err()).count(), 1);

        let rows = processor.processor().stream_rows();
        assert_eq!(rows[0].1.released_amount, 500);
        assert_eq!(rows[1].1.status, StreamStatus::Completed);
    }

    #[tokio::test]
    async fn test_barrier_sees_earlier_segment() {
        let processor = batch_processor();
        let batch = vec![
            create("a"),
            create("b"),
            record(
                "keeper",
                3_600,
                Command::BatchRelease {
                    references: vec!["a".to_string(), "b".to_string()],
                },
            ),
        ];

        processor.process_batch(batch).await;

        for (_, stream) in processor.processor().stream_rows() {
            assert_eq!(stream.status, StreamStatus::Completed);
        }
    }
}
