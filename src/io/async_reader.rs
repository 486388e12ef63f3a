//! Asynchronous CSV reader with batch interface
//!
//! Provides batch reading over command records from a ledger file, for the
//! async replay strategy.
//!
//! # Architecture
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of CommandRecords
//!                  ↓
//!           csv_format module
//!           (CsvRecord, convert_csv_record)
//! ```

use crate::io::csv_format::{convert_csv_record, CsvRecord};
use crate::types::CommandRecord;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;

/// Asynchronous CSV reader
///
/// Rows that fail to parse or convert are logged and skipped.
pub struct AsyncReader<R: AsyncRead + Unpin> {
    /// Underlying csv-async deserializer
    csv_reader: csv_async::AsyncDeserializer<R>,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self { csv_reader }
    }

    /// Read up to `batch_size` valid records
    ///
    /// # Returns
    ///
    /// The records read, in file order. An empty vector means end of file.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<CommandRecord> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<CsvRecord>();

        while batch.len() < batch_size {
            match records.next().await {
                Some(Ok(csv_record)) => match convert_csv_record(csv_record) {
                    Ok(record) => batch.push(record),
                    Err(e) => tracing::warn!(error = %e, "record conversion failed"),
                },
                Some(Err(e)) => tracing::warn!(error = %e, "CSV parse error"),
                None => break,
            }
        }

        batch
    }
}
