use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::Result;
use parquet::{arrow::ArrowWriter, file::properties::WriterProperties};
use tracing::debug;
use uuid::Uuid;

use crate::{
    ParquetCompression,
    record::{Record, records_to_batch},
    sinks::{
        data_sink::{ObjectLocation, ObjectStore},
        error::SinkError,
    },
};

pub const DEFAULT_MAX_ROW_GROUP_SIZE: usize = 1_048_576;

/// Writes the archive collection of one invocation as a single Parquet object.
pub struct ArchiveSinkWriter {
    store: Arc<dyn ObjectStore>,
    compression: ParquetCompression,
}

impl ArchiveSinkWriter {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            compression: ParquetCompression::default(),
        }
    }

    pub fn with_compression(mut self, compression: ParquetCompression) -> Self {
        self.compression = compression;
        self
    }

    pub async fn connect(&self) -> Result<(), SinkError> {
        self.store
            .connect()
            .await
            .map_err(|e| SinkError::connection("archive object store", format!("{e:#}")))
    }

    /// Serializes `records` and stores them under a name derived from
    /// `destination_hint` and `invocation_id`.
    ///
    /// Returns `Ok(None)` without touching the store when `records` is empty.
    pub async fn write(
        &self,
        records: Vec<Record>,
        destination_hint: &str,
        invocation_id: &Uuid,
    ) -> Result<Option<ObjectLocation>, SinkError> {
        if records.is_empty() {
            return Ok(None);
        }
        let count = records.len();
        let compression = self.compression;

        let bytes = tokio::task::spawn_blocking(move || encode_parquet(&records, compression))
            .await
            .map_err(|e| SinkError::write(count, format!("parquet encoding panicked: {e}")))?
            .map_err(|e| SinkError::write(count, format!("{e:#}")))?;

        let name = archive_object_name(destination_hint, invocation_id);
        debug!(object = %name, bytes = bytes.len(), records = count, "storing archive");
        let location = self
            .store
            .put(&name, bytes)
            .await
            .map_err(|e| SinkError::write(count, format!("{e:#}")))?;
        Ok(Some(location))
    }
}

/// Encodes `records` into a self-contained Parquet file held in memory.
pub fn encode_parquet(records: &[Record], compression: ParquetCompression) -> Result<Vec<u8>> {
    let batch = records_to_batch(records)?;
    let props = WriterProperties::builder()
        .set_compression(compression.into())
        .set_max_row_group_size(DEFAULT_MAX_ROW_GROUP_SIZE)
        .build();

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(buffer)
}

/// `{prefix}-{unix nanos}-{invocation id}.parquet`. Sorts in write order.
pub fn archive_object_name(prefix: &str, invocation_id: &Uuid) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("{prefix}-{nanos:020}-{}.parquet", invocation_id.simple())
}
