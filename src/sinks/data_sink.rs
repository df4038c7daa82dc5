use std::{fmt, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::{accumulators::Batch, sinks::error::SinkError};

/// Row store that accepts one all-or-nothing bulk insert per batch.
#[async_trait]
pub trait TransactionalSink: Send {
    /// Establishes the store connection. Called once, before any write.
    async fn connect(&mut self) -> Result<(), SinkError>;

    /// Inserts every record of `batch` or none of them.
    ///
    /// A sink that gives up after `timeout` returns only once the batch is
    /// known to be rolled back; a returned error never leaves rows behind.
    async fn write(&mut self, batch: Batch, timeout: Duration) -> Result<Ack, SinkError>;

    async fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Acknowledgement of a committed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub rows: usize,
}

/// Blob store holding one named object per archive write.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn connect(&self) -> Result<()>;

    /// Stores `bytes` under `name`. Must not replace an existing object.
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<ObjectLocation>;
}

/// Where a stored object can be found, e.g. `file:///var/archive/x.parquet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ObjectLocation(pub String);

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
