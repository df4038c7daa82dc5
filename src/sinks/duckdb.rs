use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU8, Ordering},
    },
    time::Duration,
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use duckdb::{Connection, Transaction, params_from_iter, types::Value};
use pg_escape::quote_identifier;
use tracing::debug;

use crate::{
    accumulators::Batch,
    record::{RECORD_COLUMNS, Record},
    sinks::{
        data_sink::{Ack, TransactionalSink},
        error::SinkError,
    },
    utils::filesystem::ensure_parent_dir_exists,
};

/// Rows per INSERT statement. A batch larger than this is split into several
/// statements inside the same transaction.
pub const INSERT_CHUNK_ROWS: usize = 1000;

const GATE_OPEN: u8 = 0;
const GATE_ABANDONED: u8 = 1;
const GATE_COMMITTING: u8 = 2;

/// Settles exactly once whether an in-flight batch commits or is abandoned.
///
/// Once the commit has begun the batch can no longer be abandoned, and once
/// abandoned it can no longer commit.
#[derive(Default)]
struct CommitGate(AtomicU8);

impl CommitGate {
    fn abandon(&self) -> bool {
        self.0
            .compare_exchange(GATE_OPEN, GATE_ABANDONED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn begin_commit(&self) -> bool {
        self.0
            .compare_exchange(GATE_OPEN, GATE_COMMITTING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn is_abandoned(&self) -> bool {
        self.0.load(Ordering::Acquire) == GATE_ABANDONED
    }
}

/// Abandons the batch if the write future is dropped before it settles.
struct AbandonOnDrop(Arc<CommitGate>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.0.abandon();
    }
}

enum BatchOutcome {
    Committed,
    RolledBack,
}

struct DuckDbSinkInner {
    path: PathBuf,
    table_name: String,
    rows_written: u64,
    conn: Option<Connection>,
}

/// Transactional sink backed by a DuckDB database file.
///
/// Record values are always bound as statement parameters; only the quoted
/// table identifier is part of the statement text.
pub struct DuckDbSink {
    inner: Arc<Mutex<DuckDbSinkInner>>,
}

impl DuckDbSink {
    pub fn new(path: PathBuf, table_name: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DuckDbSinkInner {
                path,
                table_name,
                rows_written: 0,
                conn: None,
            })),
        }
    }

    #[cfg(test)]
    fn rows_written(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .rows_written
    }

    fn describe(&self) -> String {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        format!(
            "duckdb table {} in {}",
            inner.table_name,
            inner.path.display()
        )
    }
}

fn create_table_sql(table_name: &str) -> String {
    let [sensor_id, temperature, humidity, timestamp] = RECORD_COLUMNS.map(quote_identifier);
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({} BIGINT NOT NULL, {} DOUBLE NOT NULL, {} DOUBLE NOT NULL, {} BIGINT NOT NULL)",
        quote_identifier(table_name),
        sensor_id,
        temperature,
        humidity,
        timestamp
    )
}

/// Multi-row INSERT with one `?` placeholder per value.
fn insert_sql(table_name: &str, rows: usize) -> String {
    let columns = RECORD_COLUMNS
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let row = format!("({})", vec!["?"; RECORD_COLUMNS.len()].join(", "));
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_identifier(table_name),
        columns,
        vec![row.as_str(); rows].join(", ")
    )
}

fn insert_chunk(tx: &Transaction<'_>, table_name: &str, chunk: &[Record]) -> Result<usize> {
    let params = chunk.iter().flat_map(|r| {
        [
            Value::BigInt(r.sensor_id),
            Value::Double(r.temperature),
            Value::Double(r.humidity),
            Value::BigInt(r.timestamp),
        ]
    });
    let inserted = tx.execute(&insert_sql(table_name, chunk.len()), params_from_iter(params))?;
    Ok(inserted)
}

fn open(path: &Path, table_name: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute(&create_table_sql(table_name), [])?;
    Ok(conn)
}

#[async_trait]
impl TransactionalSink for DuckDbSink {
    async fn connect(&mut self) -> Result<(), SinkError> {
        let sink = self.describe();
        let path = self.inner.lock().unwrap_or_else(|e| e.into_inner()).path.clone();
        ensure_parent_dir_exists(&path)
            .await
            .map_err(|e| SinkError::connection(&sink, format!("{e:#}")))?;

        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
            if inner.conn.is_none() {
                let conn = open(&inner.path, &inner.table_name)?;
                inner.conn = Some(conn);
            }
            Ok(())
        })
        .await
        .map_err(|e| SinkError::connection(&sink, format!("connect task panicked: {e}")))?
        .map_err(|e| SinkError::connection(&sink, format!("{e:#}")))
    }

    async fn write(&mut self, batch: Batch, timeout: Duration) -> Result<Ack, SinkError> {
        let records = batch.len();
        let inner = Arc::clone(&self.inner);
        let gate = Arc::new(CommitGate::default());
        let _abandon_on_drop = AbandonOnDrop(Arc::clone(&gate));
        let task_gate = Arc::clone(&gate);

        let mut task = tokio::task::spawn_blocking(move || -> Result<BatchOutcome> {
            let mut guard = inner.lock().unwrap_or_else(|e| e.into_inner());
            let inner = &mut *guard;
            let conn = inner
                .conn
                .as_mut()
                .ok_or_else(|| anyhow!("connection not open"))?;

            // dropping the transaction without commit rolls the whole batch back
            let tx = conn.transaction()?;
            for chunk in batch.records().chunks(INSERT_CHUNK_ROWS) {
                if task_gate.is_abandoned() {
                    return Ok(BatchOutcome::RolledBack);
                }
                insert_chunk(&tx, &inner.table_name, chunk)?;
            }
            if !task_gate.begin_commit() {
                return Ok(BatchOutcome::RolledBack);
            }
            tx.commit()?;

            inner.rows_written += records as u64;
            Ok(BatchOutcome::Committed)
        });

        let joined = match tokio::time::timeout(timeout, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                // a commit already under way is allowed to finish and its result stands
                if gate.abandon() {
                    debug!(rows = records, "batch deadline passed, rolling back");
                }
                task.await
            }
        };
        let outcome = joined
            .map_err(|e| SinkError::write(records, format!("insert task panicked: {e}")))?
            .map_err(|e| SinkError::write(records, format!("{e:#}")))?;

        match outcome {
            BatchOutcome::Committed => {
                debug!(rows = records, "duckdb batch committed");
                Ok(Ack { rows: records })
            }
            BatchOutcome::RolledBack => Err(SinkError::write(
                records,
                format!("timed out after {timeout:?}, batch rolled back"),
            )),
        }
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        let sink = self.describe();
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || -> Result<()> {
            let (conn, rows_written) = {
                let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
                (inner.conn.take(), inner.rows_written)
            };
            if let Some(conn) = conn {
                conn.close()
                    .map_err(|e| anyhow!("Failed to close connection: {:?}", e.1))?;
                debug!(rows_written, "duckdb connection closed");
            }
            Ok(())
        })
        .await
        .map_err(|e| SinkError::connection(&sink, format!("close task panicked: {e}")))?
        .map_err(|e| SinkError::connection(&sink, format!("{e:#}")))
    }
}
