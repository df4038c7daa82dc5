//! Per-invocation orchestration: decode, batch, flush, archive.

mod config;
mod outcome;

pub use config::{
    ConfigError, DEFAULT_ARCHIVE_PREFIX, DEFAULT_BATCH_SIZE, DEFAULT_SINK_TIMEOUT, PipelineConfig,
};
pub use outcome::{
    ArchiveOutcome, DecodeFailure, InvocationResult, InvocationStatus, SinkFailure, SinkKind,
};

use std::{
    future::Future,
    time::{Duration, Instant},
};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    accumulators::{ArchiveAccumulator, Batch, BatchAccumulator},
    decoder::RecordDecoder,
    record::Record,
    sinks::{ArchiveSinkWriter, SinkError, TransactionalSink},
};
use outcome::InvocationTally;

/// Runs invocations against one pair of injected sinks.
///
/// Each call to [`PipelineDriver::run`] is one invocation with its own
/// accumulators. Envelopes are handled strictly in order and at most one sink
/// write is in flight at a time.
pub struct PipelineDriver {
    config: PipelineConfig,
    decoder: RecordDecoder,
    transactional: Box<dyn TransactionalSink>,
    archive: ArchiveSinkWriter,
    cancel: CancellationToken,
}

impl PipelineDriver {
    pub fn new(
        config: PipelineConfig,
        decoder: RecordDecoder,
        transactional: Box<dyn TransactionalSink>,
        archive: ArchiveSinkWriter,
    ) -> Self {
        Self {
            config,
            decoder,
            transactional,
            archive,
            cancel: CancellationToken::new(),
        }
    }

    /// Aborts the invocation at the next envelope boundary once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run<I>(&mut self, envelopes: I) -> InvocationResult
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let invocation_id = Uuid::new_v4();
        let started = Instant::now();
        let mut tally = InvocationTally::new(invocation_id);
        info!(
            invocation = %invocation_id,
            batch_size = self.config.batch_size().get(),
            "invocation started"
        );

        if let Err((sink, err)) = self.connect().await {
            error!(invocation = %invocation_id, error = %err, "sink unreachable, aborting invocation");
            self.close_transactional(&invocation_id).await;
            return tally.connection_failed(sink, &err);
        }

        let mut batches = BatchAccumulator::new(self.config.batch_size());
        let mut archive = ArchiveAccumulator::new();
        let mut transactional_down: Option<String> = None;

        for (position, envelope) in envelopes.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                self.close_transactional(&invocation_id).await;
                return cancelled(tally, batches.buffered(), archive.len());
            }

            tally.envelopes_received += 1;
            let record = match self.decoder.decode(envelope.as_ref()) {
                Ok(record) => record,
                Err(err) => {
                    warn!(invocation = %invocation_id, position, error = %err, "skipping undecodable envelope");
                    tally.decode_failures.push(DecodeFailure {
                        position,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            tally.records_processed += 1;

            let completed = batches.push(record);
            archive.push(record);
            if let Some(batch) = completed {
                self.flush_batch(batch, &mut tally, &mut transactional_down)
                    .await;
            }
        }

        if self.cancel.is_cancelled() {
            self.close_transactional(&invocation_id).await;
            return cancelled(tally, batches.buffered(), archive.len());
        }
        if let Some(batch) = batches.drain() {
            self.flush_batch(batch, &mut tally, &mut transactional_down)
                .await;
        }
        self.close_transactional(&invocation_id).await;
        if self.cancel.is_cancelled() {
            return cancelled(tally, 0, archive.len());
        }

        let archive_outcome = self.flush_archive(archive.take_all(), &mut tally).await;
        let result = tally.finish(archive_outcome);

        info!(
            invocation = %invocation_id,
            status = %result.status,
            records = result.records_processed,
            batches_written = result.batches_written,
            batches_failed = result.batches_failed,
            decode_failures = result.decode_failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "invocation finished"
        );
        result
    }

    async fn connect(&mut self) -> Result<(), (SinkKind, SinkError)> {
        let timeout = self.config.sink_timeout();
        bounded(timeout, 0, self.transactional.connect())
            .await
            .map_err(|e| (SinkKind::Transactional, as_connection_error("transactional store", e)))?;
        bounded(timeout, 0, self.archive.connect())
            .await
            .map_err(|e| (SinkKind::Archive, as_connection_error("archive object store", e)))?;
        Ok(())
    }

    async fn flush_batch(
        &mut self,
        batch: Batch,
        tally: &mut InvocationTally,
        transactional_down: &mut Option<String>,
    ) {
        let records = batch.len();
        if let Some(reason) = transactional_down {
            let err = SinkError::write(records, format!("not attempted, {reason}"));
            tally.batches_failed += 1;
            tally
                .sink_failures
                .push(SinkFailure::from_error(SinkKind::Transactional, records, &err));
            return;
        }

        let timeout = self.config.sink_timeout();
        let write = self.transactional.write(batch, timeout);
        let result = match tokio::time::timeout(write_backstop(timeout), write).await {
            Ok(result) => result,
            // the batch may still land; nothing more is sent to this store
            Err(_) => Err(SinkError::connection(
                "transactional store",
                format!("write timed out after {timeout:?} and did not roll back"),
            )),
        };
        match result {
            Ok(ack) => {
                tally.batches_written += 1;
                tally.rows_committed += ack.rows;
                debug!(
                    invocation = %tally.invocation_id,
                    rows = ack.rows,
                    batch = tally.batches_written + tally.batches_failed,
                    "batch committed"
                );
            }
            Err(err) => {
                warn!(
                    invocation = %tally.invocation_id,
                    records,
                    error = %err,
                    "batch write failed, continuing with the next batch"
                );
                if err.is_connection() {
                    *transactional_down = Some(err.to_string());
                }
                tally.batches_failed += 1;
                tally
                    .sink_failures
                    .push(SinkFailure::from_error(SinkKind::Transactional, records, &err));
            }
        }
    }

    async fn flush_archive(
        &mut self,
        records: Vec<Record>,
        tally: &mut InvocationTally,
    ) -> ArchiveOutcome {
        if records.is_empty() {
            return ArchiveOutcome::Skipped;
        }
        let count = records.len();
        let timeout = self.config.sink_timeout();
        let write = self
            .archive
            .write(records, self.config.archive_prefix(), &tally.invocation_id);

        match bounded(timeout, count, write).await {
            Ok(Some(location)) => {
                info!(invocation = %tally.invocation_id, %location, records = count, "archive written");
                ArchiveOutcome::Written {
                    location,
                    records: count,
                }
            }
            Ok(None) => ArchiveOutcome::Skipped,
            Err(err) => {
                warn!(
                    invocation = %tally.invocation_id,
                    records = count,
                    error = %err,
                    "archive write failed; committed batches are not rolled back"
                );
                tally
                    .sink_failures
                    .push(SinkFailure::from_error(SinkKind::Archive, count, &err));
                ArchiveOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn close_transactional(&mut self, invocation_id: &Uuid) {
        let close = self.transactional.close();
        if let Err(err) = bounded(self.config.sink_timeout(), 0, close).await {
            warn!(invocation = %invocation_id, error = %err, "failed to close transactional sink");
        }
    }
}

/// Ends an invocation whose cancellation token fired. Committed batches stay
/// committed and no archive is written.
fn cancelled(
    mut tally: InvocationTally,
    records_unflushed: usize,
    records_not_archived: usize,
) -> InvocationResult {
    tally.records_unflushed = records_unflushed;
    warn!(
        invocation = %tally.invocation_id,
        batches_committed = tally.batches_written,
        records_unflushed,
        records_not_archived,
        "invocation cancelled: committed batches stay committed and no archive is written"
    );
    tally.cancelled()
}

/// How long a transactional write may run past its own deadline before the
/// store is treated as unresponsive.
fn write_backstop(timeout: Duration) -> Duration {
    timeout.saturating_mul(2)
}

/// Applies the sink timeout to one sink operation. Expiry is reported as a
/// write failure of `records` records.
async fn bounded<T, F>(
    timeout: Duration,
    records: usize,
    operation: F,
) -> Result<T, SinkError>
where
    F: Future<Output = Result<T, SinkError>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(SinkError::write(
            records,
            format!("timed out after {timeout:?}"),
        )),
    }
}

fn as_connection_error(sink: &str, err: SinkError) -> SinkError {
    match err {
        SinkError::Write { detail, .. } => SinkError::connection(sink, detail),
        connection => connection,
    }
}
