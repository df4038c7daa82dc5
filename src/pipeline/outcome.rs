use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::sinks::{ObjectLocation, SinkError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    /// Every envelope decoded and every sink write succeeded.
    Success,
    /// The invocation ran to the end but at least one unit failed.
    PartialFailure,
    /// Aborted mid-stream. Flushed batches stay committed; no archive.
    Cancelled,
    /// A sink could not be reached; nothing was written.
    Failed,
}

impl InvocationStatus {
    pub fn status_code(self) -> u16 {
        match self {
            Self::Success => 200,
            Self::PartialFailure => 207,
            Self::Cancelled => 499,
            Self::Failed => 500,
        }
    }
}

impl fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::PartialFailure => "partial_failure",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    Transactional,
    Archive,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecodeFailure {
    /// Zero-based index of the envelope in the invocation input.
    pub position: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SinkFailure {
    pub sink: SinkKind,
    pub records: usize,
    pub reason: String,
}

impl SinkFailure {
    pub fn from_error(sink: SinkKind, records: usize, err: &SinkError) -> Self {
        Self {
            sink,
            records,
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ArchiveOutcome {
    Written {
        location: ObjectLocation,
        records: usize,
    },
    /// Nothing decoded, so no object was created.
    Skipped,
    Failed {
        reason: String,
    },
    /// The invocation ended before the archive step.
    NotAttempted,
}

/// What one invocation did, returned to whoever triggered it.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationResult {
    pub invocation_id: Uuid,
    pub status: InvocationStatus,
    pub status_code: u16,
    pub summary: String,
    pub envelopes_received: usize,
    pub records_processed: usize,
    pub batches_written: usize,
    pub batches_failed: usize,
    pub rows_committed: usize,
    /// Records decoded but never flushed to the transactional sink because the
    /// invocation was cancelled.
    pub records_unflushed: usize,
    pub decode_failures: Vec<DecodeFailure>,
    pub sink_failures: Vec<SinkFailure>,
    pub archive: ArchiveOutcome,
}

impl InvocationResult {
    pub fn sink_failure_count(&self) -> usize {
        self.sink_failures.len()
    }
}

/// Running counts for an invocation in progress.
#[derive(Debug)]
pub(crate) struct InvocationTally {
    pub invocation_id: Uuid,
    pub envelopes_received: usize,
    pub records_processed: usize,
    pub batches_written: usize,
    pub batches_failed: usize,
    pub rows_committed: usize,
    pub records_unflushed: usize,
    pub decode_failures: Vec<DecodeFailure>,
    pub sink_failures: Vec<SinkFailure>,
}

impl InvocationTally {
    pub fn new(invocation_id: Uuid) -> Self {
        Self {
            invocation_id,
            envelopes_received: 0,
            records_processed: 0,
            batches_written: 0,
            batches_failed: 0,
            rows_committed: 0,
            records_unflushed: 0,
            decode_failures: Vec::new(),
            sink_failures: Vec::new(),
        }
    }

    /// Result for an invocation that never started because a sink was unreachable.
    pub fn connection_failed(self, sink: SinkKind, err: &SinkError) -> InvocationResult {
        let mut tally = self;
        tally.sink_failures.push(SinkFailure::from_error(sink, 0, err));
        let summary = format!("aborted before processing any envelope: {err}");
        tally.into_result(InvocationStatus::Failed, summary, ArchiveOutcome::NotAttempted)
    }

    pub fn cancelled(self) -> InvocationResult {
        let summary = format!(
            "cancelled after {} envelope(s): {} batch(es) committed ({} rows) remain committed, \
             {} record(s) never flushed, archive not written",
            self.envelopes_received,
            self.batches_written,
            self.rows_committed,
            self.records_unflushed
        );
        self.into_result(
            InvocationStatus::Cancelled,
            summary,
            ArchiveOutcome::NotAttempted,
        )
    }

    pub fn finish(self, archive: ArchiveOutcome) -> InvocationResult {
        let status = if self.decode_failures.is_empty() && self.sink_failures.is_empty() {
            InvocationStatus::Success
        } else {
            InvocationStatus::PartialFailure
        };

        let archive_text = match &archive {
            ArchiveOutcome::Written { location, records } => {
                format!("archived {records} record(s) to {location}")
            }
            ArchiveOutcome::Skipped => "nothing to archive".to_string(),
            ArchiveOutcome::Failed { reason } => format!("archive failed: {reason}"),
            ArchiveOutcome::NotAttempted => "archive not attempted".to_string(),
        };
        let summary = format!(
            "processed {} of {} envelope(s): {} batch(es) written ({} rows), {} batch(es) failed, \
             {} decode failure(s); {}",
            self.records_processed,
            self.envelopes_received,
            self.batches_written,
            self.rows_committed,
            self.batches_failed,
            self.decode_failures.len(),
            archive_text
        );
        self.into_result(status, summary, archive)
    }

    fn into_result(
        self,
        status: InvocationStatus,
        summary: String,
        archive: ArchiveOutcome,
    ) -> InvocationResult {
        InvocationResult {
            invocation_id: self.invocation_id,
            status,
            status_code: status.status_code(),
            summary,
            envelopes_received: self.envelopes_received,
            records_processed: self.records_processed,
            batches_written: self.batches_written,
            batches_failed: self.batches_failed,
            rows_committed: self.rows_committed,
            records_unflushed: self.records_unflushed,
            decode_failures: self.decode_failures,
            sink_failures: self.sink_failures,
            archive,
        }
    }
}
