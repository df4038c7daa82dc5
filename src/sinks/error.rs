use std::fmt::Display;

use thiserror::Error;

/// Failure of one sink operation.
///
/// A connection failure means the sink cannot be used at all for the rest of
/// the invocation. A write failure is scoped to the one batch or archive
/// object it names.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("{sink} unavailable: {detail}")]
    Connection { sink: String, detail: String },

    #[error("write of {records} record(s) failed: {detail}")]
    Write { records: usize, detail: String },
}

impl SinkError {
    pub fn connection(sink: impl Into<String>, detail: impl Display) -> Self {
        Self::Connection {
            sink: sink.into(),
            detail: detail.to_string(),
        }
    }

    pub fn write(records: usize, detail: impl Display) -> Self {
        Self::Write {
            records,
            detail: detail.to_string(),
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}
