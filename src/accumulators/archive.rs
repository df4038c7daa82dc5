use crate::record::Record;

/// Collects every record of an invocation, in arrival order, for the archive.
///
/// Unbounded, and never flushed on a threshold: the whole collection is taken
/// once at the end of the invocation.
#[derive(Debug, Default)]
pub struct ArchiveAccumulator {
    records: Vec<Record>,
}

impl ArchiveAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns everything collected so far and resets to empty.
    pub fn take_all(&mut self) -> Vec<Record> {
        std::mem::take(&mut self.records)
    }
}
