use std::num::NonZeroUsize;

use crate::record::Record;

/// Upper bound on the buffer capacity reserved up front, so a very large
/// configured batch size does not allocate before records arrive.
const MAX_PREALLOCATED_RECORDS: usize = 4096;

/// An ordered, non-empty group of records flushed together.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    records: Vec<Record>,
}

impl Batch {
    fn new(records: Vec<Record>) -> Option<Self> {
        if records.is_empty() {
            None
        } else {
            Some(Self { records })
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Buffers records and emits a [`Batch`] each time `batch_size` are held.
///
/// The accumulator is either filling (fewer than `batch_size` records
/// buffered) or hands back a full batch from the `push` that filled it and
/// starts over empty. Nothing is ever emitted by polling.
#[derive(Debug)]
pub struct BatchAccumulator {
    batch_size: NonZeroUsize,
    buffer: Vec<Record>,
}

impl BatchAccumulator {
    pub fn new(batch_size: NonZeroUsize) -> Self {
        Self {
            batch_size,
            buffer: Self::fresh_buffer(batch_size),
        }
    }

    /// Number of records currently held back waiting for a full batch.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Appends `record`, returning the completed batch if this push filled it.
    pub fn push(&mut self, record: Record) -> Option<Batch> {
        self.buffer.push(record);
        if self.buffer.len() >= self.batch_size.get() {
            self.take_buffer()
        } else {
            None
        }
    }

    /// Returns whatever is buffered as a final, possibly partial, batch.
    ///
    /// Returns `None` when nothing is buffered.
    pub fn drain(&mut self) -> Option<Batch> {
        self.take_buffer()
    }

    fn take_buffer(&mut self) -> Option<Batch> {
        if self.buffer.is_empty() {
            return None;
        }
        let fresh = Self::fresh_buffer(self.batch_size);
        Batch::new(std::mem::replace(&mut self.buffer, fresh))
    }

    fn fresh_buffer(batch_size: NonZeroUsize) -> Vec<Record> {
        Vec::with_capacity(batch_size.get().min(MAX_PREALLOCATED_RECORDS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_helpers::test_data;
    use proptest::prelude::*;

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_push_emits_full_batch_and_resets() {
        let records = test_data::readings(7);
        let mut acc = BatchAccumulator::new(size(3));

        let emitted: Vec<Batch> = records.iter().filter_map(|r| acc.push(*r)).collect();

        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].records(), &records[0..3]);
        assert_eq!(emitted[1].records(), &records[3..6]);
        assert_eq!(acc.buffered(), 1);

        let trailing = acc.drain().unwrap();
        assert_eq!(trailing.records(), &records[6..7]);
        assert_eq!(acc.buffered(), 0);
        assert!(acc.drain().is_none());
    }

    #[test]
    fn test_batch_size_one_emits_on_every_push() {
        let mut acc = BatchAccumulator::new(size(1));
        for record in test_data::readings(4) {
            let batch = acc.push(record).unwrap();
            assert_eq!(batch.records(), &[record]);
        }
        assert!(acc.drain().is_none());
    }

    #[test]
    fn test_drain_on_empty_yields_nothing() {
        let mut acc = BatchAccumulator::new(size(5));
        assert!(acc.drain().is_none());
        assert!(acc.drain().is_none());
    }

    #[test]
    fn test_exact_multiple_leaves_nothing_to_drain() {
        let mut acc = BatchAccumulator::new(size(2));
        let emitted = test_data::readings(6)
            .into_iter()
            .filter_map(|r| acc.push(r))
            .count();
        assert_eq!(emitted, 3);
        assert!(acc.drain().is_none());
    }

    #[test]
    fn test_huge_batch_size_does_not_preallocate() {
        let mut acc = BatchAccumulator::new(size(usize::MAX));
        assert!(acc.buffer.capacity() <= MAX_PREALLOCATED_RECORDS);
        assert!(acc.push(test_data::reading(0)).is_none());
        assert_eq!(acc.drain().unwrap().len(), 1);
    }

    proptest! {
        #[test]
        fn prop_batch_counts_follow_division(n in 1usize..20, m in 0usize..200) {
            let mut acc = BatchAccumulator::new(size(n));
            let mut full = Vec::new();
            for record in test_data::readings(m) {
                if let Some(batch) = acc.push(record) {
                    full.push(batch);
                }
            }
            let trailing = acc.drain();

            prop_assert_eq!(full.len(), m / n);
            prop_assert!(full.iter().all(|b| b.len() == n));
            prop_assert_eq!(trailing.map(|b| b.len()).unwrap_or(0), m % n);
        }

        #[test]
        fn prop_concatenated_batches_reproduce_input(n in 1usize..20, m in 0usize..200) {
            let records = test_data::readings(m);
            let mut acc = BatchAccumulator::new(size(n));
            let mut batches: Vec<Batch> = records.iter().filter_map(|r| acc.push(*r)).collect();
            batches.extend(acc.drain());

            let flattened: Vec<Record> = batches.into_iter().flat_map(Batch::into_records).collect();
            prop_assert_eq!(flattened, records);
        }
    }
}
