//! Per-invocation record sequencing.
//!
//! Both accumulators are pure: they know nothing about sinks and are owned by
//! exactly one invocation.

mod archive;
mod batch;

pub use archive::ArchiveAccumulator;
pub use batch::{Batch, BatchAccumulator};
