pub mod archive;
pub mod data_sink;
pub mod duckdb;
pub mod error;
pub mod object_store;

pub use archive::ArchiveSinkWriter;
pub use data_sink::{Ack, ObjectLocation, ObjectStore, TransactionalSink};
pub use error::SinkError;
