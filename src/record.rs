use std::sync::Arc;

use arrow::{
    array::{Float64Array, Int64Array, RecordBatch},
    datatypes::{DataType, Field, Schema, SchemaRef},
    error::ArrowError,
};
use serde::Serialize;

/// Column names shared by the row store table and the archive schema, in order.
pub const RECORD_COLUMNS: [&str; 4] = ["sensor_id", "temperature", "humidity", "timestamp"];

/// One sensor reading.
///
/// `sensor_id` is not unique across time and nothing in a record orders it
/// relative to other records; order within an invocation is arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Record {
    pub sensor_id: i64,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity, percent.
    pub humidity: f64,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
}

pub fn record_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(RECORD_COLUMNS[0], DataType::Int64, false),
        Field::new(RECORD_COLUMNS[1], DataType::Float64, false),
        Field::new(RECORD_COLUMNS[2], DataType::Float64, false),
        Field::new(RECORD_COLUMNS[3], DataType::Int64, false),
    ]))
}

/// Builds a single Arrow batch holding `records` in order.
pub fn records_to_batch(records: &[Record]) -> Result<RecordBatch, ArrowError> {
    RecordBatch::try_new(
        record_schema(),
        vec![
            Arc::new(Int64Array::from_iter_values(
                records.iter().map(|r| r.sensor_id),
            )),
            Arc::new(Float64Array::from_iter_values(
                records.iter().map(|r| r.temperature),
            )),
            Arc::new(Float64Array::from_iter_values(
                records.iter().map(|r| r.humidity),
            )),
            Arc::new(Int64Array::from_iter_values(
                records.iter().map(|r| r.timestamp),
            )),
        ],
    )
}
