pub mod test_data {
    use crate::record::Record;

    /// A deterministic reading in the value ranges the field simulator emits:
    /// ids 1000..=9999, 20–35 °C, 30–80 % humidity.
    pub fn reading(i: usize) -> Record {
        Record {
            sensor_id: 1000 + ((i * 7919) % 9000) as i64,
            temperature: 20.0 + (i % 1500) as f64 / 100.0,
            humidity: 30.0 + (i % 5000) as f64 / 100.0,
            timestamp: 1_718_000_000 + i as i64,
        }
    }

    pub fn readings(count: usize) -> Vec<Record> {
        (0..count).map(reading).collect()
    }

    pub fn to_json(record: &Record) -> String {
        serde_json::to_string(record).unwrap()
    }
}

pub mod event_helpers {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde_json::json;

    use crate::record::Record;

    /// One envelope in an invocation input: a valid record or raw bytes that
    /// will not decode.
    pub enum TestEnvelope {
        Valid(Record),
        Garbage(&'static str),
    }

    pub fn raw_envelopes(envelopes: &[TestEnvelope]) -> Vec<Vec<u8>> {
        envelopes
            .iter()
            .map(|e| match e {
                TestEnvelope::Valid(record) => super::test_data::to_json(record).into_bytes(),
                TestEnvelope::Garbage(text) => text.as_bytes().to_vec(),
            })
            .collect()
    }

    /// A Kinesis-style event document, each record's `data` base64 encoded.
    pub fn kinesis_event(envelopes: &[TestEnvelope]) -> String {
        let records: Vec<_> = raw_envelopes(envelopes)
            .iter()
            .enumerate()
            .map(|(i, payload)| {
                json!({
                    "kinesis": {
                        "partitionKey": format!("sensor-{}", i % 10 + 1),
                        "sequenceNumber": format!("{:056}", i),
                        "data": STANDARD.encode(payload),
                    },
                    "eventSource": "aws:kinesis",
                })
            })
            .collect();
        json!({ "Records": records }).to_string()
    }

    pub fn ndjson(envelopes: &[TestEnvelope]) -> String {
        raw_envelopes(envelopes)
            .into_iter()
            .map(|bytes| String::from_utf8(bytes).unwrap() + "\n")
            .collect()
    }
}

pub mod parquet_helpers {
    use std::{
        fs::File,
        path::{Path, PathBuf},
    };

    use arrow::{
        array::AsArray,
        datatypes::{Float64Type, Int64Type},
    };
    use glob::glob;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    use crate::record::Record;

    /// Every `.parquet` file below `dir`, sorted by path.
    pub fn list_parquet_files(dir: &Path) -> Vec<PathBuf> {
        let pattern = format!("{}/**/*.parquet", dir.display());
        let mut found: Vec<PathBuf> = glob(&pattern).unwrap().flatten().collect();
        found.sort();
        found
    }

    pub fn read_records(path: &Path) -> Vec<Record> {
        let file = File::open(path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();

        let mut records = Vec::new();
        for batch in reader {
            let batch = batch.unwrap();
            let ids = batch.column(0).as_primitive::<Int64Type>();
            let temps = batch.column(1).as_primitive::<Float64Type>();
            let hums = batch.column(2).as_primitive::<Float64Type>();
            let stamps = batch.column(3).as_primitive::<Int64Type>();
            for row in 0..batch.num_rows() {
                records.push(Record {
                    sensor_id: ids.value(row),
                    temperature: temps.value(row),
                    humidity: hums.value(row),
                    timestamp: stamps.value(row),
                });
            }
        }
        records
    }
}
