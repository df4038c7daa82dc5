use std::{fmt::Write as _, io::Read, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    OutputFormat, ProcessCommand,
    decoder::RecordDecoder,
    pipeline::{ArchiveOutcome, InvocationResult, PipelineConfig, PipelineDriver},
    sinks::{ArchiveSinkWriter, duckdb::DuckDbSink, object_store::LocalObjectStore},
    sources::event::read_envelopes,
};

pub async fn run(mut args: ProcessCommand) -> Result<InvocationResult> {
    let config = PipelineConfig::new(args.batch_size, args.archive_prefix.clone())?
        .with_sink_timeout(Duration::from_secs(args.sink_timeout_secs as u64))?;

    let mut input = Vec::new();
    args.input
        .read_to_end(&mut input)
        .context("Failed to read invocation input")?;
    let envelopes = read_envelopes(&input, args.input_format)?;

    let transactional = DuckDbSink::new(args.database.clone(), args.table_name.clone());
    let store = Arc::new(LocalObjectStore::new(args.archive_root.clone()));
    let archive = ArchiveSinkWriter::new(store).with_compression(args.compression);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt_watch = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping at the next envelope");
            on_interrupt.cancel();
        }
    });

    let mut driver = PipelineDriver::new(
        config,
        RecordDecoder::new(args.input_format.envelope_encoding()),
        Box::new(transactional),
        archive,
    )
    .with_cancellation(cancel);

    let result = driver.run(envelopes).await;
    interrupt_watch.abort();

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print!("{}", render_text(&result)),
    }
    Ok(result)
}

fn render_text(result: &InvocationResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "status: {} ({})",
        result.status, result.status_code
    );
    let _ = writeln!(out, "invocation: {}", result.invocation_id);
    let _ = writeln!(out, "{}", result.summary);
    for failure in &result.decode_failures {
        let _ = writeln!(
            out,
            "  envelope {} not decoded: {}",
            failure.position, failure.reason
        );
    }
    if result.sink_failure_count() > 0 {
        let _ = writeln!(out, "sink failures: {}", result.sink_failure_count());
    }
    for failure in &result.sink_failures {
        let _ = writeln!(
            out,
            "  {:?} sink lost {} record(s): {}",
            failure.sink, failure.records, failure.reason
        );
    }
    if let ArchiveOutcome::Written { location, records } = &result.archive {
        let _ = writeln!(out, "archive: {location} ({records} records)");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        InputFormat, ParquetCompression,
        pipeline::{DecodeFailure, InvocationStatus},
        utils::test_helpers::{
            event_helpers::{TestEnvelope, kinesis_event},
            parquet_helpers, test_data,
        },
    };
    use clio::Input;
    use duckdb::Connection;
    use std::path::Path;
    use tempfile::TempDir;

    fn args(temp_dir: &TempDir, input: &Path, batch_size: usize) -> ProcessCommand {
        ProcessCommand {
            input: Input::new(&input.to_path_buf()).unwrap(),
            input_format: InputFormat::Kinesis,
            batch_size,
            database: temp_dir.path().join("db").join("sensors.db"),
            table_name: "sensors".to_string(),
            archive_root: temp_dir.path().join("archive"),
            archive_prefix: "sensor-data".to_string(),
            compression: ParquetCompression::Snappy,
            sink_timeout_secs: 30,
            output: OutputFormat::Json,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_lands_records_in_both_sinks() {
        let temp_dir = TempDir::new().unwrap();
        let input_path = temp_dir.path().join("event.json");
        let records = test_data::readings(7);
        let envelopes: Vec<_> = records.iter().map(|r| TestEnvelope::Valid(*r)).collect();
        std::fs::write(&input_path, kinesis_event(&envelopes)).unwrap();

        let result = run(args(&temp_dir, &input_path, 3)).await.unwrap();

        assert_eq!(result.status, InvocationStatus::Success);
        assert_eq!(result.batches_written, 3);
        assert_eq!(result.rows_committed, 7);

        let conn = Connection::open(temp_dir.path().join("db").join("sensors.db")).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sensors", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 7);

        let files = parquet_helpers::list_parquet_files(&temp_dir.path().join("archive"));
        assert_eq!(files.len(), 1);
        assert_eq!(parquet_helpers::read_records(&files[0]), records);
    }

    #[tokio::test]
    async fn test_run_rejects_unparseable_input_before_touching_sinks() {
        let temp_dir = TempDir::new().unwrap();
        let input_path = temp_dir.path().join("event.json");
        std::fs::write(&input_path, "this is not an event").unwrap();

        assert!(run(args(&temp_dir, &input_path, 3)).await.is_err());
        assert!(!temp_dir.path().join("db").exists());
        assert!(!temp_dir.path().join("archive").exists());
    }

    #[test]
    fn test_render_text_lists_failures() {
        let result = InvocationResult {
            invocation_id: uuid::Uuid::nil(),
            status: InvocationStatus::PartialFailure,
            status_code: 207,
            summary: "4 envelope(s), 3 record(s) processed".to_string(),
            envelopes_received: 4,
            records_processed: 3,
            batches_written: 1,
            batches_failed: 0,
            rows_committed: 3,
            records_unflushed: 0,
            decode_failures: vec![DecodeFailure {
                position: 2,
                reason: "malformed JSON".to_string(),
            }],
            sink_failures: Vec::new(),
            archive: ArchiveOutcome::Skipped,
        };

        let text = render_text(&result);

        assert!(text.starts_with("status: partial_failure (207)\n"));
        assert!(text.contains("envelope 2 not decoded: malformed JSON"));
        assert!(!text.contains("archive:"));
    }
}
