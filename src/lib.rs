pub mod accumulators;
pub mod commands;
pub mod decoder;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod sinks;
pub mod sources;
pub mod utils;

use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum, builder::ValueHint};
use clap_complete::Shell;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use strum_macros::Display;

/// Parse a usize that must be at least 1.
fn parse_at_least_one(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|e| format!("{e}"))?;
    if n == 0 {
        Err("value must be at least 1".into())
    } else {
        Ok(n)
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"),
    about,
    long_about = None
)]
pub struct Cli {
    /// Log level used when RUST_LOG is not set (error, warn, info, debug, trace).
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one invocation: land a batch of sensor envelopes in the row store and the archive.
    ///
    /// Every decoded record is inserted into the DuckDB table in batches of
    /// --batch-size and, once all envelopes are processed, written as a single
    /// Parquet object under --archive-root.
    ///
    /// Examples:
    ///   # Process a Kinesis event document
    ///   sensor-lander process event.json --database sensors.db --archive-root archive/
    ///
    ///   # Newline-delimited JSON from stdin, inserting 500 rows per statement
    ///   cat readings.ndjson | sensor-lander process - --input-format lines \
    ///       --batch-size 500 --database sensors.db --archive-root archive/
    #[command(verbatim_doc_comment)]
    Process(ProcessCommand),

    /// Generate shell completions for your shell.
    ///
    /// To add completions for your current shell session only:
    ///   zsh:  eval "$(sensor-lander completions zsh)"
    ///   bash: eval "$(sensor-lander completions bash)"
    ///   fish: sensor-lander completions fish | source
    #[command(verbatim_doc_comment)]
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

impl Commands {
    pub fn generate_completions(shell: Shell) {
        clap_complete::generate(
            shell,
            &mut Cli::command(),
            "sensor-lander",
            &mut std::io::stdout(),
        );
    }
}

#[derive(Args, Debug)]
pub struct ProcessCommand {
    /// Invocation input file, or "-" for stdin.
    #[arg(value_parser, value_hint = ValueHint::FilePath)]
    pub input: clio::Input,

    /// Layout of the input.
    #[arg(long, default_value_t = InputFormat::Kinesis)]
    pub input_format: InputFormat,

    /// Records per transactional insert. Has no effect on the archive.
    #[arg(long, short = 'b', env = "BATCH_SIZE", default_value_t = pipeline::DEFAULT_BATCH_SIZE, value_parser = parse_at_least_one)]
    pub batch_size: usize,

    /// DuckDB database file receiving the batches. Created if missing.
    #[arg(long, env = "DATABASE_PATH", value_hint = ValueHint::FilePath)]
    pub database: PathBuf,

    /// Table receiving the batches. Created if missing.
    #[arg(long, env = "TABLE_NAME", default_value = "sensors")]
    pub table_name: String,

    /// Directory the archive objects are written under.
    #[arg(long, env = "ARCHIVE_ROOT", value_hint = ValueHint::DirPath)]
    pub archive_root: PathBuf,

    /// Name prefix of the archive object. May contain '/' to place it in a subdirectory.
    #[arg(long, env = "KEY", default_value = pipeline::DEFAULT_ARCHIVE_PREFIX)]
    pub archive_prefix: String,

    /// Compression of the archive Parquet object.
    #[arg(long, default_value_t = ParquetCompression::Snappy)]
    pub compression: ParquetCompression,

    /// Seconds any single sink operation may take before it counts as failed.
    #[arg(long, env = "SINK_TIMEOUT_SECS", default_value_t = 30, value_parser = parse_at_least_one)]
    pub sink_timeout_secs: usize,

    /// How to print the invocation result.
    #[arg(long, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Display)]
#[value(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InputFormat {
    /// A Kinesis event document; each record's `data` is base64 JSON.
    #[default]
    Kinesis,
    /// One JSON document per line.
    Lines,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Display)]
#[value(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Display)]
#[value(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ParquetCompression {
    Zstd,
    #[default]
    Snappy,
    Gzip,
    Lz4,
    None,
}

impl From<ParquetCompression> for Compression {
    fn from(compression: ParquetCompression) -> Self {
        match compression {
            ParquetCompression::Zstd => Compression::ZSTD(ZstdLevel::default()),
            ParquetCompression::Snappy => Compression::SNAPPY,
            ParquetCompression::Gzip => Compression::GZIP(GzipLevel::default()),
            ParquetCompression::Lz4 => Compression::LZ4_RAW,
            ParquetCompression::None => Compression::UNCOMPRESSED,
        }
    }
}
