use std::{num::NonZeroUsize, time::Duration};

use thiserror::Error;

use crate::utils::filesystem::validate_relative_name;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_ARCHIVE_PREFIX: &str = "sensor-data";
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("batch size must be at least 1")]
    ZeroBatchSize,

    #[error("invalid archive prefix: {0}")]
    InvalidArchivePrefix(String),

    #[error("sink timeout must be greater than zero")]
    ZeroSinkTimeout,
}

/// Settings for one pipeline driver, fixed before the invocation starts.
///
/// `batch_size` only controls how often the transactional sink is flushed;
/// the archive always receives the whole invocation in one object.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    batch_size: NonZeroUsize,
    archive_prefix: String,
    sink_timeout: Duration,
}

impl PipelineConfig {
    pub fn new(batch_size: usize, archive_prefix: impl Into<String>) -> Result<Self, ConfigError> {
        let batch_size = NonZeroUsize::new(batch_size).ok_or(ConfigError::ZeroBatchSize)?;
        let archive_prefix = archive_prefix.into();
        validate_relative_name(&archive_prefix)
            .map_err(|e| ConfigError::InvalidArchivePrefix(e.to_string()))?;

        Ok(Self {
            batch_size,
            archive_prefix,
            sink_timeout: DEFAULT_SINK_TIMEOUT,
        })
    }

    pub fn with_sink_timeout(mut self, sink_timeout: Duration) -> Result<Self, ConfigError> {
        if sink_timeout.is_zero() {
            return Err(ConfigError::ZeroSinkTimeout);
        }
        self.sink_timeout = sink_timeout;
        Ok(self)
    }

    pub fn batch_size(&self) -> NonZeroUsize {
        self.batch_size
    }

    pub fn archive_prefix(&self) -> &str {
        &self.archive_prefix
    }

    pub fn sink_timeout(&self) -> Duration {
        self.sink_timeout
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: NonZeroUsize::new(DEFAULT_BATCH_SIZE).unwrap_or(NonZeroUsize::MIN),
            archive_prefix: DEFAULT_ARCHIVE_PREFIX.to_string(),
            sink_timeout: DEFAULT_SINK_TIMEOUT,
        }
    }
}
