//! Executor configuration
//!
//! Every tunable of the ingestion run lives here: batch ceilings, read
//! concurrency, the streaming threshold and chunk size, the pause between
//! batches and the duplicate-path policy. Defaults come from
//! [`crate::constants`] and match a browser-like environment with a 2 GiB
//! per-buffer ceiling.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::planner::BatchLimits;
use crate::app::reader::StreamingReader;
use crate::app::source::DuplicatePolicy;
use crate::constants::{batching, executor, reading, units};
use crate::errors::{IngestError, IngestResult};

/// Configuration for a batched ingestion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Cumulative byte ceiling per batch
    pub max_batch_size_bytes: u64,
    /// File count ceiling per batch
    pub max_batch_file_count: usize,
    /// Simultaneous reads within a batch
    pub read_concurrency: usize,
    /// Files at or above this size are read in chunks
    pub streaming_threshold_bytes: u64,
    /// Chunk size for streamed reads
    pub chunk_size_bytes: usize,
    /// Pause between batches so the host can reclaim memory
    pub inter_batch_pause: Duration,
    /// Progress channel capacity; snapshots beyond it are dropped
    pub progress_buffer_size: usize,
    /// How colliding relative paths are resolved
    pub duplicate_policy: DuplicatePolicy,
    /// Batched mode; when off, everything is loaded in one shot under the legacy ceiling
    pub streaming_enabled: bool,
    /// Derive batch ceilings from this budget instead of the fixed values
    pub memory_budget_bytes: Option<u64>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_batch_size_bytes: batching::DEFAULT_MAX_BATCH_SIZE_BYTES,
            max_batch_file_count: batching::DEFAULT_MAX_BATCH_FILE_COUNT,
            read_concurrency: executor::DEFAULT_READ_CONCURRENCY,
            streaming_threshold_bytes: reading::STREAMING_THRESHOLD_BYTES,
            chunk_size_bytes: reading::CHUNK_SIZE_BYTES,
            inter_batch_pause: executor::INTER_BATCH_PAUSE,
            progress_buffer_size: executor::PROGRESS_BUFFER_SIZE,
            duplicate_policy: DuplicatePolicy::default(),
            streaming_enabled: true,
            memory_budget_bytes: None,
        }
    }
}

impl ExecutorConfig {
    /// Fixed batch ceilings
    pub fn limits(&self) -> BatchLimits {
        BatchLimits::new(self.max_batch_size_bytes, self.max_batch_file_count)
    }

    /// Reader honouring the streaming threshold and chunk size
    pub fn reader(&self) -> StreamingReader {
        StreamingReader::new(self.streaming_threshold_bytes, self.chunk_size_bytes)
    }

    /// Validate configuration values and return errors for invalid settings
    pub fn validate(&self) -> IngestResult<()> {
        if self.max_batch_size_bytes == 0 {
            return Err(invalid("Batch size ceiling cannot be zero"));
        }

        if self.max_batch_file_count == 0 {
            return Err(invalid("Batch file count ceiling cannot be zero"));
        }

        if self.read_concurrency == 0 {
            return Err(invalid("Read concurrency cannot be zero"));
        }

        if self.read_concurrency > executor::MAX_READ_CONCURRENCY {
            return Err(invalid(format!(
                "Read concurrency ({}) exceeds maximum ({})",
                self.read_concurrency,
                executor::MAX_READ_CONCURRENCY
            )));
        }

        if self.chunk_size_bytes < reading::MIN_CHUNK_SIZE_BYTES {
            return Err(invalid(format!(
                "Chunk size ({}) is below the minimum ({})",
                self.chunk_size_bytes,
                reading::MIN_CHUNK_SIZE_BYTES
            )));
        }

        if self.streaming_threshold_bytes == 0 {
            return Err(invalid("Streaming threshold cannot be zero"));
        }

        if self.progress_buffer_size == 0 {
            return Err(invalid("Progress buffer size cannot be zero"));
        }

        if self.memory_budget_bytes == Some(0) {
            return Err(invalid("Memory budget cannot be zero"));
        }

        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> IngestError {
    IngestError::InvalidConfig {
        reason: reason.into(),
    }
}

/// Builder for ExecutorConfig
#[derive(Debug, Default)]
pub struct ExecutorConfigBuilder {
    config: ExecutorConfig,
}

impl ExecutorConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-batch byte ceiling
    pub fn max_batch_size_bytes(mut self, bytes: u64) -> Self {
        self.config.max_batch_size_bytes = bytes;
        self
    }

    /// Set the per-batch file count ceiling
    pub fn max_batch_file_count(mut self, count: usize) -> Self {
        self.config.max_batch_file_count = count;
        self
    }

    /// Set read concurrency
    pub fn read_concurrency(mut self, width: usize) -> Self {
        self.config.read_concurrency = width;
        self
    }

    /// Set the streaming threshold
    pub fn streaming_threshold_bytes(mut self, bytes: u64) -> Self {
        self.config.streaming_threshold_bytes = bytes;
        self
    }

    /// Set the chunk size for streamed reads
    pub fn chunk_size_bytes(mut self, bytes: usize) -> Self {
        self.config.chunk_size_bytes = bytes;
        self
    }

    /// Set the pause between batches
    pub fn inter_batch_pause(mut self, pause: Duration) -> Self {
        self.config.inter_batch_pause = pause;
        self
    }

    /// Set progress channel capacity
    pub fn progress_buffer_size(mut self, size: usize) -> Self {
        self.config.progress_buffer_size = size;
        self
    }

    /// Set the duplicate path policy
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.config.duplicate_policy = policy;
        self
    }

    /// Enable or disable batched mode
    pub fn streaming_enabled(mut self, enabled: bool) -> Self {
        self.config.streaming_enabled = enabled;
        self
    }

    /// Derive batch ceilings from a memory budget
    pub fn memory_budget_bytes(mut self, budget: u64) -> Self {
        self.config.memory_budget_bytes = Some(budget);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> IngestResult<ExecutorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build without validation (for testing)
    pub fn build_unchecked(self) -> ExecutorConfig {
        self.config
    }
}

/// Configuration presets for different host environments
pub struct ConfigPresets;

impl ConfigPresets {
    /// Browser-like host: 2 GiB buffer ceiling, conservative batches
    pub fn browser_sandbox() -> ExecutorConfig {
        ExecutorConfig::default()
    }

    /// Desktop host with more memory and faster storage
    pub fn desktop() -> ExecutorConfig {
        ExecutorConfig {
            max_batch_size_bytes: 1536 * units::MIB,
            max_batch_file_count: 10_000,
            read_concurrency: 256,
            inter_batch_pause: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Testing configuration with tiny batches and chunks
    pub fn testing() -> ExecutorConfig {
        ExecutorConfig {
            max_batch_size_bytes: units::MIB,
            max_batch_file_count: 16,
            read_concurrency: 4,
            streaming_threshold_bytes: 64 * units::KIB,
            chunk_size_bytes: reading::MIN_CHUNK_SIZE_BYTES,
            inter_batch_pause: Duration::ZERO,
            progress_buffer_size: 64,
            ..Default::default()
        }
    }
}
