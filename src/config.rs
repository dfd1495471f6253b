//! Configuration management for DICOM ingestion
//!
//! Settings are read from a TOML file using human-friendly units (MiB,
//! milliseconds) and converted into the runtime [`ExecutorConfig`]. Every
//! field is optional in the file; missing values fall back to the defaults
//! in [`crate::constants`].
//!
//! Search order when no file is given explicitly:
//! 1. `./dicom-ingest.toml`
//! 2. `<user config dir>/dicom-ingest/config.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::executor::ExecutorConfig;
use crate::app::source::DuplicatePolicy;
use crate::constants::{batching, config as paths, executor, reading, units};
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Batch execution settings
    pub ingest: IngestConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly executor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfigToml {
    /// Per-batch byte ceiling in MiB
    pub max_batch_size_mib: u64,
    /// Per-batch file count ceiling
    pub max_batch_file_count: usize,
    /// Simultaneous reads within a batch
    pub read_concurrency: usize,
    /// Files at or above this size (MiB) are streamed
    pub streaming_threshold_mib: u64,
    /// Chunk size for streamed reads in MiB
    pub chunk_size_mib: u64,
    /// Pause between batches in milliseconds
    pub inter_batch_pause_ms: u64,
    /// Progress channel capacity
    pub progress_buffer_size: usize,
    /// Duplicate path policy
    pub duplicate_policy: DuplicatePolicy,
    /// Batched mode; when off, datasets load in one shot under a hard ceiling
    pub streaming_enabled: bool,
    /// Derive batch ceilings from this budget (MiB) instead of the fixed values
    pub memory_budget_mib: Option<u64>,
}

impl Default for IngestConfigToml {
    fn default() -> Self {
        Self {
            max_batch_size_mib: batching::DEFAULT_MAX_BATCH_SIZE_BYTES / units::MIB,
            max_batch_file_count: batching::DEFAULT_MAX_BATCH_FILE_COUNT,
            read_concurrency: executor::DEFAULT_READ_CONCURRENCY,
            streaming_threshold_mib: reading::STREAMING_THRESHOLD_BYTES / units::MIB,
            chunk_size_mib: reading::CHUNK_SIZE_BYTES as u64 / units::MIB,
            inter_batch_pause_ms: executor::INTER_BATCH_PAUSE.as_millis() as u64,
            progress_buffer_size: executor::PROGRESS_BUFFER_SIZE,
            duplicate_policy: DuplicatePolicy::default(),
            streaming_enabled: true,
            memory_budget_mib: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when no CLI flag is given
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl IngestConfigToml {
    /// Convert to a validated runtime configuration
    pub fn to_runtime_config(&self) -> ConfigResult<ExecutorConfig> {
        let chunk_size_bytes = usize::try_from(mib("chunk_size_mib", self.chunk_size_mib)?)
            .map_err(|_| invalid("chunk_size_mib", self.chunk_size_mib, "too large"))?;

        let config = ExecutorConfig {
            max_batch_size_bytes: mib("max_batch_size_mib", self.max_batch_size_mib)?,
            max_batch_file_count: self.max_batch_file_count,
            read_concurrency: self.read_concurrency,
            streaming_threshold_bytes: mib("streaming_threshold_mib", self.streaming_threshold_mib)?,
            chunk_size_bytes,
            inter_batch_pause: Duration::from_millis(self.inter_batch_pause_ms),
            progress_buffer_size: self.progress_buffer_size,
            duplicate_policy: self.duplicate_policy,
            streaming_enabled: self.streaming_enabled,
            memory_budget_bytes: self
                .memory_budget_mib
                .map(|budget| mib("memory_budget_mib", budget))
                .transpose()?,
        };

        config
            .validate()
            .map_err(|e| invalid("ingest", "", e.to_string()))?;
        Ok(config)
    }
}

fn mib(field: &str, value: u64) -> ConfigResult<u64> {
    value
        .checked_mul(units::MIB)
        .ok_or_else(|| invalid(field, value, "overflows a byte count"))
}

fn invalid(field: &str, value: impl ToString, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

impl AppConfig {
    /// Convert TOML-friendly configuration to runtime configuration
    pub fn to_runtime_config(&self) -> ConfigResult<ExecutorConfig> {
        self.ingest.to_runtime_config()
    }

    /// Load configuration from an explicit file or the standard locations
    ///
    /// An explicit path that does not exist is an error; missing standard
    /// files simply yield the defaults.
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        if let Some(path) = config_file_override {
            if !path.exists() {
                return Err(ConfigError::NotFound { path });
            }
            return Self::load_from_file(&path).await;
        }

        match Self::find_config_file() {
            Some(path) => Self::load_from_file(&path).await,
            None => {
                debug!("No config file found in standard locations, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(paths::LOCAL_CONFIG_FILE)];
        search_paths.extend(Self::default_config_path());

        search_paths.into_iter().find(|path| {
            let found = path.exists();
            if found {
                debug!("Found config file: {}", path.display());
            }
            found
        })
    }

    /// Default config file path for the current user
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(paths::CONFIG_DIR_NAME).join(paths::CONFIG_FILE_NAME))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Default configuration as commented TOML
    pub fn generate_default_config_content() -> String {
        let defaults = IngestConfigToml::default();
        format!(
            r#"# DICOM ingest configuration

[ingest]
# Per-batch ceilings; a single file larger than the byte ceiling gets its own batch
max_batch_size_mib = {}
max_batch_file_count = {}

# Simultaneous reads within a batch
read_concurrency = {}

# Files at or above this size are read in chunks of chunk_size_mib
streaming_threshold_mib = {}
chunk_size_mib = {}

# Pause between batches so released buffers can be reclaimed
inter_batch_pause_ms = {}

progress_buffer_size = {}

# reject | keep-first | keep-last | disambiguate
duplicate_policy = "disambiguate"

# When false, the whole dataset is loaded at once (hard ceiling 1900 MiB)
streaming_enabled = true

# Derive batch ceilings from a memory budget instead
# memory_budget_mib = 2048

[logging]
level = "info"  # error, warn, info, debug, trace
"#,
            defaults.max_batch_size_mib,
            defaults.max_batch_file_count,
            defaults.read_concurrency,
            defaults.streaming_threshold_mib,
            defaults.chunk_size_mib,
            defaults.inter_batch_pause_ms,
            defaults.progress_buffer_size,
        )
    }
}
