//! Error types for DICOM Ingest
//!
//! This module defines the error taxonomy for every stage of ingestion. Errors are
//! split by how far they propagate: read and analysis errors are recovered locally
//! and become [`ErrorRecord`](crate::app::ErrorRecord)s, while ingest errors end the
//! whole operation before any partial ingestion is attempted.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while enumerating a file source
#[derive(Error, Debug)]
pub enum SourceError {
    /// The OS declined or revoked access to an entry
    #[error("Permission denied while enumerating: {path}")]
    PermissionDenied { path: String },

    /// A path supplied to the source does not exist
    #[error("Source path not found: {path}")]
    NotFound { path: PathBuf },

    /// The same relative path was produced twice and the policy rejects duplicates
    #[error("Duplicate path in file source: {path}")]
    DuplicatePath { path: String },

    /// Generic I/O failure during enumeration
    #[error("I/O error while enumerating {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while reading a single file's content
#[derive(Error, Debug)]
pub enum ReadError {
    /// Underlying I/O failure (deleted file, corrupt stream)
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Access to the file was revoked mid-scan
    #[error("Permission denied reading {path}")]
    PermissionDenied { path: String },

    /// The stream ended before the advertised size was reached
    #[error("Truncated read of {path}: expected {expected} bytes, got {actual}")]
    Truncated {
        path: String,
        expected: u64,
        actual: u64,
    },

    /// File cannot be held in addressable memory on this platform
    #[error("File {path} is too large to load ({size} bytes)")]
    TooLarge { path: String, size: u64 },

    /// The read task itself failed (panicked or was aborted)
    #[error("Read task for {path} failed: {reason}")]
    TaskFailed { path: String, reason: String },
}

impl ReadError {
    /// Classify an I/O error for the given path
    pub fn from_io(path: impl Into<String>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => ReadError::PermissionDenied { path },
            _ => ReadError::Io { path, source },
        }
    }

    /// Path of the file this error belongs to
    pub fn path(&self) -> &str {
        match self {
            ReadError::Io { path, .. }
            | ReadError::PermissionDenied { path }
            | ReadError::Truncated { path, .. }
            | ReadError::TooLarge { path, .. }
            | ReadError::TaskFailed { path, .. } => path,
        }
    }
}

/// Errors raised by the analysis collaborator for an entire batch
#[derive(Error, Debug, Clone)]
pub enum AnalysisError {
    /// The analyzer rejected the batch
    #[error("Analysis of batch {batch_index} failed: {reason}")]
    Rejected { batch_index: usize, reason: String },

    /// The analyzer panicked while processing the batch
    #[error("Analysis of batch {batch_index} panicked")]
    Panicked { batch_index: usize },

    /// The analyzer can no longer honour its contract; no later batch may run
    #[error("Analyzer contract broken at batch {batch_index}: {reason}")]
    ContractBroken { batch_index: usize, reason: String },
}

impl AnalysisError {
    /// Whether the executor may continue with the next batch
    pub fn is_batch_local(&self) -> bool {
        !matches!(self, AnalysisError::ContractBroken { .. })
    }

    /// Build a rejection from any displayable reason
    pub fn rejected(batch_index: usize, reason: impl std::fmt::Display) -> Self {
        AnalysisError::Rejected {
            batch_index,
            reason: reason.to_string(),
        }
    }
}

/// Terminal errors that stop the whole ingestion run
#[derive(Error, Debug)]
pub enum IngestError {
    /// Dataset exceeds the single-shot ceiling while streaming batching is unavailable
    #[error("Dataset of {total} bytes exceeds the single-shot limit of {limit} bytes")]
    SizeLimitExceeded { total: u64, limit: u64 },

    /// OS-level access declined or revoked before ingestion could start
    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },

    /// Executor configuration is unusable
    #[error("Invalid ingest configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The analysis collaborator broke its contract
    #[error("Analysis contract broken: {reason}")]
    AnalysisContractBroken { reason: String },

    /// Enumeration failed for a reason other than permissions
    #[error("Failed to collect input files: {reason}")]
    Collection { reason: String },

    /// Run was cancelled before any batch started
    #[error("Ingestion cancelled")]
    Cancelled,
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// I/O error reading configuration
    #[error("Failed to read configuration file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// File source error
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Single-file read error
    #[error(transparent)]
    Read(#[from] ReadError),

    /// Batch analysis error
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Terminal ingestion error
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON output error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recovered locally rather than ending the run
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Read(_) => true,
            AppError::Analysis(e) => e.is_batch_local(),

            AppError::Ingest(_)
            | AppError::Source(SourceError::PermissionDenied { .. })
            | AppError::Config(_) => false,

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Source(_) => "source",
            AppError::Read(_) => "read",
            AppError::Analysis(_) => "analysis",
            AppError::Ingest(_) => "ingest",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Json(_) => "json",
            AppError::Generic { .. } => "generic",
        }
    }
}

impl From<SourceError> for IngestError {
    fn from(error: SourceError) -> Self {
        match error {
            SourceError::PermissionDenied { path } => IngestError::PermissionDenied { path },
            other => IngestError::Collection {
                reason: other.to_string(),
            },
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Source result type alias
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Read result type alias
pub type ReadResult<T> = std::result::Result<T, ReadError>;

/// Analysis result type alias
pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;

/// Ingest result type alias
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Config result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
