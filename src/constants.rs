//! Application constants for DICOM Ingest
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Size units used when expressing byte ceilings
pub mod units {
    /// One kibibyte
    pub const KIB: u64 = 1024;

    /// One mebibyte
    pub const MIB: u64 = 1024 * KIB;

    /// One gibibyte
    pub const GIB: u64 = 1024 * MIB;
}

/// Batch sizing limits
pub mod batching {
    use super::units::{GIB, MIB};

    /// Default cumulative byte ceiling for one batch (800 MiB)
    pub const DEFAULT_MAX_BATCH_SIZE_BYTES: u64 = 800 * MIB;

    /// Default file count ceiling for one batch
    pub const DEFAULT_MAX_BATCH_FILE_COUNT: usize = 5000;

    /// Hard ceiling for the legacy single-shot path (no streaming batching)
    pub const LEGACY_MAX_TOTAL_BYTES: u64 = 1900 * MIB;

    /// Soft warning threshold for the legacy single-shot path
    pub const LEGACY_WARN_TOTAL_BYTES: u64 = 500 * MIB;

    /// Smallest byte ceiling the sizing heuristic will choose
    pub const MIN_DERIVED_BATCH_BYTES: u64 = 64 * MIB;

    /// Largest byte ceiling the sizing heuristic will choose
    pub const MAX_DERIVED_BATCH_BYTES: u64 = 1900 * MIB;

    /// Default memory budget used when deriving limits heuristically
    pub const DEFAULT_MEMORY_BUDGET_BYTES: u64 = 2 * GIB;
}

/// Streaming reader configuration
pub mod reading {
    use super::units::{GIB, MIB};

    /// Files at or above this size are read in chunks instead of one call.
    /// Sits just below the largest contiguous buffer the runtime will hand out.
    pub const STREAMING_THRESHOLD_BYTES: u64 = 2 * GIB - MIB;

    /// Chunk size for streamed reads
    pub const CHUNK_SIZE_BYTES: usize = 64 * MIB as usize;

    /// Smallest permitted chunk size
    pub const MIN_CHUNK_SIZE_BYTES: usize = 4 * 1024;
}

/// Read fan-out and executor pacing
pub mod executor {
    use super::Duration;

    /// Default number of concurrent reads within one batch
    pub const DEFAULT_READ_CONCURRENCY: usize = 100;

    /// Maximum permitted read concurrency
    pub const MAX_READ_CONCURRENCY: usize = 1024;

    /// Pause between batches so released buffers can be reclaimed
    pub const INTER_BATCH_PAUSE: Duration = Duration::from_millis(10);

    /// Channel buffer size for progress snapshots
    pub const PROGRESS_BUFFER_SIZE: usize = 1024;
}

/// File classification tables
pub mod classify {
    /// Archive extension
    pub const ZIP_EXTENSION: &str = "zip";

    /// Vendor protocol file extensions (Siemens exam cards, GE/Philips exports)
    pub const PROTOCOL_EXTENSIONS: &[&str] = &["pro", "exar1", "examcard", "lxprotocol"];

    /// Vendor protocol files recognised by exact name
    pub const PROTOCOL_FILE_NAMES: &[&str] = &["LxProtocol"];

    /// Non-payload extensions that are never ingested
    pub const EXCLUDED_EXTENSIONS: &[&str] = &[
        "txt", "md", "markdown", "html", "htm", "xml", "json", "log", "csv", "rtf", "pdf",
    ];
}

/// Configuration file locations
pub mod config {
    /// Project-local configuration file name
    pub const LOCAL_CONFIG_FILE: &str = "dicom-ingest.toml";

    /// Directory name under the user config dir
    pub const CONFIG_DIR_NAME: &str = "dicom-ingest";

    /// Configuration file name under the user config dir
    pub const CONFIG_FILE_NAME: &str = "config.toml";
}

// Re-export the most frequently used values at module level
pub use batching::{DEFAULT_MAX_BATCH_FILE_COUNT, DEFAULT_MAX_BATCH_SIZE_BYTES};
pub use executor::DEFAULT_READ_CONCURRENCY;
pub use reading::{CHUNK_SIZE_BYTES, STREAMING_THRESHOLD_BYTES};
