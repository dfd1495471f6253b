//! DICOM Ingest Library
//!
//! Memory-bounded batch ingestion of large medical-imaging file collections.
//! Files are collected from several source modalities, filtered by name,
//! planned into batches under byte and file-count ceilings, read with
//! streaming for oversized files, and handed to an analyzer one batch at a
//! time with per-file fault isolation.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use constants::{batching, units};

    #[test]
    fn test_constants_accessible() {
        assert_eq!(batching::DEFAULT_MAX_BATCH_FILE_COUNT, 5000);
        assert_eq!(batching::DEFAULT_MAX_BATCH_SIZE_BYTES, 800 * units::MIB);
        assert_eq!(constants::config::LOCAL_CONFIG_FILE, "dicom-ingest.toml");
    }

    #[test]
    fn test_error_types() {
        let ingest_error = errors::IngestError::SizeLimitExceeded {
            total: 2 * units::GIB,
            limit: batching::LEGACY_MAX_TOTAL_BYTES,
        };
        let app_error = AppError::Ingest(ingest_error);

        assert_eq!(app_error.category(), "ingest");
        assert!(!app_error.is_recoverable());
    }
}
