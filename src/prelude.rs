//! Prelude module for DICOM Ingest Library
//!
//! Re-exports the items most integrations need, so a single
//! `use dicom_ingest::prelude::*;` covers a typical ingestion run.
//!
//! # Usage
//!
//! ```rust,no_run
//! use dicom_ingest::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let study = local::granted("/data/study-001").await?;
//!     let report = Ingestor::new(ConfigPresets::desktop())
//!         .run(vec![FileSource::Granted(vec![study])], &DigestAnalyzer, &ConcatOutputs)
//!         .await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, IngestError, Result};

// Engine entry points and collaborator seams
pub use crate::app::{
    analyzer_fn, local, memory, Aggregator, Analyzer, BatchLimits, BatchResult, ConcatOutputs,
    ConfigPresets, DigestAnalyzer, DuplicatePolicy, Entry, ErrorRecord, ExecutorConfig,
    FileDigest, FileHandle, FileKind, FileSource, IngestReport, IngestState, Ingestor,
    LoadedFile, ProgressSnapshot,
};

// Cancellation wiring
pub use crate::app::executor::{create_cancel_channel, SignalHandler};

// File configuration
pub use crate::config::AppConfig;

// Standard library re-exports that are commonly needed
pub use std::sync::Arc;

pub use tokio;
