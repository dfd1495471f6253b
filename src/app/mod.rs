//! Core ingestion logic
//!
//! This module contains the engine: source collection, classification,
//! batch planning, streaming reads, the serial batch executor, and the
//! analyzer/aggregator seams callers plug their own logic into.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dicom_ingest::app::{
//!     local, ConcatOutputs, DigestAnalyzer, ExecutorConfig, FileSource, Ingestor,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let study = local::granted("/data/study-001").await?;
//!
//! let report = Ingestor::new(ExecutorConfig::default())
//!     .run(vec![FileSource::Granted(vec![study])], &DigestAnalyzer, &ConcatOutputs)
//!     .await?;
//!
//! println!("{}", report.summary());
//! for digest in &report.result {
//!     println!("{} {}", digest.md5, digest.path);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod analysis;
pub mod classify;
pub mod executor;
pub mod models;
pub mod pipeline;
pub mod planner;
pub mod preflight;
pub mod reader;
pub mod source;

// Re-export main public API
pub use aggregate::{Aggregator, ConcatOutputs};
pub use analysis::{analyzer_fn, Analyzer, DigestAnalyzer, FileDigest, FnAnalyzer};
pub use classify::{classify, retain_payload, should_exclude};
pub use executor::{
    BatchExecutor, ConfigPresets, ExecutorConfig, IngestReport, IngestState, IngestStats,
    ProgressSnapshot,
};
pub use models::{Batch, BatchResult, ErrorRecord, FileKind, FileReference, LoadedFile};
pub use pipeline::Ingestor;
pub use planner::{count_batches, plan, BatchLimits, BatchPlanner};
pub use reader::{ReadProgress, StreamingReader};
pub use source::{
    collect, collect_all, local, memory, CollectStats, DuplicatePolicy, Entry, FileHandle,
    FileSource,
};
