//! Command-line interface components
//!
//! This module contains CLI-specific code for the DICOM ingest application,
//! including argument parsing, command handlers and progress display.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{
    ClassifyArgs, Cli, Commands, ConfigAction, ConfigArgs, DuplicateArg, GlobalArgs, IngestArgs,
    PlanArgs, TuningArgs,
};
pub use commands::{
    handle_classify, handle_config, handle_ingest, handle_plan, IngestManifest, ManifestEntry,
};
pub use progress::{ProgressConfig, ProgressDisplay};
