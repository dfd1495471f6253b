//! Command-line argument parsing for DICOM ingest
//!
//! This module defines the CLI structure using clap derive macros: batched
//! ingestion, a dry-run planner, name classification and config generation.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::app::executor::ExecutorConfig;
use crate::app::source::DuplicatePolicy;
use crate::constants::units;

/// DICOM ingest - memory-bounded batch ingestion of imaging studies
#[derive(Parser, Debug)]
#[command(
    name = "dicom_ingest",
    version,
    about = "Ingest large medical-imaging file collections in memory-bounded batches",
    long_about = "Collects files from directories, drops non-imaging files, plans batches under byte and file-count ceilings,
then loads and analyzes one batch at a time with per-file fault isolation."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest files and write a digest manifest
    Ingest(IngestArgs),

    /// Show how files would be batched without reading them
    Plan(PlanArgs),

    /// Classify file names the way ingestion does
    Classify(ClassifyArgs),

    /// Configuration file management
    Config(ConfigArgs),
}

/// Duplicate path handling as accepted on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateArg {
    Reject,
    KeepFirst,
    KeepLast,
    Disambiguate,
}

impl From<DuplicateArg> for DuplicatePolicy {
    fn from(arg: DuplicateArg) -> Self {
        match arg {
            DuplicateArg::Reject => DuplicatePolicy::Reject,
            DuplicateArg::KeepFirst => DuplicatePolicy::KeepFirst,
            DuplicateArg::KeepLast => DuplicatePolicy::KeepLast,
            DuplicateArg::Disambiguate => DuplicatePolicy::Disambiguate,
        }
    }
}

/// Overrides applied on top of the file configuration
#[derive(Args, Debug, Clone, Default)]
pub struct TuningArgs {
    /// Per-batch byte ceiling in MiB
    #[arg(long, value_name = "MIB")]
    pub batch_size_mib: Option<u64>,

    /// Per-batch file count ceiling
    #[arg(long, value_name = "COUNT")]
    pub batch_files: Option<usize>,

    /// Derive batch ceilings from a memory budget in MiB
    #[arg(long, value_name = "MIB")]
    pub memory_budget_mib: Option<u64>,

    /// Load everything in one shot instead of batching
    #[arg(long)]
    pub no_streaming: bool,

    /// How to handle files that end up with the same relative path
    #[arg(long, value_enum)]
    pub duplicates: Option<DuplicateArg>,
}

/// Arguments for the ingest command
#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// Files or directories to ingest
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Write the JSON manifest here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Simultaneous reads within a batch
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,

    #[command(flatten)]
    pub tuning: TuningArgs,
}

/// Arguments for the plan command
#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Files or directories to plan
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// List every file in each batch
    #[arg(long)]
    pub list_files: bool,

    #[command(flatten)]
    pub tuning: TuningArgs,
}

/// Arguments for the classify command
#[derive(Args, Debug, Clone)]
pub struct ClassifyArgs {
    /// File names to classify
    #[arg(required = true, value_name = "NAME")]
    pub names: Vec<String>,
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the default configuration file
    Show,

    /// Show the effective configuration after loading files
    Effective,

    /// Print where the user configuration file is looked up
    Path,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}

impl TuningArgs {
    /// Apply the overrides to a runtime configuration
    pub fn apply(&self, config: &mut ExecutorConfig) {
        if let Some(mib) = self.batch_size_mib {
            config.max_batch_size_bytes = mib.saturating_mul(units::MIB);
        }
        if let Some(files) = self.batch_files {
            config.max_batch_file_count = files;
        }
        if let Some(mib) = self.memory_budget_mib {
            config.memory_budget_bytes = Some(mib.saturating_mul(units::MIB));
        }
        if self.no_streaming {
            config.streaming_enabled = false;
        }
        if let Some(policy) = self.duplicates {
            config.duplicate_policy = policy.into();
        }
    }
}

impl IngestArgs {
    /// Apply every ingest override to a runtime configuration
    pub fn apply(&self, config: &mut ExecutorConfig) {
        self.tuning.apply(config);
        if let Some(width) = self.concurrency {
            config.read_concurrency = width;
        }
    }
}
