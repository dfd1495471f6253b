//! Command handlers for the DICOM ingest CLI
//!
//! This module implements the command handlers that connect CLI arguments to
//! the ingestion engine: configuration loading, source collection, progress
//! display, signal wiring and manifest output.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::aggregate::ConcatOutputs;
use crate::app::analysis::{DigestAnalyzer, FileDigest};
use crate::app::classify::{classify, retain_payload, should_exclude};
use crate::app::executor::{
    create_cancel_channel, ExecutorConfig, IngestReport, IngestState, IngestStats, SignalHandler,
};
use crate::app::models::{ErrorRecord, FileKind, FileReference};
use crate::app::pipeline::Ingestor;
use crate::app::planner::BatchPlanner;
use crate::app::preflight;
use crate::app::source::{collect_all, local, CollectStats, FileSource};
use crate::cli::{
    ClassifyArgs, ConfigAction, ConfigArgs, GlobalArgs, IngestArgs, PlanArgs, ProgressConfig,
    ProgressDisplay,
};
use crate::config::AppConfig;
use crate::errors::{AppError, IngestError, Result};

/// One manifest line per ingested file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub kind: FileKind,
    pub size_bytes: u64,
    pub md5: String,
}

/// JSON document written by `ingest`
#[derive(Debug, Clone, Serialize)]
pub struct IngestManifest {
    pub summary: String,
    pub state: IngestState,
    pub stats: IngestStats,
    pub collect_stats: CollectStats,
    /// Digests keyed by relative path
    pub files: BTreeMap<String, ManifestEntry>,
    pub errors: Vec<ErrorRecord>,
}

impl IngestManifest {
    /// Build the manifest from a digest report
    pub fn from_report(report: &IngestReport<Vec<FileDigest>>) -> Self {
        let files = report
            .result
            .iter()
            .map(|digest| {
                (
                    digest.path.clone(),
                    ManifestEntry {
                        kind: digest.kind,
                        size_bytes: digest.size_bytes,
                        md5: digest.md5.clone(),
                    },
                )
            })
            .collect();

        Self {
            summary: report.summary(),
            state: report.state.clone(),
            stats: report.stats.clone(),
            collect_stats: report.collect_stats.clone(),
            files,
            errors: report.errors.clone(),
        }
    }
}

/// Load the file configuration and convert it to runtime settings
async fn load_runtime_config(config_path: Option<PathBuf>) -> Result<ExecutorConfig> {
    let app_config = AppConfig::load(config_path).await?;
    let config = app_config.to_runtime_config()?;
    debug!("Runtime configuration: {:?}", config);
    Ok(config)
}

/// Resolve command-line paths into one drag-drop style source
///
/// Directory names are kept as the first path segment so files from
/// different roots do not collide.
async fn path_sources(paths: &[PathBuf]) -> Result<Vec<FileSource>> {
    let mut entries = Vec::with_capacity(paths.len());
    for path in paths {
        entries.push(local::granted(path).await?);
    }
    Ok(vec![FileSource::Dropped(entries)])
}

/// Handle the ingest command
///
/// Runs the full pipeline with progress display and Ctrl-C cancellation,
/// then writes the digest manifest as JSON.
pub async fn handle_ingest(args: IngestArgs, global: &GlobalArgs) -> Result<()> {
    let mut config = load_runtime_config(global.config.clone()).await?;
    args.apply(&mut config);
    config.validate()?;

    info!(
        "Ingesting {} paths (batch ceiling {} bytes / {} files, {} concurrent reads)",
        args.paths.len(),
        config.max_batch_size_bytes,
        config.max_batch_file_count,
        config.read_concurrency
    );
    let sources = path_sources(&args.paths).await?;

    let (progress_tx, progress_rx) = mpsc::channel(config.progress_buffer_size);
    let mut display = ProgressDisplay::new(ProgressConfig {
        enable_progress_bars: !global.quiet && !args.no_progress,
        ..Default::default()
    });
    display.start(progress_rx)?;

    let (cancel_tx, cancel_rx) = create_cancel_channel();
    let signal_task = SignalHandler::new(cancel_tx).setup();

    let outcome = Ingestor::new(config)
        .with_progress(progress_tx)
        .with_cancellation(cancel_rx)
        .run(sources, &DigestAnalyzer, &ConcatOutputs)
        .await;

    display.finish().await;
    signal_task.abort();

    let report = outcome?;
    let manifest = IngestManifest::from_report(&report);
    write_manifest(&manifest, args.output.as_deref())?;

    if !global.quiet {
        eprintln!("{}", report.summary());
        for line in report.error_lines() {
            eprintln!("  {}", line);
        }
    }

    run_status(&report)
}

/// Exit status for a finished run
///
/// A run that broke after completing at least one batch is reported as a
/// partial success; its manifest already holds the completed batches.
fn run_status<R>(report: &IngestReport<R>) -> Result<()> {
    match &report.state {
        IngestState::Done => Ok(()),
        IngestState::Cancelled => {
            warn!("Ingestion cancelled; manifest contains completed batches only");
            Err(IngestError::Cancelled.into())
        }
        IngestState::Failed { reason } if report.is_partial_success() => {
            warn!(
                "Partial success: {} of {} batches analyzed before failure: {}",
                report.stats.batches_completed, report.stats.batches_total, reason
            );
            Ok(())
        }
        IngestState::Failed { reason } => Err(IngestError::AnalysisContractBroken {
            reason: reason.clone(),
        }
        .into()),
        other => Err(AppError::generic(format!("Ingestion ended in state {}", other))),
    }
}

fn write_manifest(manifest: &IngestManifest, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            let mut writer = io::BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, manifest)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            info!("Wrote manifest for {} files to {}", manifest.files.len(), path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer_pretty(&mut handle, manifest)?;
            writeln!(handle)?;
        }
    }
    Ok(())
}

/// Handle the plan command
///
/// Collects and sizes the inputs exactly like `ingest` but only prints the
/// batches; no file content is read.
pub async fn handle_plan(args: PlanArgs, global: &GlobalArgs) -> Result<()> {
    let mut config = load_runtime_config(global.config.clone()).await?;
    args.tuning.apply(&mut config);
    config.validate()?;

    let sources = path_sources(&args.paths).await?;
    let collected = collect_all(sources, config.duplicate_policy)
        .await
        .map_err(IngestError::from)?;
    let (references, excluded) = retain_payload(collected.references);
    let limits = preflight::check(&references, &config)?;

    let total_files = references.len();
    let total_bytes: u64 = references.iter().map(FileReference::size_bytes).sum();

    println!(
        "{} files, {} bytes ({} excluded, {} zero-byte, {} duplicates)",
        total_files,
        total_bytes,
        excluded,
        collected.stats.zero_byte,
        collected.stats.duplicates
    );
    println!(
        "Batch ceilings: {} bytes, {} files",
        limits.max_bytes, limits.max_files
    );

    let mut batch_count = 0;
    for (index, batch) in BatchPlanner::new(references.into_iter(), limits).enumerate() {
        batch_count += 1;
        println!(
            "  Batch {}: {} files, {} bytes",
            index + 1,
            batch.len(),
            batch.total_bytes()
        );
        if args.list_files {
            for file in batch.files() {
                println!("    {} ({}, {} bytes)", file.path(), file.kind(), file.size_bytes());
            }
        }
    }
    println!("{} batches", batch_count);

    Ok(())
}

/// Handle the classify command
pub fn handle_classify(args: ClassifyArgs) -> Result<()> {
    for name in &args.names {
        let verdict = if should_exclude(name) {
            "excluded".to_string()
        } else {
            classify(name).to_string()
        };
        println!("{}\t{}", verdict, name);
    }
    Ok(())
}

/// Handle configuration management
pub async fn handle_config(args: ConfigArgs, global: &GlobalArgs) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            print!("{}", AppConfig::generate_default_config_content());
        }
        ConfigAction::Effective => {
            let app_config = AppConfig::load(global.config.clone()).await?;
            app_config.to_runtime_config()?;
            let rendered = toml::to_string_pretty(&app_config)
                .map_err(|e| AppError::generic(format!("Failed to render configuration: {}", e)))?;
            print!("{}", rendered);
        }
        ConfigAction::Path => match AppConfig::default_config_path() {
            Some(path) => println!("{}", path.display()),
            None => {
                return Err(AppError::generic(
                    "No user configuration directory on this platform",
                ))
            }
        },
    }
    Ok(())
}
