//! DICOM ingest CLI application
//!
//! Command-line interface for memory-bounded batch ingestion of medical-imaging
//! file collections, with progress tracking and per-file error reporting.

use std::process;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use dicom_ingest::cli::{
    handle_classify, handle_config, handle_ingest, handle_plan, Cli, Commands,
};

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    init_logging(&cli)?;

    info!("DICOM ingest v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Ingest(args) => {
            info!("Executing ingest command");
            handle_ingest(args, &cli.global)
                .await
                .context("ingestion failed")
        }
        Commands::Plan(args) => {
            info!("Executing plan command");
            handle_plan(args, &cli.global)
                .await
                .context("planning failed")
        }
        Commands::Classify(args) => handle_classify(args).context("classification failed"),
        Commands::Config(args) => handle_config(args, &cli.global)
            .await
            .context("configuration command failed"),
    }
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let log_level = cli.log_level();

    let directive = format!("dicom_ingest={}", log_level)
        .parse()
        .context("invalid log directive")?;
    let filter = EnvFilter::from_default_env().add_directive(directive);

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .with_writer(std::io::stderr)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
    Ok(())
}
