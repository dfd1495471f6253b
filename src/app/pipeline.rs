//! End-to-end ingestion
//!
//! [`Ingestor`] strings the engine together: collect every source, drop
//! non-payload files, size the run, plan batches lazily, execute them and
//! aggregate the results.
//!
//! Failures before the first byte is read (invalid configuration, a denied
//! source, the single-shot ceiling) return an [`IngestError`]. Once execution
//! has started, the run always produces an [`IngestReport`]; a run that stops
//! early carries its terminal state and whatever the completed batches
//! produced.

use tokio::sync::{broadcast, mpsc};
use tracing::info;

use super::aggregate::Aggregator;
use super::analysis::Analyzer;
use super::classify::retain_payload;
use super::executor::{BatchExecutor, ExecutorConfig, IngestReport, ProgressSnapshot};
use super::models::FileReference;
use super::planner::{count_batches, BatchPlanner};
use super::preflight;
use super::source::{collect_all, FileSource};
use crate::errors::{IngestError, IngestResult};

/// Configured ingestion run
#[derive(Debug)]
pub struct Ingestor {
    config: ExecutorConfig,
    progress_tx: Option<mpsc::Sender<ProgressSnapshot>>,
    cancel_rx: Option<broadcast::Receiver<()>>,
}

impl Ingestor {
    /// Create an ingestor with the given configuration
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            progress_tx: None,
            cancel_rx: None,
        }
    }

    /// Publish progress snapshots on this channel
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressSnapshot>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Stop at the next batch boundary once this receiver observes a message
    pub fn with_cancellation(mut self, cancel_rx: broadcast::Receiver<()>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Ingest every source through the analyzer and merge with the aggregator
    ///
    /// # Errors
    ///
    /// Returns `IngestError` for terminal pre-flight failures
    pub async fn run<A, G>(
        self,
        sources: Vec<FileSource>,
        analyzer: &A,
        aggregator: &G,
    ) -> IngestResult<IngestReport<G::Output>>
    where
        A: Analyzer + ?Sized,
        G: Aggregator<A::Output>,
    {
        let mut executor = BatchExecutor::new(self.config)?;
        if let Some(tx) = self.progress_tx {
            executor = executor.with_progress(tx);
        }
        if let Some(rx) = self.cancel_rx {
            executor = executor.with_cancellation(rx);
        }
        executor.begin_planning();

        let collected = match collect_all(sources, executor.config().duplicate_policy).await {
            Ok(collected) => collected,
            Err(e) => {
                let e = IngestError::from(e);
                executor.fail(e.to_string());
                return Err(e);
            }
        };

        let collect_stats = collected.stats.clone();
        let (references, excluded) = retain_payload(collected.references);
        if excluded > 0 {
            info!("Excluded {} non-payload files", excluded);
        }

        let limits = match preflight::check(&references, executor.config()) {
            Ok(limits) => limits,
            Err(e) => {
                executor.fail(e.to_string());
                return Err(e);
            }
        };

        let total_files = references.len();
        let total_batches =
            count_batches(references.iter().map(FileReference::size_bytes), limits);
        info!(
            "Planned {} files into {} batches (ceilings: {} bytes, {} files)",
            total_files, total_batches, limits.max_bytes, limits.max_files
        );

        let batches = BatchPlanner::new(references.into_iter(), limits);
        let execution = executor
            .execute(batches, total_files, total_batches, analyzer)
            .await;

        Ok(executor.finish(execution, aggregator, collect_stats))
    }
}
