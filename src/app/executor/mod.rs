//! Batched ingestion execution
//!
//! This module runs a plan of batches strictly one after another. Within a
//! batch every member is read concurrently, the loaded bytes are handed to
//! the analyzer exactly once, and the buffers are released before the next
//! batch starts. Peak memory is therefore bounded by the largest batch
//! rather than by the whole input.
//!
//! # Key Features
//!
//! - **Serial batches**: batch N+1 never starts loading before batch N has
//!   been analyzed and released
//! - **Fault isolation**: a failed read becomes an [`ErrorRecord`] for that
//!   file; a failed analysis becomes one record per loaded member of that
//!   batch; the run continues in both cases
//! - **Progress snapshots**: published through a bounded channel without ever
//!   blocking the run
//! - **Cooperative cancellation**: checked only between batches
//!
//! # Architecture
//!
//! - [`config`] - Tunables, builder and presets
//! - [`pool`] - Concurrent loading of one batch behind a semaphore
//! - [`progress`] - Snapshot publishing
//! - [`state`] - Lifecycle states and legal transitions
//! - [`stats`] - Counters and the final report
//! - [`signals`] - Cancellation channel and OS signal wiring
//!
//! # Examples
//!
//! ```rust,no_run
//! use dicom_ingest::app::analysis::DigestAnalyzer;
//! use dicom_ingest::app::aggregate::ConcatOutputs;
//! use dicom_ingest::app::executor::{BatchExecutor, ExecutorConfig};
//! use dicom_ingest::app::planner::{count_batches, BatchPlanner};
//! use dicom_ingest::app::models::FileReference;
//!
//! # async fn example(references: Vec<FileReference>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExecutorConfig::default();
//! let limits = config.limits();
//! let total_files = references.len();
//! let total_batches = count_batches(references.iter().map(FileReference::size_bytes), limits);
//!
//! let mut executor = BatchExecutor::new(config)?;
//! executor.begin_planning();
//! let execution = executor
//!     .execute(BatchPlanner::new(references.into_iter(), limits), total_files, total_batches, &DigestAnalyzer)
//!     .await;
//! let report = executor.finish(execution, &ConcatOutputs, Default::default());
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod pool;
pub mod progress;
pub mod signals;
pub mod state;
pub mod stats;

#[cfg(test)]
mod tests;

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::app::aggregate::{aggregate, Aggregator};
use crate::app::analysis::Analyzer;
use crate::app::models::{Batch, BatchResult, ErrorRecord, LoadedFile};
use crate::app::source::CollectStats;
use crate::errors::{AnalysisError, IngestResult};

pub use config::{ConfigPresets, ExecutorConfig, ExecutorConfigBuilder};
pub use pool::{LoadEvent, ReadPool};
pub use progress::{ProgressReporter, ProgressSnapshot};
pub use signals::{create_cancel_channel, is_cancel_requested, SignalHandler};
pub use state::IngestState;
pub use stats::{IngestReport, IngestStats};

/// Raw outcome of executing all batches, before aggregation
#[derive(Debug)]
pub struct Execution<T> {
    /// One result per executed batch, in order
    pub results: Vec<BatchResult<T>>,
    /// Every error record, in order
    pub errors: Vec<ErrorRecord>,
    /// Run counters
    pub stats: IngestStats,
}

/// Serial batch executor
///
/// Owns the lifecycle state and the progress reporter; nothing else mutates
/// either.
#[derive(Debug)]
pub struct BatchExecutor {
    config: ExecutorConfig,
    pool: ReadPool,
    state: IngestState,
    reporter: ProgressReporter,
    cancel_rx: Option<broadcast::Receiver<()>>,
}

impl BatchExecutor {
    /// Create an executor after validating the configuration
    pub fn new(config: ExecutorConfig) -> IngestResult<Self> {
        config.validate()?;
        let pool = ReadPool::new(config.reader(), config.read_concurrency);

        Ok(Self {
            config,
            pool,
            state: IngestState::Idle,
            reporter: ProgressReporter::new(None, 0, 0),
            cancel_rx: None,
        })
    }

    /// Publish progress snapshots on this channel
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressSnapshot>) -> Self {
        self.reporter = ProgressReporter::new(Some(tx), 0, 0);
        self
    }

    /// Stop at the next batch boundary once this receiver observes a message
    pub fn with_cancellation(mut self, cancel_rx: broadcast::Receiver<()>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> &IngestState {
        &self.state
    }

    /// Active configuration
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Latest progress snapshot
    pub fn snapshot(&self) -> &ProgressSnapshot {
        self.reporter.snapshot()
    }

    /// Enter the planning phase
    pub fn begin_planning(&mut self) {
        self.transition(IngestState::Planning);
    }

    /// Fail the run before or during execution
    pub fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        error!("Ingestion failed: {}", reason);
        self.reporter.finish(format!("Failed: {}", reason));
        self.transition(IngestState::Failed { reason });
    }

    /// Execute batches in order
    ///
    /// `total_files` and `total_batches` are the planned totals used for
    /// progress; the batch source may be lazy.
    pub async fn execute<I, A>(
        &mut self,
        batches: I,
        total_files: usize,
        total_batches: usize,
        analyzer: &A,
    ) -> Execution<A::Output>
    where
        I: IntoIterator<Item = Batch>,
        A: Analyzer + ?Sized,
    {
        let mut execution = Execution {
            results: Vec::with_capacity(total_batches),
            errors: Vec::new(),
            stats: IngestStats::new_with_plan(total_files, total_batches),
        };

        info!(
            "Executing {} batches over {} files ({} concurrent reads)",
            total_batches,
            total_files,
            self.pool.width()
        );
        self.reporter.planned(total_files, total_batches);

        let mut batches = batches.into_iter().enumerate().peekable();
        while let Some((batch_index, batch)) = batches.next() {
            if self.cancel_requested() {
                info!(
                    "Cancellation requested, stopping before batch {}/{}",
                    batch_index + 1,
                    total_batches
                );
                self.transition(IngestState::Cancelled);
                break;
            }

            let broken = self
                .run_batch(batch_index, total_batches, batch, analyzer, &mut execution)
                .await;

            if let Some(e) = broken {
                self.fail(e.to_string());
                break;
            }

            if batches.peek().is_some() {
                self.pause().await;
            }
        }

        execution.stats.update_duration();
        execution
    }

    /// Aggregate the execution and build the final report
    ///
    /// The aggregator runs once over the ordered results, also for cancelled
    /// or failed runs, so completed batches are never lost.
    pub fn finish<T, G>(
        &mut self,
        execution: Execution<T>,
        aggregator: &G,
        collect_stats: CollectStats,
    ) -> IngestReport<G::Output>
    where
        G: Aggregator<T>,
    {
        let Execution {
            results,
            errors,
            mut stats,
        } = execution;

        let completed = !self.state.is_terminal();
        if completed {
            self.transition(IngestState::Aggregating);
            self.reporter.finish("Aggregating results");
        }

        debug!("Aggregating {} batch results", results.len());
        let result = aggregate(results, aggregator);

        if completed {
            self.transition(IngestState::Done);
        }
        stats.update_duration();

        let report = IngestReport {
            result,
            errors,
            stats,
            collect_stats,
            state: self.state.clone(),
        };

        let summary = report.summary();
        info!("{} in {:?}", summary, report.stats.session_duration);
        self.reporter.finish(summary);
        report
    }

    /// Load, analyze and release one batch
    ///
    /// Returns the analysis error when it breaks the run.
    async fn run_batch<A>(
        &mut self,
        batch_index: usize,
        total_batches: usize,
        batch: Batch,
        analyzer: &A,
        execution: &mut Execution<A::Output>,
    ) -> Option<AnalysisError>
    where
        A: Analyzer + ?Sized,
    {
        let file_count = batch.len();
        debug!(
            "Loading batch {}/{}: {} files, {} bytes",
            batch_index + 1,
            total_batches,
            file_count,
            batch.total_bytes()
        );
        self.transition(IngestState::Loading { batch_index });
        self.reporter.begin_batch(batch_index, file_count);

        let reporter = &mut self.reporter;
        let outcomes = self
            .pool
            .load(&batch, |event| match event {
                LoadEvent::Chunk { path, progress } => reporter.file_progress(path, progress),
                LoadEvent::Settled { path, succeeded } => reporter.file_settled(path, succeeded),
            })
            .await;
        drop(batch);

        let mut batch_errors = Vec::new();
        let mut loaded: Vec<LoadedFile> = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Ok(file) => loaded.push(file),
                Err(e) => {
                    warn!("Skipping {}: {}", e.path(), e);
                    batch_errors.push(ErrorRecord::new(e.path(), e.to_string()));
                }
            }
        }

        let loaded_paths: Vec<String> = loaded.iter().map(|f| f.path.clone()).collect();
        let loaded_bytes: u64 = loaded.iter().map(|f| f.len() as u64).sum();
        execution.stats.files_failed += batch_errors.len();
        execution.stats.files_loaded += loaded_paths.len();
        execution.stats.bytes_loaded += loaded_bytes;

        self.transition(IngestState::Analyzing { batch_index });
        self.reporter.analyzing();

        // The analyzer takes ownership of the buffers; they are freed when it returns.
        let analysis = AssertUnwindSafe(async move {
            analyzer.analyze(loaded, batch_index, total_batches).await
        })
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            error!(
                "Analyzer panicked on batch {}: {}",
                batch_index + 1,
                pool::panic_message(panic.as_ref())
            );
            Err(AnalysisError::Panicked { batch_index })
        });

        self.transition(IngestState::Releasing { batch_index });

        let mut broken = None;
        let output = match analysis {
            Ok(output) => {
                execution.stats.batches_completed += 1;
                self.reporter.batch_finished(loaded_paths.len(), 0);
                Some(output)
            }
            Err(e) => {
                warn!(
                    "Analysis of batch {}/{} failed: {}",
                    batch_index + 1,
                    total_batches,
                    e
                );
                let message = e.to_string();
                batch_errors.extend(
                    loaded_paths
                        .iter()
                        .map(|path| ErrorRecord::new(path.as_str(), message.as_str())),
                );
                execution.stats.batches_failed += 1;
                execution.stats.files_failed += loaded_paths.len();
                self.reporter
                    .batch_finished(loaded_paths.len(), loaded_paths.len());

                if !e.is_batch_local() {
                    broken = Some(e);
                }
                None
            }
        };

        execution.errors.extend(batch_errors.iter().cloned());
        execution.results.push(BatchResult {
            batch_index,
            file_count,
            output,
            errors: batch_errors,
        });

        broken
    }

    /// Yield between batches so the host can reclaim released buffers
    async fn pause(&self) {
        if self.config.inter_batch_pause.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.config.inter_batch_pause).await;
        }
    }

    fn cancel_requested(&mut self) -> bool {
        self.cancel_rx.as_mut().is_some_and(is_cancel_requested)
    }

    fn transition(&mut self, next: IngestState) {
        if !self.state.can_transition_to(&next) {
            warn!("Unexpected state transition {} -> {}", self.state, next);
        }
        debug!("State {} -> {}", self.state, next);
        self.state = next;
    }
}
