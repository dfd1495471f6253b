//! Progress reporting
//!
//! The executor is the only writer of progress state. Every change is
//! published as an immutable [`ProgressSnapshot`] through a bounded channel
//! with `try_send`, so a slow or absent consumer never stalls ingestion;
//! snapshots that do not fit are dropped and counted.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

use crate::app::reader::ReadProgress;

/// Point-in-time view of an ingestion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Files planned for this run
    pub total_files: usize,
    /// Files whose read or analysis has settled
    pub processed_files: usize,
    /// Files recorded as failed so far
    pub failed_files: usize,
    /// Zero-based index of the batch in flight
    pub current_batch_index: usize,
    /// Batches planned for this run
    pub total_batches: usize,
    /// Completion of the batch in flight, 0 to 100
    pub current_batch_progress_pct: f64,
    /// Human-readable phase description
    pub operation_label: String,
    /// File being streamed, or the last file whose read settled
    pub current_file_name: Option<String>,
    /// Bytes read of the file being streamed
    pub current_file_bytes: Option<u64>,
    /// Size of the file being streamed
    pub current_file_total: Option<u64>,
}

impl ProgressSnapshot {
    /// Overall completion by processed files, 0 to 100
    pub fn overall_pct(&self) -> f64 {
        if self.total_files == 0 {
            return 0.0;
        }
        (self.processed_files as f64 / self.total_files as f64) * 100.0
    }
}

/// Single-writer progress state publishing snapshots
#[derive(Debug)]
pub struct ProgressReporter {
    tx: Option<mpsc::Sender<ProgressSnapshot>>,
    snapshot: ProgressSnapshot,
    batch_len: usize,
    batch_settled: usize,
    dropped: u64,
}

impl ProgressReporter {
    /// Create a reporter; `None` disables publishing
    pub fn new(
        tx: Option<mpsc::Sender<ProgressSnapshot>>,
        total_files: usize,
        total_batches: usize,
    ) -> Self {
        Self {
            tx,
            snapshot: ProgressSnapshot {
                total_files,
                processed_files: 0,
                failed_files: 0,
                current_batch_index: 0,
                total_batches,
                current_batch_progress_pct: 0.0,
                operation_label: "Planning".to_string(),
                current_file_name: None,
                current_file_bytes: None,
                current_file_total: None,
            },
            batch_len: 0,
            batch_settled: 0,
            dropped: 0,
        }
    }

    /// Latest snapshot
    pub fn snapshot(&self) -> &ProgressSnapshot {
        &self.snapshot
    }

    /// Snapshots dropped because the channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Record and publish the planned totals before the first batch
    pub fn planned(&mut self, total_files: usize, total_batches: usize) {
        self.snapshot.total_files = total_files;
        self.snapshot.total_batches = total_batches;
        self.snapshot.operation_label = format!(
            "Planned {} files in {} batches",
            self.snapshot.total_files, self.snapshot.total_batches
        );
        self.publish();
    }

    /// A batch starts loading
    pub fn begin_batch(&mut self, batch_index: usize, file_count: usize) {
        self.batch_len = file_count;
        self.batch_settled = 0;
        self.snapshot.current_batch_index = batch_index;
        self.snapshot.current_batch_progress_pct = 0.0;
        self.snapshot.operation_label = format!(
            "Loading batch {}/{}",
            batch_index + 1,
            self.snapshot.total_batches
        );
        self.clear_file();
        self.publish();
    }

    /// Chunk-level progress of a streamed file
    pub fn file_progress(&mut self, name: &str, progress: ReadProgress) {
        self.snapshot.current_file_name = Some(name.to_string());
        self.snapshot.current_file_bytes = Some(progress.bytes_read);
        self.snapshot.current_file_total = Some(progress.total_bytes);
        self.publish();
    }

    /// One file's read has settled
    pub fn file_settled(&mut self, path: &str, succeeded: bool) {
        self.batch_settled += 1;
        if !succeeded {
            self.snapshot.processed_files += 1;
            self.snapshot.failed_files += 1;
        }
        self.snapshot.current_batch_progress_pct = if self.batch_len == 0 {
            100.0
        } else {
            (self.batch_settled as f64 / self.batch_len as f64) * 100.0
        };
        self.snapshot.current_file_name = Some(path.to_string());
        self.snapshot.current_file_bytes = None;
        self.snapshot.current_file_total = None;
        self.publish();
    }

    /// Loaded files were handed to the analyzer
    pub fn analyzing(&mut self) {
        self.snapshot.operation_label = format!(
            "Analyzing batch {}/{}",
            self.snapshot.current_batch_index + 1,
            self.snapshot.total_batches
        );
        self.publish();
    }

    /// Analysis settled for `loaded` files, `failed` of which are now failures
    pub fn batch_finished(&mut self, loaded: usize, failed: usize) {
        self.snapshot.processed_files += loaded;
        self.snapshot.failed_files += failed;
        self.snapshot.current_batch_progress_pct = 100.0;
        self.snapshot.operation_label = format!(
            "Finished batch {}/{}",
            self.snapshot.current_batch_index + 1,
            self.snapshot.total_batches
        );
        self.publish();
    }

    /// Final label for a terminal state
    pub fn finish(&mut self, label: impl Into<String>) {
        self.snapshot.operation_label = label.into();
        self.clear_file();
        self.publish();
    }

    fn clear_file(&mut self) {
        self.snapshot.current_file_name = None;
        self.snapshot.current_file_bytes = None;
        self.snapshot.current_file_total = None;
    }

    fn publish(&mut self) {
        let Some(tx) = &self.tx else {
            return;
        };

        match tx.try_send(self.snapshot.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                trace!("Progress channel full, snapshot dropped");
            }
            Err(TrySendError::Closed(_)) => {
                trace!("Progress receiver gone, publishing disabled");
                self.tx = None;
            }
        }
    }
}
