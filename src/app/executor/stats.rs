//! Ingestion statistics and the final report

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::IngestState;
use crate::app::models::ErrorRecord;
use crate::app::source::CollectStats;

/// Counters for one ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestStats {
    /// Files planned
    pub total_files: usize,
    /// Files read and handed to the analyzer
    pub files_loaded: usize,
    /// Files with an error record
    pub files_failed: usize,
    /// Bytes read into memory over the whole run
    pub bytes_loaded: u64,
    /// Batches planned
    pub batches_total: usize,
    /// Batches whose analysis produced an output
    pub batches_completed: usize,
    /// Batches whose analysis failed
    pub batches_failed: usize,
    /// Start of the run
    pub session_start: DateTime<Utc>,
    /// Elapsed time
    pub session_duration: Duration,
}

impl Default for IngestStats {
    fn default() -> Self {
        Self {
            total_files: 0,
            files_loaded: 0,
            files_failed: 0,
            bytes_loaded: 0,
            batches_total: 0,
            batches_completed: 0,
            batches_failed: 0,
            session_start: Utc::now(),
            session_duration: Duration::ZERO,
        }
    }
}

impl IngestStats {
    /// Create statistics for a planned run
    pub fn new_with_plan(total_files: usize, batches_total: usize) -> Self {
        Self {
            total_files,
            batches_total,
            ..Default::default()
        }
    }

    /// Batches that ran to a result either way
    pub fn batches_processed(&self) -> usize {
        self.batches_completed + self.batches_failed
    }

    /// Share of planned files that were loaded, 0 to 100
    pub fn completion_percentage(&self) -> f64 {
        if self.total_files == 0 {
            return 0.0;
        }
        (self.files_loaded as f64 / self.total_files as f64) * 100.0
    }

    /// Update session duration from start time
    pub fn update_duration(&mut self) {
        self.session_duration = Utc::now()
            .signed_duration_since(self.session_start)
            .to_std()
            .unwrap_or(Duration::ZERO);
    }
}

/// Final result of an ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport<R> {
    /// Aggregated output across completed batches
    pub result: R,
    /// Every per-file failure, in execution order
    pub errors: Vec<ErrorRecord>,
    /// Run counters
    pub stats: IngestStats,
    /// Enumeration counters
    pub collect_stats: CollectStats,
    /// Terminal state
    pub state: IngestState,
}

impl<R> IngestReport<R> {
    /// Whether the run finished normally
    pub fn is_done(&self) -> bool {
        self.state == IngestState::Done
    }

    /// Finished normally with no file errors
    pub fn is_complete_success(&self) -> bool {
        self.is_done() && self.errors.is_empty()
    }

    /// Ended with at least one batch analyzed but not everything ingested
    ///
    /// Holds for cancelled and failed runs too: completed batches keep
    /// their results whatever stopped the run.
    pub fn is_partial_success(&self) -> bool {
        let incomplete = !self.errors.is_empty() || !self.is_done();
        self.state.is_terminal()
            && incomplete
            && self.stats.batches_completed > 0
            && self.stats.files_failed < self.stats.total_files
    }

    fn failed_files_line(&self) -> String {
        format!(
            "{} of {} files failed",
            self.stats.files_failed, self.stats.total_files
        )
    }

    /// One-line outcome, e.g. "3 of 120 files failed"
    ///
    /// Runs that stopped early name how far they got, followed by the
    /// failed-file count when any file failed.
    pub fn summary(&self) -> String {
        let stopped = match &self.state {
            IngestState::Done if self.errors.is_empty() => {
                return format!("All {} files ingested", self.stats.total_files)
            }
            IngestState::Done => return self.failed_files_line(),
            IngestState::Cancelled => format!(
                "Cancelled after {} of {} batches",
                self.stats.batches_processed(),
                self.stats.batches_total
            ),
            other => format!(
                "{} after {} of {} batches",
                other,
                self.stats.batches_processed(),
                self.stats.batches_total
            ),
        };

        if self.errors.is_empty() {
            stopped
        } else {
            format!("{}, {}", stopped, self.failed_files_line())
        }
    }

    /// One "path: message" line per failed file
    pub fn error_lines(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}
