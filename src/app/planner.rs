//! Batch planning
//!
//! Greedy single pass over the filtered references. Before adding the next
//! reference, the open batch is closed if adding it would exceed either the
//! byte or the file-count ceiling and the batch already has members. A
//! reference is always placed, so a file larger than the byte ceiling ends
//! up alone in its own batch instead of being split or dropped.
//!
//! [`BatchPlanner`] is a lazy iterator: the first batch is available as soon
//! as enough references have been pulled from the input, without materialising
//! the whole plan.

use serde::{Deserialize, Serialize};

use super::models::{Batch, FileReference};
use crate::constants::batching;

/// Byte and count ceilings for one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLimits {
    /// Cumulative byte ceiling
    pub max_bytes: u64,
    /// File count ceiling
    pub max_files: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_bytes: batching::DEFAULT_MAX_BATCH_SIZE_BYTES,
            max_files: batching::DEFAULT_MAX_BATCH_FILE_COUNT,
        }
    }
}

impl BatchLimits {
    /// Create limits from explicit ceilings
    pub fn new(max_bytes: u64, max_files: usize) -> Self {
        Self {
            max_bytes,
            max_files,
        }
    }

    /// Whether a file of `size` must start a new batch given the open batch's totals
    fn closes_open_batch(&self, open_bytes: u64, open_files: usize, size: u64) -> bool {
        open_files > 0
            && (open_bytes.saturating_add(size) > self.max_bytes
                || open_files + 1 > self.max_files)
    }
}

/// Lazy batch generator over an ordered reference sequence
#[derive(Debug)]
pub struct BatchPlanner<I> {
    references: I,
    limits: BatchLimits,
    carry: Option<FileReference>,
}

impl<I> BatchPlanner<I>
where
    I: Iterator<Item = FileReference>,
{
    /// Create a planner over the given references
    pub fn new(references: I, limits: BatchLimits) -> Self {
        Self {
            references,
            limits,
            carry: None,
        }
    }

    /// Limits this planner enforces
    pub fn limits(&self) -> BatchLimits {
        self.limits
    }
}

impl<I> Iterator for BatchPlanner<I>
where
    I: Iterator<Item = FileReference>,
{
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let mut batch = Batch::new();

        while let Some(file) = self.carry.take().or_else(|| self.references.next()) {
            if self
                .limits
                .closes_open_batch(batch.total_bytes(), batch.len(), file.size_bytes())
            {
                self.carry = Some(file);
                break;
            }
            batch.push(file);
        }

        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}

/// Plan all batches eagerly
pub fn plan(references: Vec<FileReference>, limits: BatchLimits) -> Vec<Batch> {
    BatchPlanner::new(references.into_iter(), limits).collect()
}

/// Number of batches the planner will produce for these sizes, without building them
pub fn count_batches<S>(sizes: S, limits: BatchLimits) -> usize
where
    S: IntoIterator<Item = u64>,
{
    let mut batches = 0;
    let mut open_bytes: u64 = 0;
    let mut open_files: usize = 0;

    for size in sizes {
        if limits.closes_open_batch(open_bytes, open_files, size) {
            batches += 1;
            open_bytes = 0;
            open_files = 0;
        }
        open_bytes = open_bytes.saturating_add(size);
        open_files += 1;
    }

    if open_files > 0 {
        batches += 1;
    }
    batches
}
