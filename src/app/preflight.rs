//! Pre-flight sizing
//!
//! Decides the batch ceilings for a run before any byte is read. In batched
//! mode the ceilings come from the configuration or, when a memory budget is
//! given, are derived from it. With batching disabled the whole dataset is
//! loaded in one shot, which is only allowed under a hard ceiling.

use tracing::{debug, info, warn};

use super::executor::ExecutorConfig;
use super::models::FileReference;
use super::planner::BatchLimits;
use crate::constants::batching;
use crate::errors::{IngestError, IngestResult};

/// Derive batch ceilings from a memory budget
///
/// Half of the budget is left for the analyzer's own allocations. The byte
/// ceiling is clamped to the derived range and the file ceiling follows
/// from the average file size.
pub fn derive_limits(total_bytes: u64, total_files: usize, memory_budget: u64) -> BatchLimits {
    let max_bytes = (memory_budget / 2).clamp(
        batching::MIN_DERIVED_BATCH_BYTES,
        batching::MAX_DERIVED_BATCH_BYTES,
    );

    let max_files = if total_files == 0 || total_bytes == 0 {
        batching::DEFAULT_MAX_BATCH_FILE_COUNT
    } else {
        let average = (total_bytes / total_files as u64).max(1);
        usize::try_from(max_bytes / average)
            .unwrap_or(usize::MAX)
            .clamp(1, batching::DEFAULT_MAX_BATCH_FILE_COUNT)
    };

    BatchLimits::new(max_bytes, max_files)
}

/// Batch ceilings for this run, or a terminal error
pub fn check(references: &[FileReference], config: &ExecutorConfig) -> IngestResult<BatchLimits> {
    let total_bytes = references
        .iter()
        .map(FileReference::size_bytes)
        .fold(0u64, u64::saturating_add);

    if !config.streaming_enabled {
        return single_shot(total_bytes);
    }

    let limits = match config.memory_budget_bytes {
        Some(budget) => {
            let derived = derive_limits(total_bytes, references.len(), budget);
            info!(
                "Derived batch limits from {} byte budget: {} bytes, {} files",
                budget, derived.max_bytes, derived.max_files
            );
            derived
        }
        None => config.limits(),
    };

    let oversized = references
        .iter()
        .filter(|f| f.size_bytes() > limits.max_bytes)
        .count();
    if oversized > 0 {
        warn!(
            "{} files exceed the {} byte batch ceiling and will be processed alone",
            oversized, limits.max_bytes
        );
    }

    Ok(limits)
}

/// Legacy path: everything in one batch, under the hard ceiling
fn single_shot(total_bytes: u64) -> IngestResult<BatchLimits> {
    if total_bytes > batching::LEGACY_MAX_TOTAL_BYTES {
        return Err(IngestError::SizeLimitExceeded {
            total: total_bytes,
            limit: batching::LEGACY_MAX_TOTAL_BYTES,
        });
    }

    if total_bytes > batching::LEGACY_WARN_TOTAL_BYTES {
        warn!(
            "Loading {} bytes in one shot; large datasets may exhaust memory",
            total_bytes
        );
    } else {
        debug!("Loading {} bytes in one shot", total_bytes);
    }

    Ok(BatchLimits::new(u64::MAX, usize::MAX))
}
