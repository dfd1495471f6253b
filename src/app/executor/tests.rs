//! Unit tests for the batch executor
//!
//! Component tests for the executor's submodules live next to them; these
//! cover the batch loop end to end over in-memory sources.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};

use crate::app::aggregate::ConcatOutputs;
use crate::app::analysis::analyzer_fn;
use crate::app::models::{FileKind, FileReference};
use crate::app::planner::{count_batches, plan, BatchLimits};
use crate::app::source::memory::MemoryFile;
use crate::app::source::{ByteStream, FileHandle};
use crate::errors::AnalysisResult;

use super::*;

#[derive(Debug)]
struct UnreadableFile(String);

impl FileHandle for UnreadableFile {
    fn name(&self) -> &str {
        &self.0
    }

    fn metadata_len(&self) -> BoxFuture<'_, io::Result<u64>> {
        future::ready(Ok(4)).boxed()
    }

    fn read_all(&self) -> BoxFuture<'_, io::Result<Vec<u8>>> {
        future::ready(Err(io::Error::new(io::ErrorKind::Other, "device removed"))).boxed()
    }

    fn open_stream(&self) -> BoxFuture<'_, io::Result<ByteStream>> {
        future::ready(Err(io::Error::new(io::ErrorKind::Other, "device removed"))).boxed()
    }
}

/// Four-byte files named f0.dcm .. f{n-1}.dcm; the listed indices cannot be read
fn references(count: usize, unreadable: &[usize]) -> Vec<FileReference> {
    (0..count)
        .map(|i| {
            let name = format!("f{}.dcm", i);
            let handle: Arc<dyn FileHandle> = if unreadable.contains(&i) {
                Arc::new(UnreadableFile(name.clone()))
            } else {
                Arc::new(MemoryFile::new(name.clone(), vec![i as u8; 4]))
            };
            FileReference::new(name, 4, FileKind::Dicom, handle)
        })
        .collect()
}

fn executor() -> BatchExecutor {
    let mut executor = BatchExecutor::new(ConfigPresets::testing()).unwrap();
    executor.begin_planning();
    executor
}

/// Paths seen by the analyzer per batch
type Calls = Arc<Mutex<Vec<(usize, Vec<String>)>>>;

fn recording_analyzer(
    calls: Calls,
) -> impl Analyzer<Output = Vec<String>> {
    analyzer_fn(move |files: Vec<LoadedFile>, index, _total| {
        let calls = Arc::clone(&calls);
        async move {
            let paths: Vec<String> = files.iter().map(|f| f.path.clone()).collect();
            calls.lock().unwrap().push((index, paths.clone()));
            AnalysisResult::Ok(paths)
        }
    })
}

/// Ten files with the fifth unreadable: nine reach the analyzer, one error record
#[tokio::test]
async fn test_single_read_failure_is_isolated() {
    let calls: Calls = Arc::default();
    let refs = references(10, &[4]);
    let limits = BatchLimits::new(u64::MAX, 100);

    let mut executor = executor();
    let execution = executor
        .execute(plan(refs, limits), 10, 1, &recording_analyzer(Arc::clone(&calls)))
        .await;
    let report = executor.finish(execution, &ConcatOutputs, CollectStats::default());

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.len(), 9);
    assert!(!calls[0].1.contains(&"f4.dcm".to_string()));

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].path, "f4.dcm");
    assert_eq!(report.result.len(), 9);
    assert_eq!(report.state, IngestState::Done);
    assert!(report.is_partial_success());
    assert_eq!(report.summary(), "1 of 10 files failed");
}

/// Batches are analyzed once each, in order, with their members in order
#[tokio::test]
async fn test_batches_run_serially_in_order() {
    let calls: Calls = Arc::default();
    let refs = references(7, &[]);
    let limits = BatchLimits::new(u64::MAX, 3);
    let total_batches = count_batches(refs.iter().map(FileReference::size_bytes), limits);

    let mut executor = executor();
    let execution = executor
        .execute(
            plan(refs, limits),
            7,
            total_batches,
            &recording_analyzer(Arc::clone(&calls)),
        )
        .await;

    assert_eq!(total_batches, 3);
    let calls = calls.lock().unwrap();
    let indices: Vec<usize> = calls.iter().map(|(i, _)| *i).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(calls[0].1, vec!["f0.dcm", "f1.dcm", "f2.dcm"]);
    assert_eq!(calls[2].1, vec!["f6.dcm"]);
    assert_eq!(execution.stats.batches_completed, 3);
    assert_eq!(execution.stats.bytes_loaded, 28);
}

/// Shared record of which batches have reads in flight
#[derive(Debug, Default)]
struct BatchGauge {
    in_flight: Mutex<Vec<usize>>,
    analyzing: AtomicBool,
    overlaps: AtomicUsize,
    reads: AtomicUsize,
}

/// Four-byte file that reports its batch to the gauge while being read
#[derive(Debug)]
struct GaugedFile {
    name: String,
    batch_index: usize,
    gauge: Arc<BatchGauge>,
}

impl FileHandle for GaugedFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn metadata_len(&self) -> BoxFuture<'_, io::Result<u64>> {
        future::ready(Ok(4)).boxed()
    }

    fn read_all(&self) -> BoxFuture<'_, io::Result<Vec<u8>>> {
        async move {
            self.gauge.reads.fetch_add(1, Ordering::SeqCst);
            if self.gauge.analyzing.load(Ordering::SeqCst) {
                self.gauge.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            {
                let mut in_flight = self.gauge.in_flight.lock().unwrap();
                if in_flight.iter().any(|&b| b != self.batch_index) {
                    self.gauge.overlaps.fetch_add(1, Ordering::SeqCst);
                }
                in_flight.push(self.batch_index);
            }

            tokio::time::sleep(Duration::from_millis(2)).await;

            let mut in_flight = self.gauge.in_flight.lock().unwrap();
            if let Some(pos) = in_flight.iter().position(|&b| b == self.batch_index) {
                in_flight.remove(pos);
            }
            Ok(vec![self.batch_index as u8; 4])
        }
        .boxed()
    }

    fn open_stream(&self) -> BoxFuture<'_, io::Result<ByteStream>> {
        future::ready(Err(io::Error::from(io::ErrorKind::Unsupported))).boxed()
    }
}

/// No read of the next batch starts before the previous analysis returns
#[tokio::test]
async fn test_batches_never_overlap() {
    let gauge = Arc::new(BatchGauge::default());
    let per_batch = 3;
    let refs: Vec<FileReference> = (0..9)
        .map(|i| {
            let name = format!("g{}.dcm", i);
            let handle: Arc<dyn FileHandle> = Arc::new(GaugedFile {
                name: name.clone(),
                batch_index: i / per_batch,
                gauge: Arc::clone(&gauge),
            });
            FileReference::new(name, 4, FileKind::Dicom, handle)
        })
        .collect();

    let analysis_gauge = Arc::clone(&gauge);
    let analyzer = analyzer_fn(move |files: Vec<LoadedFile>, index, _total| {
        let gauge = Arc::clone(&analysis_gauge);
        async move {
            if !gauge.in_flight.lock().unwrap().is_empty() {
                gauge.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            gauge.analyzing.store(true, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            gauge.analyzing.store(false, Ordering::SeqCst);
            Ok(vec![(index, files.len())])
        }
    });

    let mut executor = executor();
    let execution = executor
        .execute(
            plan(refs, BatchLimits::new(u64::MAX, per_batch)),
            9,
            3,
            &analyzer,
        )
        .await;
    let report = executor.finish(execution, &ConcatOutputs, CollectStats::default());

    assert_eq!(gauge.reads.load(Ordering::SeqCst), 9);
    assert_eq!(gauge.overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(report.result, vec![(0, 3), (1, 3), (2, 3)]);
}

/// A failing batch in the middle leaves its neighbours intact
#[tokio::test]
async fn test_analysis_failure_is_batch_local() {
    let analyzer = analyzer_fn(|files: Vec<LoadedFile>, index, _total| async move {
        if index == 1 {
            Err(AnalysisError::rejected(index, "unsupported transfer syntax"))
        } else {
            Ok(files.len())
        }
    });

    let mut executor = executor();
    let execution = executor
        .execute(
            plan(references(6, &[]), BatchLimits::new(u64::MAX, 2)),
            6,
            3,
            &analyzer,
        )
        .await;

    let aggregated = |results: Vec<BatchResult<usize>>| {
        results
            .iter()
            .map(|r| (r.batch_index, r.output))
            .collect::<Vec<_>>()
    };
    let report = executor.finish(execution, &aggregated, CollectStats::default());

    assert_eq!(report.result, vec![(0, Some(2)), (1, None), (2, Some(2))]);
    let failed: Vec<&str> = report.errors.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(failed, vec!["f2.dcm", "f3.dcm"]);
    assert!(report.errors[0].message.contains("unsupported transfer syntax"));
    assert_eq!(report.stats.batches_failed, 1);
    assert_eq!(report.stats.files_failed, 2);
    assert_eq!(report.state, IngestState::Done);
}

/// A panicking analyzer fails only its batch
#[tokio::test]
async fn test_analyzer_panic_is_contained() {
    let analyzer = analyzer_fn(|files: Vec<LoadedFile>, index, _total| async move {
        if index == 0 {
            panic!("analyzer bug");
        }
        Ok(files.len())
    });

    let mut executor = executor();
    let execution = executor
        .execute(
            plan(references(4, &[]), BatchLimits::new(u64::MAX, 2)),
            4,
            2,
            &analyzer,
        )
        .await;

    assert_eq!(execution.results.len(), 2);
    assert!(execution.results[0].output.is_none());
    assert_eq!(execution.results[1].output, Some(2));
    assert!(execution.errors[0].message.contains("panicked"));
}

/// A broken analyzer contract stops the run but keeps completed batches
#[tokio::test]
async fn test_contract_broken_fails_with_partial_results() {
    let analyzer = analyzer_fn(|files: Vec<LoadedFile>, index, _total| async move {
        if index == 1 {
            Err(AnalysisError::ContractBroken {
                batch_index: index,
                reason: "out of memory".to_string(),
            })
        } else {
            Ok(vec![files.len()])
        }
    });

    let mut executor = executor();
    let execution = executor
        .execute(
            plan(references(6, &[]), BatchLimits::new(u64::MAX, 2)),
            6,
            3,
            &analyzer,
        )
        .await;
    assert!(matches!(executor.state(), IngestState::Failed { .. }));

    let report = executor.finish(execution, &ConcatOutputs, CollectStats::default());
    assert_eq!(report.result, vec![2]);
    assert_eq!(report.stats.batches_processed(), 2);
    assert!(matches!(report.state, IngestState::Failed { .. }));
    assert!(report.is_partial_success());
    assert!(report
        .summary()
        .ends_with("after 2 of 3 batches, 2 of 6 files failed"));
}

/// Cancellation requested during a batch takes effect at the next boundary
#[tokio::test]
async fn test_cancellation_at_batch_boundary() {
    let (cancel_tx, cancel_rx) = create_cancel_channel();
    let analyzer = analyzer_fn(move |files: Vec<LoadedFile>, _index, _total| {
        let _ = cancel_tx.send(());
        async move { Ok(vec![files.len()]) }
    });

    let mut executor = BatchExecutor::new(ConfigPresets::testing())
        .unwrap()
        .with_cancellation(cancel_rx);
    executor.begin_planning();
    let execution = executor
        .execute(
            plan(references(6, &[]), BatchLimits::new(u64::MAX, 2)),
            6,
            3,
            &analyzer,
        )
        .await;

    assert_eq!(executor.state(), &IngestState::Cancelled);
    let report = executor.finish(execution, &ConcatOutputs, CollectStats::default());
    assert_eq!(report.result, vec![2]);
    assert_eq!(report.state, IngestState::Cancelled);
    assert!(report.summary().starts_with("Cancelled after 1 of 3"));
}

/// An empty plan aggregates nothing and completes
#[tokio::test]
async fn test_empty_plan_completes() {
    let calls: Calls = Arc::default();
    let mut executor = executor();
    let execution = executor
        .execute(Vec::<Batch>::new(), 0, 0, &recording_analyzer(Arc::clone(&calls)))
        .await;
    let report = executor.finish(execution, &ConcatOutputs, CollectStats::default());

    assert!(calls.lock().unwrap().is_empty());
    assert!(report.result.is_empty());
    assert!(report.is_complete_success());
}

/// Progress snapshots track files and end with the run summary
#[tokio::test]
async fn test_progress_snapshots() {
    let (tx, mut rx) = mpsc::channel(256);
    let mut executor = BatchExecutor::new(ConfigPresets::testing())
        .unwrap()
        .with_progress(tx);
    executor.begin_planning();

    let calls: Calls = Arc::default();
    let execution = executor
        .execute(
            plan(references(5, &[1]), BatchLimits::new(u64::MAX, 2)),
            5,
            3,
            &recording_analyzer(calls),
        )
        .await;
    executor.finish(execution, &ConcatOutputs, CollectStats::default());

    let mut snapshots = Vec::new();
    while let Ok(snapshot) = rx.try_recv() {
        snapshots.push(snapshot);
    }

    let batch_indices: Vec<usize> = snapshots.iter().map(|s| s.current_batch_index).collect();
    assert!(snapshots
        .iter()
        .any(|s| s.current_file_name.as_deref() == Some("f0.dcm")));
    assert!(batch_indices.windows(2).all(|w| w[0] <= w[1]));
    assert!(snapshots.iter().any(|s| s.operation_label == "Analyzing batch 2/3"));

    let last = snapshots.last().unwrap();
    assert_eq!(last.total_files, 5);
    assert_eq!(last.processed_files, 5);
    assert_eq!(last.failed_files, 1);
    assert_eq!(last.operation_label, "1 of 5 files failed");
}

/// Invalid configuration is rejected up front
#[test]
fn test_invalid_config_rejected() {
    let config = ExecutorConfig {
        read_concurrency: 0,
        ..ConfigPresets::testing()
    };
    assert!(BatchExecutor::new(config).is_err());
}
