//! Integration tests for end-to-end ingestion
//!
//! These drive the public pipeline over in-memory and on-disk sources and
//! check ordering, batching, fault isolation and cancellation as seen by a
//! library caller.

mod common;

use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use tokio::sync::mpsc;

use dicom_ingest::app::executor::ExecutorConfigBuilder;
use dicom_ingest::app::source::FileHandle;
use dicom_ingest::errors::AnalysisError;
use dicom_ingest::prelude::*;

use common::{digest_paths, memory_file, numbered_files, write_file, RevokedFile};

/// A granted study directory on disk is filtered, ordered and digested
#[tokio::test]
async fn test_local_study_directory() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("study");
    write_file(&root, "series2/IM0001", b"second series");
    write_file(&root, "series1/IM0002", b"two");
    write_file(&root, "series1/IM0001", b"one");
    write_file(&root, "series1/.DS_Store", b"junk");
    write_file(&root, "series1/report.txt", b"findings");
    write_file(&root, "series1/empty", b"");
    write_file(&root, "ExamCard.examcard", b"protocol");

    let granted = local::granted(&root).await.unwrap();
    let report = Ingestor::new(ConfigPresets::testing())
        .run(vec![FileSource::Granted(vec![granted])], &DigestAnalyzer, &ConcatOutputs)
        .await
        .unwrap();

    assert_eq!(
        digest_paths(&report),
        vec![
            "ExamCard.examcard",
            "series1/IM0001",
            "series1/IM0002",
            "series2/IM0001",
        ]
    );
    assert_eq!(report.result[0].kind, FileKind::Protocol);
    assert_eq!(report.result[1].md5, format!("{:x}", md5::compute(b"one")));
    assert_eq!(report.collect_stats.zero_byte, 1);
    assert!(report.is_complete_success());
}

/// Batch two of three fails in analysis; batches one and three are preserved
#[tokio::test]
async fn test_middle_batch_failure_preserves_neighbours() {
    let config = ExecutorConfigBuilder::new()
        .max_batch_file_count(2)
        .inter_batch_pause(std::time::Duration::ZERO)
        .build()
        .unwrap();

    let analyzer = analyzer_fn(|files: Vec<LoadedFile>, index, total| async move {
        assert_eq!(total, 3);
        if index == 1 {
            return Err(AnalysisError::rejected(index, "malformed dataset"));
        }
        Ok(files.into_iter().map(|f| f.path).collect::<Vec<_>>())
    });

    let report = Ingestor::new(config)
        .run(vec![FileSource::Files(numbered_files(6))], &analyzer, &ConcatOutputs)
        .await
        .unwrap();

    assert_eq!(report.result, vec!["IM0000", "IM0001", "IM0004", "IM0005"]);
    let failed: Vec<&str> = report.errors.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(failed, vec!["IM0002", "IM0003"]);
    assert_eq!(report.stats.batches_completed, 2);
    assert_eq!(report.stats.batches_failed, 1);
    assert_eq!(report.state, IngestState::Done);
    assert_eq!(report.summary(), "2 of 6 files failed");
}

/// One revoked file is reported alone while its batch siblings are analyzed
#[tokio::test]
async fn test_revoked_file_is_isolated() {
    let mut files = numbered_files(4);
    files.insert(
        2,
        Arc::new(RevokedFile {
            name: "IM_REVOKED".to_string(),
            len: 4,
        }) as Arc<dyn FileHandle>,
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let analyzer = analyzer_fn(move |files: Vec<LoadedFile>, _index, _total| {
        recorder.lock().unwrap().push(files.len());
        async move { Ok(vec![files.len()]) }
    });

    let report = Ingestor::new(ConfigPresets::testing())
        .run(vec![FileSource::Files(files)], &analyzer, &ConcatOutputs)
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![4]);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].path, "IM_REVOKED");
    assert!(report.errors[0].message.contains("ermission"));
    assert!(report.is_partial_success());
    assert_eq!(report.error_lines().len(), 1);
}

/// Files above the streaming threshold arrive intact
#[tokio::test]
async fn test_streamed_file_content_is_exact() {
    let mut rng = fastrand::Rng::with_seed(7);
    let large: Vec<u8> = (0..200 * 1024).map(|_| rng.u8(..)).collect();
    let files = vec![memory_file("big.dcm", &large), memory_file("small.dcm", b"tiny")];

    let report = Ingestor::new(ConfigPresets::testing())
        .run(vec![FileSource::Files(files)], &DigestAnalyzer, &ConcatOutputs)
        .await
        .unwrap();

    assert_eq!(report.result[0].size_bytes, large.len() as u64);
    assert_eq!(report.result[0].md5, format!("{:x}", md5::compute(&large)));
    assert_eq!(report.stats.bytes_loaded, large.len() as u64 + 4);
}

/// Cancellation requested up front stops before the first batch
#[tokio::test]
async fn test_cancelled_before_first_batch() {
    let (cancel_tx, cancel_rx) = create_cancel_channel();
    cancel_tx.send(()).unwrap();

    let report = Ingestor::new(ConfigPresets::testing())
        .with_cancellation(cancel_rx)
        .run(vec![FileSource::Files(numbered_files(3))], &DigestAnalyzer, &ConcatOutputs)
        .await
        .unwrap();

    assert_eq!(report.state, IngestState::Cancelled);
    assert!(report.result.is_empty());
    assert_eq!(report.summary(), "Cancelled after 0 of 1 batches");
}

/// Progress ends with every file processed
#[tokio::test]
async fn test_progress_reaches_total() {
    let (tx, mut rx) = mpsc::channel(1024);
    let config = ExecutorConfig {
        max_batch_file_count: 3,
        ..ConfigPresets::testing()
    };

    Ingestor::new(config)
        .with_progress(tx)
        .run(vec![FileSource::Files(numbered_files(7))], &DigestAnalyzer, &ConcatOutputs)
        .await
        .unwrap();

    let mut last = None;
    while let Some(snapshot) = rx.recv().await {
        assert!(snapshot.processed_files <= snapshot.total_files);
        last = Some(snapshot);
    }
    let last = last.unwrap();
    assert_eq!(last.total_files, 7);
    assert_eq!(last.total_batches, 3);
    assert_eq!(last.processed_files, 7);
    assert_eq!(last.overall_pct(), 100.0);
}

/// Duplicate paths across sources follow the configured policy
#[tokio::test]
async fn test_duplicate_policies() {
    let sources = || {
        vec![
            FileSource::Files(vec![memory_file("IM0001", b"first")]),
            FileSource::Files(vec![memory_file("IM0001", b"second")]),
        ]
    };

    let report = Ingestor::new(ConfigPresets::testing())
        .run(sources(), &DigestAnalyzer, &ConcatOutputs)
        .await
        .unwrap();
    assert_eq!(digest_paths(&report), vec!["IM0001", "IM0001~2"]);

    let keep_first = ExecutorConfig {
        duplicate_policy: DuplicatePolicy::KeepFirst,
        ..ConfigPresets::testing()
    };
    let report = Ingestor::new(keep_first)
        .run(sources(), &DigestAnalyzer, &ConcatOutputs)
        .await
        .unwrap();
    assert_eq!(report.result.len(), 1);
    assert_eq!(report.result[0].md5, format!("{:x}", md5::compute(b"first")));

    let reject = ExecutorConfig {
        duplicate_policy: DuplicatePolicy::Reject,
        ..ConfigPresets::testing()
    };
    let result = Ingestor::new(reject)
        .run(sources(), &DigestAnalyzer, &ConcatOutputs)
        .await;
    assert!(matches!(result, Err(IngestError::Collection { .. })));
}

/// A TOML file drives the runtime configuration
#[tokio::test]
async fn test_config_file_drives_batching() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("dicom-ingest.toml");
    std::fs::write(
        &config_path,
        "[ingest]\nmax_batch_file_count = 2\ninter_batch_pause_ms = 0\nread_concurrency = 2\n",
    )
    .unwrap();

    let config = AppConfig::load(Some(config_path))
        .await
        .unwrap()
        .to_runtime_config()
        .unwrap();

    let report = Ingestor::new(config)
        .run(vec![FileSource::Files(numbered_files(5))], &DigestAnalyzer, &ConcatOutputs)
        .await
        .unwrap();
    assert_eq!(report.stats.batches_total, 3);
    assert_eq!(report.stats.batches_completed, 3);
}
