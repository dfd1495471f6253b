//! Analysis collaborator contract
//!
//! The analyzer turns one batch of loaded files into an opaque output. The
//! executor invokes it exactly once per batch and hands over ownership of the
//! batch's buffers, so they are released as soon as the analyzer finishes.
//!
//! Closures can be used directly through [`analyzer_fn`]. [`DigestAnalyzer`]
//! is a small built-in collaborator used by the CLI: it records an MD5 digest
//! and length for every file without interpreting its content.

use std::future::Future;

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use super::models::{FileKind, LoadedFile};
use crate::errors::{AnalysisError, AnalysisResult};

/// External step turning raw bytes into domain records
pub trait Analyzer: Send + Sync {
    /// Per-batch output
    type Output: Send + 'static;

    /// Analyze one batch; `batch_index` is zero-based
    fn analyze(
        &self,
        files: Vec<LoadedFile>,
        batch_index: usize,
        total_batches: usize,
    ) -> BoxFuture<'_, AnalysisResult<Self::Output>>;
}

/// Analyzer backed by a closure
#[derive(Debug, Clone)]
pub struct FnAnalyzer<F> {
    f: F,
}

/// Wrap a closure returning a future as an [`Analyzer`]
///
/// # Example
///
/// ```rust
/// use dicom_ingest::app::analysis::analyzer_fn;
///
/// let analyzer = analyzer_fn(|files, _index, _total| async move {
///     Ok(files.iter().map(|f| f.content.len()).sum::<usize>())
/// });
/// # let _ = analyzer;
/// ```
pub fn analyzer_fn<F, Fut, T>(f: F) -> FnAnalyzer<F>
where
    F: Fn(Vec<LoadedFile>, usize, usize) -> Fut + Send + Sync,
    Fut: Future<Output = AnalysisResult<T>> + Send + 'static,
    T: Send + 'static,
{
    FnAnalyzer { f }
}

impl<F, Fut, T> Analyzer for FnAnalyzer<F>
where
    F: Fn(Vec<LoadedFile>, usize, usize) -> Fut + Send + Sync,
    Fut: Future<Output = AnalysisResult<T>> + Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn analyze(
        &self,
        files: Vec<LoadedFile>,
        batch_index: usize,
        total_batches: usize,
    ) -> BoxFuture<'_, AnalysisResult<T>> {
        (self.f)(files, batch_index, total_batches).boxed()
    }
}

/// Digest of one ingested file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDigest {
    /// Unique relative path
    pub path: String,
    /// Classification
    pub kind: FileKind,
    /// Bytes loaded
    pub size_bytes: u64,
    /// Lower-case hex MD5 of the content
    pub md5: String,
}

/// Built-in analyzer hashing every file of a batch on the blocking pool
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestAnalyzer;

impl Analyzer for DigestAnalyzer {
    type Output = Vec<FileDigest>;

    fn analyze(
        &self,
        files: Vec<LoadedFile>,
        batch_index: usize,
        _total_batches: usize,
    ) -> BoxFuture<'_, AnalysisResult<Vec<FileDigest>>> {
        async move {
            tokio::task::spawn_blocking(move || {
                files
                    .into_iter()
                    .map(|file| FileDigest {
                        md5: format!("{:x}", md5::compute(&file.content)),
                        size_bytes: file.content.len() as u64,
                        kind: file.kind,
                        path: file.path,
                    })
                    .collect()
            })
            .await
            .map_err(|e| AnalysisError::rejected(batch_index, e))
        }
        .boxed()
    }
}
