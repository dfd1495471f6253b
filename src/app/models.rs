//! Core data types flowing through the ingestion pipeline
//!
//! A [`FileReference`] is the content-free handle produced by the file sources.
//! References are grouped into [`Batch`]es by the planner, turned into
//! [`LoadedFile`]s by the reader at execution time, and summarised into one
//! [`BatchResult`] per batch by the executor.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::app::source::FileHandle;

/// Classification of a file by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Imaging payload (default for anything not otherwise recognised)
    Dicom,
    /// Archive to be expanded by the analysis collaborator
    Zip,
    /// Vendor protocol / exam card export
    Protocol,
    /// Not recognised; only produced for names the classifier would exclude
    Unknown,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileKind::Dicom => "dicom",
            FileKind::Zip => "zip",
            FileKind::Protocol => "protocol",
            FileKind::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Lightweight, content-free handle to one input file
///
/// The path is unique within one ingestion run and includes any subdirectory
/// segments joined with `/`. Size is resolved from metadata, never by reading.
#[derive(Debug, Clone)]
pub struct FileReference {
    path: String,
    name: String,
    size_bytes: u64,
    kind: FileKind,
    handle: Arc<dyn FileHandle>,
}

impl FileReference {
    /// Create a new file reference
    pub fn new(
        path: impl Into<String>,
        size_bytes: u64,
        kind: FileKind,
        handle: Arc<dyn FileHandle>,
    ) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        Self {
            path,
            name,
            size_bytes,
            kind,
            handle,
        }
    }

    /// Unique relative path within the run
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Final path segment
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes as reported by metadata
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Classification assigned at collection time
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Capability handle used to read the content
    pub fn handle(&self) -> &Arc<dyn FileHandle> {
        &self.handle
    }

    /// Return a copy of this reference under a different path
    pub(crate) fn with_path(&self, path: String) -> Self {
        Self {
            name: path.rsplit('/').next().unwrap_or(&path).to_string(),
            path,
            size_bytes: self.size_bytes,
            kind: self.kind,
            handle: Arc::clone(&self.handle),
        }
    }
}

/// Ordered group of references processed together, then released
#[derive(Debug, Clone, Default)]
pub struct Batch {
    files: Vec<FileReference>,
    total_bytes: u64,
}

impl Batch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reference, updating the aggregate size
    pub fn push(&mut self, file: FileReference) {
        self.total_bytes = self.total_bytes.saturating_add(file.size_bytes());
        self.files.push(file);
    }

    /// Members in input order
    pub fn files(&self) -> &[FileReference] {
        &self.files
    }

    /// Consume the batch, returning its members
    pub fn into_files(self) -> Vec<FileReference> {
        self.files
    }

    /// Cumulative size of all members
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the batch has no members
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// A file's full content, alive only while its batch is processed
#[derive(Clone, PartialEq, Eq)]
pub struct LoadedFile {
    /// Unique relative path
    pub path: String,
    /// Classification of the file
    pub kind: FileKind,
    /// Full byte content
    pub content: Vec<u8>,
}

impl LoadedFile {
    /// Size of the loaded content
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Whether the content is empty
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl fmt::Debug for LoadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedFile")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("bytes", &self.content.len())
            .finish()
    }
}

/// Per-file failure note that does not interrupt sibling processing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Path of the failed file
    pub path: String,
    /// Human-readable reason
    pub message: String,
}

impl ErrorRecord {
    /// Create a new error record
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Outcome of one batch: the analyzer's output (if it succeeded) plus per-file errors
#[derive(Debug, Clone)]
pub struct BatchResult<T> {
    /// Zero-based position of the batch in execution order
    pub batch_index: usize,
    /// Number of references the batch contained
    pub file_count: usize,
    /// Analyzer output; `None` when the analysis call failed
    pub output: Option<T>,
    /// Read failures and, on analysis failure, one record per member
    pub errors: Vec<ErrorRecord>,
}

impl<T> BatchResult<T> {
    /// Whether the analysis call for this batch succeeded
    pub fn is_success(&self) -> bool {
        self.output.is_some()
    }
}
