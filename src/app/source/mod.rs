//! File source adapters
//!
//! Three input modalities are normalised into one ordered sequence of
//! [`FileReference`]s:
//!
//! - [`FileSource::Files`] - a flat list of file objects (e.g. a multi-file picker)
//! - [`FileSource::Dropped`] - a drag-drop payload whose entries may be nested
//!   directories that must be expanded recursively
//! - [`FileSource::Granted`] - OS-granted directory or file handles
//!
//! Every modality is expressed through the [`FileHandle`] and
//! [`DirectoryHandle`] capability traits, so downstream components never
//! know which one produced a reference. Adapters are provided for in-memory
//! objects ([`memory`]) and the local filesystem ([`local`]); recursive
//! expansion lives in [`tree`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use dicom_ingest::app::source::{collect_all, DuplicatePolicy, FileSource};
//! use dicom_ingest::app::source::local;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let granted = local::granted("/data/study-001").await?;
//! let collected = collect_all(vec![FileSource::Granted(vec![granted])], DuplicatePolicy::default()).await?;
//! println!("{} files, {} bytes", collected.references.len(), collected.total_bytes());
//! # Ok(())
//! # }
//! ```

pub mod local;
pub mod memory;
pub mod tree;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

use super::classify::classify;
use super::models::FileReference;
use crate::errors::{SourceError, SourceResult};

/// Byte stream returned by [`FileHandle::open_stream`]
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Capability interface for one readable file
///
/// Implementations must not load content until a read method is called.
pub trait FileHandle: Send + Sync + fmt::Debug {
    /// File name (last path segment)
    fn name(&self) -> &str;

    /// Path relative to the picked root, when the platform provides one
    fn relative_path(&self) -> Option<&str> {
        None
    }

    /// Resolve the size through a metadata-only call
    fn metadata_len(&self) -> BoxFuture<'_, io::Result<u64>>;

    /// Read the whole content in one call
    fn read_all(&self) -> BoxFuture<'_, io::Result<Vec<u8>>>;

    /// Open a byte stream for chunked reading
    fn open_stream(&self) -> BoxFuture<'_, io::Result<ByteStream>>;
}

/// Capability interface for a directory whose entries must be enumerated
pub trait DirectoryHandle: Send + Sync + fmt::Debug {
    /// Directory name (last path segment)
    fn name(&self) -> &str;

    /// List the immediate children of this directory
    fn entries(&self) -> BoxFuture<'_, io::Result<Vec<Entry>>>;
}

/// One node of a dropped or granted tree
#[derive(Debug, Clone)]
pub enum Entry {
    /// A file
    File(Arc<dyn FileHandle>),
    /// A directory requiring expansion
    Directory(Arc<dyn DirectoryHandle>),
}

impl Entry {
    /// Name of the entry
    pub fn name(&self) -> &str {
        match self {
            Entry::File(file) => file.name(),
            Entry::Directory(dir) => dir.name(),
        }
    }
}

/// One input modality supplied by the caller
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Flat list of file objects; path is the object's relative path or its name
    Files(Vec<Arc<dyn FileHandle>>),
    /// Drag-drop payload; a dropped directory's own name is the first path segment
    Dropped(Vec<Entry>),
    /// Granted handles; paths are relative to a granted directory (its name is omitted)
    Granted(Vec<Entry>),
}

impl FileSource {
    /// Human-readable modality label
    pub fn label(&self) -> &'static str {
        match self {
            FileSource::Files(_) => "file list",
            FileSource::Dropped(_) => "drag-drop payload",
            FileSource::Granted(_) => "granted handles",
        }
    }
}

/// What to do when the same relative path is produced more than once in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Fail collection with [`SourceError::DuplicatePath`]
    Reject,
    /// Keep the first occurrence, drop later ones
    KeepFirst,
    /// Keep the last occurrence, drop earlier ones
    KeepLast,
    /// Keep all, renaming later occurrences to `name~N.ext`
    #[default]
    Disambiguate,
}

/// Enumeration counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectStats {
    /// File entries seen across all sources
    pub enumerated: usize,
    /// Zero-byte entries dropped
    pub zero_byte: usize,
    /// Entries whose metadata could not be resolved and were skipped
    pub unreadable: usize,
    /// Duplicate paths dropped or renamed
    pub duplicates: usize,
}

/// Result of collecting one or more sources
#[derive(Debug, Clone, Default)]
pub struct Collected {
    /// References in enumeration order, paths unique
    pub references: Vec<FileReference>,
    /// Enumeration counters
    pub stats: CollectStats,
}

impl Collected {
    /// Sum of all reference sizes
    pub fn total_bytes(&self) -> u64 {
        self.references
            .iter()
            .map(FileReference::size_bytes)
            .fold(0u64, u64::saturating_add)
    }
}

/// A file discovered during traversal, before its size is resolved
#[derive(Debug)]
pub(crate) struct Discovered {
    pub path: String,
    pub handle: Arc<dyn FileHandle>,
}

/// Collect one source into file references
///
/// Sizes are resolved through metadata; zero-byte entries are dropped.
/// Paths are not deduplicated here, see [`collect_all`].
pub async fn collect(source: FileSource) -> SourceResult<Collected> {
    let label = source.label();
    let discovered: Vec<Discovered> = match source {
        FileSource::Files(files) => files
            .into_iter()
            .map(|handle| Discovered {
                path: handle
                    .relative_path()
                    .map(str::to_string)
                    .unwrap_or_else(|| handle.name().to_string()),
                handle,
            })
            .collect(),
        FileSource::Dropped(entries) => tree::expand(entries, true).await?,
        FileSource::Granted(entries) => tree::expand(entries, false).await?,
    };

    debug!("Discovered {} files from {}", discovered.len(), label);
    resolve(discovered).await
}

/// Resolve sizes and build references
async fn resolve(discovered: Vec<Discovered>) -> SourceResult<Collected> {
    let mut collected = Collected::default();

    for Discovered { path, handle } in discovered {
        collected.stats.enumerated += 1;

        let size = match handle.metadata_len().await {
            Ok(size) => size,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                return Err(SourceError::PermissionDenied { path });
            }
            Err(e) => {
                warn!("Skipping {}: metadata unavailable ({})", path, e);
                collected.stats.unreadable += 1;
                continue;
            }
        };

        if size == 0 {
            debug!("Skipping zero-byte entry: {}", path);
            collected.stats.zero_byte += 1;
            continue;
        }

        let kind = classify(handle.name());
        collected
            .references
            .push(FileReference::new(path, size, kind, handle));
    }

    Ok(collected)
}

/// Collect several sources into one run with unique paths
pub async fn collect_all(
    sources: Vec<FileSource>,
    policy: DuplicatePolicy,
) -> SourceResult<Collected> {
    let mut merged = Collected::default();

    for source in sources {
        let collected = collect(source).await?;
        merged.stats.enumerated += collected.stats.enumerated;
        merged.stats.zero_byte += collected.stats.zero_byte;
        merged.stats.unreadable += collected.stats.unreadable;
        merged.references.extend(collected.references);
    }

    let (references, duplicates) = apply_duplicate_policy(merged.references, policy)?;
    merged.references = references;
    merged.stats.duplicates = duplicates;

    info!(
        "Collected {} files ({} bytes), {} zero-byte, {} duplicates",
        merged.references.len(),
        merged.total_bytes(),
        merged.stats.zero_byte,
        merged.stats.duplicates
    );

    Ok(merged)
}

/// Enforce path uniqueness according to the policy
///
/// Returns the surviving references and how many duplicates were dropped or renamed.
pub fn apply_duplicate_policy(
    references: Vec<FileReference>,
    policy: DuplicatePolicy,
) -> SourceResult<(Vec<FileReference>, usize)> {
    match policy {
        DuplicatePolicy::Reject => {
            let mut seen = HashSet::with_capacity(references.len());
            for file in &references {
                if !seen.insert(file.path()) {
                    return Err(SourceError::DuplicatePath {
                        path: file.path().to_string(),
                    });
                }
            }
            Ok((references, 0))
        }
        DuplicatePolicy::KeepFirst => {
            let before = references.len();
            let mut seen = HashSet::with_capacity(before);
            let kept: Vec<_> = references
                .into_iter()
                .filter(|file| seen.insert(file.path().to_string()))
                .collect();
            let dropped = before - kept.len();
            Ok((kept, dropped))
        }
        DuplicatePolicy::KeepLast => {
            let before = references.len();
            let mut last: HashMap<String, usize> = HashMap::with_capacity(before);
            for (index, file) in references.iter().enumerate() {
                last.insert(file.path().to_string(), index);
            }
            let kept: Vec<_> = references
                .into_iter()
                .enumerate()
                .filter(|(index, file)| last.get(file.path()) == Some(index))
                .map(|(_, file)| file)
                .collect();
            let dropped = before - kept.len();
            Ok((kept, dropped))
        }
        DuplicatePolicy::Disambiguate => {
            let mut taken: HashSet<String> = references
                .iter()
                .map(|file| file.path().to_string())
                .collect();
            let mut seen = HashSet::with_capacity(references.len());
            let mut renamed = 0;
            let mut out = Vec::with_capacity(references.len());

            for file in references {
                if seen.insert(file.path().to_string()) {
                    out.push(file);
                    continue;
                }

                let mut counter = 2;
                let candidate = loop {
                    let candidate = disambiguated_path(file.path(), counter);
                    if !taken.contains(&candidate) {
                        break candidate;
                    }
                    counter += 1;
                };
                debug!("Renaming duplicate {} to {}", file.path(), candidate);
                taken.insert(candidate.clone());
                seen.insert(candidate.clone());
                out.push(file.with_path(candidate));
                renamed += 1;
            }

            Ok((out, renamed))
        }
    }
}

/// Insert `~N` before the extension of the final segment
fn disambiguated_path(path: &str, counter: usize) -> String {
    let (dir, name) = match path.rsplit_once('/') {
        Some((dir, name)) => (Some(dir), name),
        None => (None, path),
    };

    let renamed = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}~{}.{}", stem, counter, ext),
        _ => format!("{}~{}", name, counter),
    };

    match dir {
        Some(dir) => format!("{}/{}", dir, renamed),
        None => renamed,
    }
}
