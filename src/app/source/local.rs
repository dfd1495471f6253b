//! OS-granted handles backed by the local filesystem
//!
//! Sizes come from `metadata` calls, content from handle-scoped reads that
//! support true chunked streaming through [`tokio::fs::File`].

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tokio::fs;
use tracing::{debug, warn};

use super::{ByteStream, DirectoryHandle, Entry, FileHandle};
use crate::errors::{SourceError, SourceResult};

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// A granted file handle
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
}

impl LocalFile {
    /// Wrap a filesystem path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = file_name(&path);
        Self { path, name }
    }

    /// Absolute or caller-relative filesystem path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileHandle for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn metadata_len(&self) -> BoxFuture<'_, io::Result<u64>> {
        async move { Ok(fs::metadata(&self.path).await?.len()) }.boxed()
    }

    fn read_all(&self) -> BoxFuture<'_, io::Result<Vec<u8>>> {
        fs::read(&self.path).boxed()
    }

    fn open_stream(&self) -> BoxFuture<'_, io::Result<ByteStream>> {
        async move {
            let file = fs::File::open(&self.path).await?;
            Ok(Box::pin(file) as ByteStream)
        }
        .boxed()
    }
}

/// A granted directory handle
#[derive(Debug, Clone)]
pub struct LocalDirectory {
    path: PathBuf,
    name: String,
}

impl LocalDirectory {
    /// Wrap a filesystem directory path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = file_name(&path);
        Self { path, name }
    }
}

impl DirectoryHandle for LocalDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    /// Children sorted by name so traversal order does not depend on the filesystem
    ///
    /// Entries that cannot be inspected are skipped with a warning; only a
    /// directory that cannot be opened fails the listing.
    fn entries(&self) -> BoxFuture<'_, io::Result<Vec<Entry>>> {
        async move {
            let mut reader = fs::read_dir(&self.path).await?;
            let mut children: Vec<(String, Entry)> = Vec::new();

            loop {
                let dir_entry = match reader.next_entry().await {
                    Ok(Some(dir_entry)) => dir_entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Stopped listing {}: {}", self.path.display(), e);
                        break;
                    }
                };
                let file_type = dir_entry.file_type().await;
                if let Some(child) = child_entry(dir_entry.path(), file_type).await {
                    children.push(child);
                }
            }

            children.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(children.into_iter().map(|(_, entry)| entry).collect())
        }
        .boxed()
    }
}

/// Map one directory entry to a named tree entry, or `None` to skip it
async fn child_entry(
    path: PathBuf,
    file_type: io::Result<std::fs::FileType>,
) -> Option<(String, Entry)> {
    let name = file_name(&path);
    let file_type = match file_type {
        Ok(file_type) => file_type,
        Err(e) => {
            warn!("Skipping unreadable entry {}: {}", path.display(), e);
            return None;
        }
    };

    if file_type.is_dir() {
        Some((name, Entry::Directory(Arc::new(LocalDirectory::new(path)))))
    } else if file_type.is_file() {
        Some((name, Entry::File(Arc::new(LocalFile::new(path)))))
    } else if file_type.is_symlink() {
        // Follow links to files only; linked directories could form cycles
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some((name, Entry::File(Arc::new(LocalFile::new(path))))),
            _ => {
                debug!("Skipping symlink: {}", path.display());
                None
            }
        }
    } else {
        None
    }
}

/// Turn a user-granted filesystem path into a tree entry
///
/// # Errors
///
/// Returns [`SourceError::NotFound`] or [`SourceError::PermissionDenied`] when
/// the path cannot be inspected.
pub async fn granted(path: impl AsRef<Path>) -> SourceResult<Entry> {
    let path = path.as_ref();
    let meta = fs::metadata(path).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => SourceError::NotFound {
            path: path.to_path_buf(),
        },
        io::ErrorKind::PermissionDenied => SourceError::PermissionDenied {
            path: path.display().to_string(),
        },
        _ => SourceError::Io {
            path: path.display().to_string(),
            source: e,
        },
    })?;

    if meta.is_dir() {
        Ok(Entry::Directory(Arc::new(LocalDirectory::new(path))))
    } else {
        Ok(Entry::File(Arc::new(LocalFile::new(path))))
    }
}
