//! Recursive expansion of directory entries
//!
//! Traversal is depth-first in the order each directory lists its children,
//! so the resulting sequence is stable for an unchanged tree. An explicit
//! stack is used instead of async recursion.

use std::io;

use tracing::debug;

use super::{DirectoryHandle, Discovered, Entry};
use crate::errors::{SourceError, SourceResult};

/// Join a parent prefix and a segment with `/`
pub fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}/{}", prefix, segment)
    }
}

/// Expand top-level entries into the files they contain
///
/// When `include_root_names` is false, a top-level directory's own name is
/// not part of its descendants' paths.
pub(crate) async fn expand(
    entries: Vec<Entry>,
    include_root_names: bool,
) -> SourceResult<Vec<Discovered>> {
    let mut discovered = Vec::new();
    // Stack of (parent path, entry); pushed in reverse so pops follow listing order
    let mut stack: Vec<(String, Entry)> = Vec::new();

    for entry in entries.into_iter().rev() {
        match entry {
            Entry::Directory(dir) if !include_root_names => {
                let children = list(dir.as_ref(), dir.name()).await?;
                for child in children.into_iter().rev() {
                    stack.push((String::new(), child));
                }
            }
            entry => stack.push((String::new(), entry)),
        }
    }

    while let Some((prefix, entry)) = stack.pop() {
        match entry {
            Entry::File(handle) => {
                let path = join_path(&prefix, handle.name());
                discovered.push(Discovered { path, handle });
            }
            Entry::Directory(dir) => {
                let dir_path = join_path(&prefix, dir.name());
                let children = list(dir.as_ref(), &dir_path).await?;
                debug!("Expanded {} ({} entries)", dir_path, children.len());
                for child in children.into_iter().rev() {
                    stack.push((dir_path.clone(), child));
                }
            }
        }
    }

    Ok(discovered)
}

/// List a directory, mapping I/O failures to source errors
async fn list(dir: &dyn DirectoryHandle, path: &str) -> SourceResult<Vec<Entry>> {
    dir.entries().await.map_err(|e| match e.kind() {
        io::ErrorKind::PermissionDenied => SourceError::PermissionDenied {
            path: path.to_string(),
        },
        _ => SourceError::Io {
            path: path.to_string(),
            source: e,
        },
    })
}
