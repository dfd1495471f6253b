//! In-memory file objects
//!
//! Models the flat collection of already-available file objects a picker or
//! drop target hands over: name, size, and an async whole-read. Content is
//! shared, so cloning a handle never copies bytes.

use std::io;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};

use super::{ByteStream, DirectoryHandle, Entry, FileHandle};

/// A file object whose bytes are already held by the platform
#[derive(Debug, Clone)]
pub struct MemoryFile {
    name: String,
    relative_path: Option<String>,
    content: Arc<[u8]>,
}

impl MemoryFile {
    /// Create a file object from a name and content
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let content: Vec<u8> = content.into();
        Self {
            name: name.into(),
            relative_path: None,
            content: Arc::from(content),
        }
    }

    /// Attach the relative path reported by a directory picker
    pub fn with_relative_path(mut self, path: impl Into<String>) -> Self {
        self.relative_path = Some(path.into());
        self
    }
}

impl FileHandle for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn relative_path(&self) -> Option<&str> {
        self.relative_path.as_deref()
    }

    fn metadata_len(&self) -> BoxFuture<'_, io::Result<u64>> {
        future::ready(Ok(self.content.len() as u64)).boxed()
    }

    fn read_all(&self) -> BoxFuture<'_, io::Result<Vec<u8>>> {
        future::ready(Ok(self.content.to_vec())).boxed()
    }

    fn open_stream(&self) -> BoxFuture<'_, io::Result<ByteStream>> {
        let cursor = io::Cursor::new(Arc::clone(&self.content));
        future::ready(Ok(Box::pin(cursor) as ByteStream)).boxed()
    }
}

/// A directory entry inside a drag-drop payload
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    name: String,
    entries: Vec<Entry>,
}

impl MemoryDirectory {
    /// Create an empty directory
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Add a file child
    pub fn with_file(mut self, file: MemoryFile) -> Self {
        self.entries.push(Entry::File(Arc::new(file)));
        self
    }

    /// Add a subdirectory child
    pub fn with_directory(mut self, dir: MemoryDirectory) -> Self {
        self.entries.push(Entry::Directory(Arc::new(dir)));
        self
    }

    /// Wrap into a tree entry
    pub fn into_entry(self) -> Entry {
        Entry::Directory(Arc::new(self))
    }
}

impl DirectoryHandle for MemoryDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn entries(&self) -> BoxFuture<'_, io::Result<Vec<Entry>>> {
        future::ready(Ok(self.entries.clone())).boxed()
    }
}
