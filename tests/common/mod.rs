//! Shared fixtures for integration tests

use std::io;
use std::path::Path;
use std::sync::Arc;

use dicom_ingest::app::source::{ByteStream, FileHandle};
use dicom_ingest::prelude::*;
use futures::future::{self, BoxFuture, FutureExt};

/// A file whose size resolves but whose content cannot be read
#[derive(Debug)]
pub struct RevokedFile {
    pub name: String,
    pub len: u64,
}

impl FileHandle for RevokedFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn metadata_len(&self) -> BoxFuture<'_, io::Result<u64>> {
        future::ready(Ok(self.len)).boxed()
    }

    fn read_all(&self) -> BoxFuture<'_, io::Result<Vec<u8>>> {
        future::ready(Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "access revoked",
        )))
        .boxed()
    }

    fn open_stream(&self) -> BoxFuture<'_, io::Result<ByteStream>> {
        future::ready(Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "access revoked",
        )))
        .boxed()
    }
}

/// In-memory file handle
pub fn memory_file(name: &str, content: &[u8]) -> Arc<dyn FileHandle> {
    Arc::new(memory::MemoryFile::new(name, content.to_vec()))
}

/// `count` four-byte files named IM0000 .. IM{count-1}
pub fn numbered_files(count: usize) -> Vec<Arc<dyn FileHandle>> {
    (0..count)
        .map(|i| memory_file(&format!("IM{:04}", i), &[i as u8; 4]))
        .collect()
}

/// Write a file, creating parent directories
pub fn write_file(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// Paths of a digest report in result order
pub fn digest_paths(report: &IngestReport<Vec<FileDigest>>) -> Vec<String> {
    report.result.iter().map(|d| d.path.clone()).collect()
}
