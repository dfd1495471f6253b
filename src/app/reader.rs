//! Streaming file reader
//!
//! Files below the streaming threshold are read with one whole-file call.
//! Larger files are pulled through a byte stream in fixed-size chunks; once
//! the stream is exhausted the total length is known, a single destination
//! buffer is allocated at that size and every chunk is copied in by offset.
//! This keeps the number of large allocations at one per file instead of
//! growing a buffer repeatedly.
//!
//! A failed read is returned as a [`ReadError`] value for that file only.

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use super::models::{FileReference, LoadedFile};
use crate::constants::reading;
use crate::errors::{ReadError, ReadResult};

/// Progress of one file's read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadProgress {
    /// Bytes read so far
    pub bytes_read: u64,
    /// Size reported by metadata
    pub total_bytes: u64,
}

/// Reader choosing between whole-file and chunked reads by size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingReader {
    threshold: u64,
    chunk_size: usize,
}

impl Default for StreamingReader {
    fn default() -> Self {
        Self::new(reading::STREAMING_THRESHOLD_BYTES, reading::CHUNK_SIZE_BYTES)
    }
}

impl StreamingReader {
    /// Create a reader; a zero chunk size is raised to one byte
    pub fn new(threshold: u64, chunk_size: usize) -> Self {
        Self {
            threshold,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Size at or above which reads are streamed
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Chunk size used for streamed reads
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Whether a file of this size will be streamed
    pub fn uses_streaming(&self, size_bytes: u64) -> bool {
        size_bytes >= self.threshold
    }

    /// Read a file's full content
    pub async fn read(&self, file: &FileReference) -> ReadResult<LoadedFile> {
        self.read_with_progress(file, |_| {}).await
    }

    /// Read a file's full content, reporting progress after every chunk
    ///
    /// Whole-file reads report once on completion.
    pub async fn read_with_progress<F>(
        &self,
        file: &FileReference,
        mut on_progress: F,
    ) -> ReadResult<LoadedFile>
    where
        F: FnMut(ReadProgress),
    {
        let total = file.size_bytes();
        if usize::try_from(total).is_err() {
            return Err(ReadError::TooLarge {
                path: file.path().to_string(),
                size: total,
            });
        }

        let content = if self.uses_streaming(total) {
            debug!(
                "Streaming {} ({} bytes, {} byte chunks)",
                file.path(),
                total,
                self.chunk_size
            );
            let stream = file
                .handle()
                .open_stream()
                .await
                .map_err(|e| ReadError::from_io(file.path(), e))?;
            self.read_chunked(file.path(), total, stream, &mut on_progress)
                .await?
        } else {
            let content = file
                .handle()
                .read_all()
                .await
                .map_err(|e| ReadError::from_io(file.path(), e))?;
            on_progress(ReadProgress {
                bytes_read: content.len() as u64,
                total_bytes: total,
            });
            content
        };

        let actual = content.len() as u64;
        if actual < total {
            return Err(ReadError::Truncated {
                path: file.path().to_string(),
                expected: total,
                actual,
            });
        }
        if actual > total {
            warn!(
                "{} grew during ingestion: metadata said {} bytes, read {}",
                file.path(),
                total,
                actual
            );
        }

        Ok(LoadedFile {
            path: file.path().to_string(),
            kind: file.kind(),
            content,
        })
    }

    /// Pull fixed-size chunks until the stream is exhausted, then concatenate
    async fn read_chunked<R, F>(
        &self,
        path: &str,
        total: u64,
        mut stream: R,
        on_progress: &mut F,
    ) -> ReadResult<Vec<u8>>
    where
        R: AsyncRead + Unpin,
        F: FnMut(ReadProgress),
    {
        let mut chunks: Vec<Vec<u8>> = Vec::new();
        let mut bytes_read: u64 = 0;

        loop {
            let mut chunk = vec![0u8; self.chunk_size];
            let filled = fill_chunk(&mut stream, &mut chunk)
                .await
                .map_err(|e| ReadError::from_io(path, e))?;

            if filled == 0 {
                break;
            }

            chunk.truncate(filled);
            bytes_read += filled as u64;
            chunks.push(chunk);
            on_progress(ReadProgress {
                bytes_read,
                total_bytes: total,
            });

            if filled < self.chunk_size {
                break;
            }
        }

        let length = usize::try_from(bytes_read).map_err(|_| ReadError::TooLarge {
            path: path.to_string(),
            size: bytes_read,
        })?;

        let mut content = vec![0u8; length];
        let mut offset = 0;
        for chunk in chunks {
            content[offset..offset + chunk.len()].copy_from_slice(&chunk);
            offset += chunk.len();
        }

        Ok(content)
    }
}

/// Read until `buf` is full or the stream ends; returns bytes filled
async fn fill_chunk<R>(stream: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
