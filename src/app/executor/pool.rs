//! Bounded-concurrency batch loading
//!
//! All reads of one batch are spawned on a [`JoinSet`] and gated by a
//! semaphore of `read_concurrency` permits. Each read settles independently:
//! a failed or panicking read becomes a [`ReadError`] for that file and never
//! aborts its siblings. Results come back in batch order regardless of
//! completion order.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::app::models::{Batch, LoadedFile};
use crate::app::reader::{ReadProgress, StreamingReader};
use crate::errors::{ReadError, ReadResult};

/// Event raised while a batch loads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadEvent<'a> {
    /// A streamed read advanced by one chunk
    Chunk {
        path: &'a str,
        progress: ReadProgress,
    },
    /// A read finished either way
    Settled { path: &'a str, succeeded: bool },
}

/// Concurrent loader for the members of one batch
#[derive(Debug, Clone, Copy)]
pub struct ReadPool {
    reader: StreamingReader,
    width: usize,
}

impl ReadPool {
    /// Create a pool; a zero width is raised to one
    pub fn new(reader: StreamingReader, width: usize) -> Self {
        Self {
            reader,
            width: width.max(1),
        }
    }

    /// Maximum simultaneous reads
    pub fn width(&self) -> usize {
        self.width
    }

    /// Read every member of the batch, one outcome per member in batch order
    pub async fn load<F>(&self, batch: &Batch, mut on_event: F) -> Vec<ReadResult<LoadedFile>>
    where
        F: FnMut(LoadEvent<'_>),
    {
        let files = batch.files();
        let semaphore = Arc::new(Semaphore::new(self.width));
        let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel::<(usize, ReadProgress)>();
        let mut tasks = JoinSet::new();

        for (index, file) in files.iter().enumerate() {
            let file = file.clone();
            let reader = self.reader;
            let semaphore = Arc::clone(&semaphore);
            let chunk_tx = chunk_tx.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let path = file.path().to_string();

                let read = async {
                    if reader.uses_streaming(file.size_bytes()) {
                        reader
                            .read_with_progress(&file, |progress| {
                                let _ = chunk_tx.send((index, progress));
                            })
                            .await
                    } else {
                        reader.read(&file).await
                    }
                };

                let result = AssertUnwindSafe(read)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        Err(ReadError::TaskFailed {
                            path,
                            reason: panic_message(panic.as_ref()),
                        })
                    });
                (index, result)
            });
        }
        drop(chunk_tx);

        let mut outcomes: Vec<Option<ReadResult<LoadedFile>>> =
            std::iter::repeat_with(|| None).take(files.len()).collect();

        loop {
            tokio::select! {
                biased;

                Some((index, progress)) = chunk_rx.recv() => {
                    on_event(LoadEvent::Chunk { path: files[index].path(), progress });
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok((index, result))) => {
                        if let Err(e) = &result {
                            debug!("Read failed: {}", e);
                        }
                        on_event(LoadEvent::Settled {
                            path: files[index].path(),
                            succeeded: result.is_ok(),
                        });
                        outcomes[index] = Some(result);
                    }
                    Some(Err(join_error)) => {
                        warn!("Read task did not complete: {}", join_error);
                    }
                    None => break,
                },
            }
        }

        outcomes
            .into_iter()
            .zip(files)
            .map(|(outcome, file)| {
                outcome.unwrap_or_else(|| {
                    Err(ReadError::TaskFailed {
                        path: file.path().to_string(),
                        reason: "read task was aborted".to_string(),
                    })
                })
            })
            .collect()
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{FileKind, FileReference};
    use crate::app::source::memory::MemoryFile;
    use crate::app::source::{ByteStream, FileHandle};
    use futures::future::{self, BoxFuture};
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn batch_of(handles: Vec<Arc<dyn FileHandle>>) -> Batch {
        let mut batch = Batch::new();
        for handle in handles {
            let len = 8;
            batch.push(FileReference::new(
                handle.name().to_string(),
                len,
                FileKind::Dicom,
                handle,
            ));
        }
        batch
    }

    fn memory(name: &str) -> Arc<dyn FileHandle> {
        Arc::new(MemoryFile::new(name, name.as_bytes().repeat(8)[..8].to_vec()))
    }

    #[derive(Debug)]
    struct FailingFile(&'static str);

    impl FileHandle for FailingFile {
        fn name(&self) -> &str {
            self.0
        }

        fn metadata_len(&self) -> BoxFuture<'_, io::Result<u64>> {
            future::ready(Ok(8)).boxed()
        }

        fn read_all(&self) -> BoxFuture<'_, io::Result<Vec<u8>>> {
            future::ready(Err(io::Error::new(io::ErrorKind::Other, "disk gone"))).boxed()
        }

        fn open_stream(&self) -> BoxFuture<'_, io::Result<ByteStream>> {
            future::ready(Err(io::Error::new(io::ErrorKind::Other, "disk gone"))).boxed()
        }
    }

    #[derive(Debug)]
    struct PanickingFile;

    impl FileHandle for PanickingFile {
        fn name(&self) -> &str {
            "panic.dcm"
        }

        fn metadata_len(&self) -> BoxFuture<'_, io::Result<u64>> {
            future::ready(Ok(8)).boxed()
        }

        fn read_all(&self) -> BoxFuture<'_, io::Result<Vec<u8>>> {
            async move {
                if self.name().is_empty() {
                    return Ok(Vec::new());
                }
                panic!("reader exploded")
            }
            .boxed()
        }

        fn open_stream(&self) -> BoxFuture<'_, io::Result<ByteStream>> {
            future::ready(Err(io::Error::from(io::ErrorKind::Unsupported))).boxed()
        }
    }

    /// Tracks how many reads are in flight at once
    #[derive(Debug)]
    struct GaugedFile {
        name: String,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl FileHandle for GaugedFile {
        fn name(&self) -> &str {
            &self.name
        }

        fn metadata_len(&self) -> BoxFuture<'_, io::Result<u64>> {
            future::ready(Ok(8)).boxed()
        }

        fn read_all(&self) -> BoxFuture<'_, io::Result<Vec<u8>>> {
            async move {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                self.active.fetch_sub(1, Ordering::SeqCst);
                Ok(vec![0u8; 8])
            }
            .boxed()
        }

        fn open_stream(&self) -> BoxFuture<'_, io::Result<ByteStream>> {
            future::ready(Err(io::Error::from(io::ErrorKind::Unsupported))).boxed()
        }
    }

    /// One failing read among ten yields nine loads and one error, in order
    #[tokio::test]
    async fn test_fault_isolation_preserves_order() {
        let handles: Vec<Arc<dyn FileHandle>> = (0..10)
            .map(|i| {
                if i == 4 {
                    Arc::new(FailingFile("f4.dcm")) as Arc<dyn FileHandle>
                } else {
                    memory(&format!("f{}.dcm", i))
                }
            })
            .collect();
        let batch = batch_of(handles);

        let mut settled = 0;
        let outcomes = ReadPool::new(StreamingReader::default(), 3)
            .load(&batch, |event| {
                if let LoadEvent::Settled { .. } = event {
                    settled += 1;
                }
            })
            .await;

        assert_eq!(settled, 10);
        assert_eq!(outcomes.len(), 10);
        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 9);
        assert_eq!(outcomes[4].as_ref().unwrap_err().path(), "f4.dcm");
        for (i, outcome) in outcomes.iter().enumerate() {
            if let Ok(file) = outcome {
                assert_eq!(file.path, format!("f{}.dcm", i));
            }
        }
    }

    /// A panicking read becomes an error value for that file only
    #[tokio::test]
    async fn test_panic_is_contained() {
        let batch = batch_of(vec![memory("a.dcm"), Arc::new(PanickingFile), memory("b.dcm")]);
        let outcomes = ReadPool::new(StreamingReader::default(), 2)
            .load(&batch, |_| {})
            .await;

        assert!(outcomes[0].is_ok());
        assert!(outcomes[2].is_ok());
        match &outcomes[1] {
            Err(ReadError::TaskFailed { path, reason }) => {
                assert_eq!(path, "panic.dcm");
                assert!(reason.contains("reader exploded"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    /// No more than `width` reads are in flight
    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let handles: Vec<Arc<dyn FileHandle>> = (0..20)
            .map(|i| {
                Arc::new(GaugedFile {
                    name: format!("g{}.dcm", i),
                    active: Arc::clone(&active),
                    peak: Arc::clone(&peak),
                }) as Arc<dyn FileHandle>
            })
            .collect();

        let outcomes = ReadPool::new(StreamingReader::default(), 4)
            .load(&batch_of(handles), |_| {})
            .await;

        assert!(outcomes.iter().all(Result::is_ok));
        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    /// Streamed members report chunk events
    #[tokio::test]
    async fn test_chunk_events_for_streamed_files() {
        let batch = batch_of(vec![memory("s.dcm")]);
        let mut chunks = Vec::new();
        ReadPool::new(StreamingReader::new(1, 3), 1)
            .load(&batch, |event| {
                if let LoadEvent::Chunk { progress, .. } = event {
                    chunks.push(progress.bytes_read);
                }
            })
            .await;
        assert!(!chunks.is_empty());
        assert!(chunks.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "panicked");
    }
}
