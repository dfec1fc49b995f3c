use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};

use crate::models::PersistenceWrite;

use super::ProgressStore;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_warn};

enum WriterCommand {
    Write(PersistenceWrite),
    Shutdown,
}

#[derive(Default)]
struct WriterCounters {
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Delivery counters for one writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
}

struct WriterInner {
    sender: mpsc::UnboundedSender<WriterCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<WriterCounters>,
}

/// Single-writer queue shared by the position tracker and the bookmark
/// manager of one session.
///
/// `dispatch` never waits: the write is queued and one worker task delivers
/// queued writes to the store strictly in issuance order. Failures are
/// logged and dropped; nothing is retried.
#[derive(Clone)]
pub struct ProgressWriter {
    inner: Arc<WriterInner>,
}

impl ProgressWriter {
    /// Spawns the worker task. Must be called from within a tokio runtime.
    pub fn spawn(store: Arc<dyn ProgressStore>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let counters = Arc::new(WriterCounters::default());
        let worker = tokio::spawn(write_loop(store, receiver, counters.clone()));

        Self {
            inner: Arc::new(WriterInner {
                sender,
                worker: Mutex::new(Some(worker)),
                counters,
            }),
        }
    }

    /// Queues a write. Returns immediately.
    pub fn dispatch(&self, write: PersistenceWrite) {
        let page = write.read_page;
        let bookmark = write.is_bookmark();
        match self.inner.sender.send(WriterCommand::Write(write)) {
            Ok(()) => {
                self.inner.counters.dispatched.fetch_add(1, Ordering::Relaxed);
                log_debug!("queued write for page {page} (bookmark: {bookmark})");
            }
            Err(_) => {
                log_warn!("progress writer is closed; dropping write for page {page}");
            }
        }
    }

    pub fn stats(&self) -> WriterStats {
        let counters = &self.inner.counters;
        WriterStats {
            dispatched: counters.dispatched.load(Ordering::Relaxed),
            succeeded: counters.succeeded.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Asks the worker to stop after everything queued so far and waits up
    /// to `timeout` for it to drain. Safe to call more than once.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.request_shutdown();

        let Some(handle) = self.inner.worker.lock().await.take() else {
            return Ok(());
        };

        match tokio::time::timeout(timeout, handle).await {
            Ok(joined) => joined.map_err(|err| anyhow!("progress writer task failed: {err}")),
            Err(_) => Err(anyhow!(
                "progress writer did not drain within {}ms",
                timeout.as_millis()
            )),
        }
    }

    /// Non-blocking variant used from `Drop`: queued writes still go out,
    /// nobody waits for them.
    pub fn request_shutdown(&self) {
        let _ = self.inner.sender.send(WriterCommand::Shutdown);
    }
}

async fn write_loop(
    store: Arc<dyn ProgressStore>,
    mut receiver: mpsc::UnboundedReceiver<WriterCommand>,
    counters: Arc<WriterCounters>,
) {
    while let Some(command) = receiver.recv().await {
        match command {
            WriterCommand::Write(write) => match store.record_progress(&write).await {
                Ok(()) => {
                    counters.succeeded.fetch_add(1, Ordering::Relaxed);
                    log_debug!(
                        "recorded page {} for book {} (session {})",
                        write.read_page,
                        write.book_id,
                        write.session_id
                    );
                }
                Err(err) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    if write.is_bookmark() {
                        log_error!(
                            "failed to save bookmark for book {} page {}: {err:#}",
                            write.book_id,
                            write.read_page
                        );
                    } else {
                        log_error!(
                            "failed to save reading progress for book {} page {}: {err:#}",
                            write.book_id,
                            write.read_page
                        );
                    }
                }
            },
            WriterCommand::Shutdown => break,
        }
    }

    log_debug!("progress writer shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bookmark, ReadingSession};
    use crate::store::MemoryProgressStore;

    fn session() -> ReadingSession {
        ReadingSession::new("abcDEF0123456789".into(), "book-1")
    }

    #[tokio::test]
    async fn delivers_writes_in_issuance_order() {
        let store = Arc::new(MemoryProgressStore::new());
        let writer = ProgressWriter::spawn(store.clone());
        let session = session();

        for page in [4, 9, 2] {
            writer.dispatch(PersistenceWrite::position(&session, page));
        }
        writer.shutdown(Duration::from_secs(1)).await.unwrap();

        let pages: Vec<u32> = store.writes().iter().map(|w| w.read_page).collect();
        assert_eq!(pages, vec![4, 9, 2]);
        assert_eq!(
            writer.stats(),
            WriterStats {
                dispatched: 3,
                succeeded: 3,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn failures_are_counted_and_not_retried() {
        let store = Arc::new(MemoryProgressStore::new());
        store.set_failing(true);
        let writer = ProgressWriter::spawn(store.clone());
        let session = session();

        writer.dispatch(PersistenceWrite::bookmark(
            &session,
            7,
            Bookmark::new(7, Some("quote")),
        ));
        writer.shutdown(Duration::from_secs(1)).await.unwrap();

        assert_eq!(store.attempts(), 1);
        assert!(store.writes().is_empty());
        assert_eq!(writer.stats().failed, 1);
    }

    #[tokio::test]
    async fn dispatch_after_shutdown_is_dropped() {
        let store = Arc::new(MemoryProgressStore::new());
        let writer = ProgressWriter::spawn(store.clone());
        writer.shutdown(Duration::from_secs(1)).await.unwrap();
        writer.shutdown(Duration::from_secs(1)).await.unwrap();

        writer.dispatch(PersistenceWrite::position(&session(), 3));
        tokio::task::yield_now().await;

        assert_eq!(store.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_gives_up_on_a_slow_store() {
        let store = Arc::new(MemoryProgressStore::new());
        store.set_latency(Duration::from_secs(30));
        let writer = ProgressWriter::spawn(store.clone());

        writer.dispatch(PersistenceWrite::position(&session(), 12));
        let err = writer.shutdown(Duration::from_secs(1)).await.unwrap_err();
        assert!(err.to_string().contains("did not drain within 1000ms"));
        assert_eq!(writer.stats().succeeded, 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.writes().len(), 1);
        assert_eq!(writer.stats().succeeded, 1);
    }
}
