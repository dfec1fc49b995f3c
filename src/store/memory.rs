use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Mutex, MutexGuard,
    },
    time::Duration,
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;

use crate::models::{BookmarkLogEntry, PersistenceWrite, ProgressRecord};

use super::ProgressStore;

#[derive(Default)]
struct MemoryState {
    latest: HashMap<String, ProgressRecord>,
    bookmark_log: Vec<BookmarkLogEntry>,
    received: Vec<PersistenceWrite>,
    seen: HashSet<String>,
}

/// In-process store with the same keep-latest / append-only semantics as
/// the sqlite store. Can be switched into a failing mode to exercise the
/// error path.
#[derive(Default)]
pub struct MemoryProgressStore {
    state: Mutex<MemoryState>,
    attempts: AtomicU64,
    failing: AtomicBool,
    latency_ms: AtomicU64,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every `record_progress` call fails without touching state.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every `record_progress` call sleeps this long before answering.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// Number of `record_progress` calls, successful or not.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Successfully recorded writes, in arrival order.
    pub fn writes(&self) -> Vec<PersistenceWrite> {
        self.lock().received.clone()
    }

    pub fn latest_progress(&self, book_id: &str) -> Option<ProgressRecord> {
        self.lock().latest.get(book_id).cloned()
    }

    pub fn bookmarks_for_book(&self, book_id: &str) -> Vec<BookmarkLogEntry> {
        self.lock()
            .bookmark_log
            .iter()
            .filter(|entry| entry.book_id == book_id)
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn record_progress(&self, write: &PersistenceWrite) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let latency_ms = self.latency_ms.load(Ordering::SeqCst);
        if latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(latency_ms)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            bail!("memory store is unavailable");
        }

        let mut state = self.lock();
        if !state.seen.insert(write.write_id.clone()) {
            return Ok(());
        }
        state.received.push(write.clone());

        let incoming = ProgressRecord::from(write);
        match state.latest.get(&write.book_id) {
            Some(existing) if existing.updated_at > incoming.updated_at => {}
            _ => {
                state.latest.insert(write.book_id.clone(), incoming);
            }
        }

        if let Some(bookmark) = &write.bookmark {
            let entry = BookmarkLogEntry {
                write_id: write.write_id.clone(),
                book_id: write.book_id.clone(),
                session_id: write.session_id.clone(),
                bookmark: bookmark.clone(),
                recorded_at: Utc::now(),
            };
            state.bookmark_log.push(entry);
        }

        Ok(())
    }
}
