use std::{sync::Arc, time::Duration};

use anyhow::Result;
use log::{info, warn};

use crate::{
    bookmarks::{BookmarkChange, BookmarkManager},
    lifecycle::{LifecycleFlushController, LifecycleSender, LifecycleSignal},
    models::{Bookmark, ReadingSession},
    settings::SyncSettings,
    store::{ProgressStore, ProgressWriter},
    tracker::{FlushOutcome, PositionState, PositionTracker},
    view::{clamp_page, ViewState},
};

use super::identity::generate_session_id;

/// One open reader view for one book.
///
/// Owns every session-scoped resource: the write queue, the debounce timer,
/// the lifecycle listener and the bookmark list. Call [`deactivate`] when
/// the view closes; dropping an active session releases the same resources
/// without waiting for the store.
///
/// [`deactivate`]: ReaderSession::deactivate
pub struct ReaderSession {
    session: Arc<ReadingSession>,
    writer: ProgressWriter,
    tracker: PositionTracker,
    lifecycle: LifecycleFlushController,
    bookmarks: BookmarkManager,
    view: ViewState,
    shutdown_timeout: Duration,
    active: bool,
}

/// What deactivation accomplished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeactivationReport {
    /// Outcome of the final flush. `Unchanged` when an earlier signal
    /// already wrote the latest page.
    pub flush: FlushOutcome,
    pub final_page: u32,
    pub drained: bool,
}

impl ReaderSession {
    /// Must be called from within a tokio runtime.
    pub fn activate(
        book_id: impl Into<String>,
        initial_page: u32,
        store: Arc<dyn ProgressStore>,
        settings: &SyncSettings,
    ) -> Self {
        let session = Arc::new(ReadingSession::new(generate_session_id(), book_id));
        let writer = ProgressWriter::spawn(store);
        let tracker = PositionTracker::new(
            session.clone(),
            writer.clone(),
            initial_page,
            settings.debounce(),
        );
        let lifecycle = LifecycleFlushController::attach(tracker.clone());
        let bookmarks = BookmarkManager::new(session.clone(), writer.clone(), tracker.subscribe_page());

        info!(
            "Activated session {} for book {} at page {}",
            session.session_id,
            session.book_id,
            tracker.current_page()
        );

        Self {
            session,
            writer,
            tracker,
            lifecycle,
            bookmarks,
            view: ViewState::default(),
            shutdown_timeout: settings.shutdown_timeout(),
            active: true,
        }
    }

    pub fn session(&self) -> &ReadingSession {
        &self.session
    }

    pub fn current_page(&self) -> u32 {
        self.tracker.current_page()
    }

    pub async fn position(&self) -> PositionState {
        self.tracker.snapshot().await
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    pub fn writer(&self) -> &ProgressWriter {
        &self.writer
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewState {
        &mut self.view
    }

    /// Renderer callback once the document length is known.
    pub async fn on_document_loaded(&self, total_pages: u32) {
        self.tracker.set_total_pages(total_pages).await;
    }

    /// Navigates to `page` if it exists. Returns the page actually shown,
    /// or `None` if the request was out of range.
    pub async fn go_to_page(&self, page: i64) -> Option<u32> {
        let total_pages = self.tracker.snapshot().await.total_pages;
        let target = clamp_page(page, total_pages)?;
        self.tracker.on_page_changed(target).await;
        Some(target)
    }

    pub async fn next_page(&self) -> Option<u32> {
        self.go_to_page(i64::from(self.current_page()) + 1).await
    }

    pub async fn previous_page(&self) -> Option<u32> {
        self.go_to_page(i64::from(self.current_page()) - 1).await
    }

    /// Bookmarks the current page.
    pub fn add_bookmark(&mut self, note: Option<&str>) -> BookmarkChange {
        let page = self.current_page();
        self.bookmarks.add(page, note)
    }

    pub fn remove_bookmark(&mut self, page_number: u32) -> Option<Bookmark> {
        self.bookmarks.remove(page_number)
    }

    pub fn is_bookmarked(&self, page_number: u32) -> bool {
        self.bookmarks.is_bookmarked(page_number)
    }

    pub fn bookmarks(&self) -> Vec<Bookmark> {
        self.bookmarks.list()
    }

    /// Jumps to an existing bookmark. Unknown pages are ignored.
    pub async fn jump_to_bookmark(&self, page_number: u32) -> Option<u32> {
        if !self.bookmarks.is_bookmarked(page_number) {
            return None;
        }
        self.go_to_page(i64::from(page_number)).await
    }

    pub async fn force_flush(&self) -> FlushOutcome {
        self.tracker.force_flush().await
    }

    pub fn signal(&self, signal: LifecycleSignal) {
        self.lifecycle.signal(signal);
    }

    /// For hosts that report lifecycle events from elsewhere (signal
    /// handlers, window callbacks).
    pub fn lifecycle_sender(&self) -> LifecycleSender {
        self.lifecycle.sender()
    }

    /// Final flush and release of everything the session owns. The flush
    /// always runs; it writes nothing if the latest page is already saved.
    pub async fn deactivate(mut self) -> Result<DeactivationReport> {
        self.active = false;

        let flush = self.lifecycle.detach().await?;
        self.tracker.shutdown().await;

        let drained = match self.writer.shutdown(self.shutdown_timeout).await {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    "Session {} closed with writes still pending: {err:#}",
                    self.session.session_id
                );
                false
            }
        };

        let report = DeactivationReport {
            flush,
            final_page: self.tracker.current_page(),
            drained,
        };
        info!(
            "Deactivated session {} for book {}: {:?}",
            self.session.session_id, self.session.book_id, report
        );
        Ok(report)
    }
}

impl Drop for ReaderSession {
    fn drop(&mut self) {
        if !self.active {
            return;
        }

        self.lifecycle.detach_without_waiting();
        let outcome = self.tracker.flush_without_waiting();
        warn!(
            "Session {} dropped without deactivate; final flush: {:?}",
            self.session.session_id, outcome
        );
        self.writer.request_shutdown();
    }
}
