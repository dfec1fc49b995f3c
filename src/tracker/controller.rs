use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time,
};

use crate::models::{PersistenceWrite, ReadingSession};
use crate::store::ProgressWriter;

use super::{FlushOutcome, PositionState};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Debounced projection of the current page onto the store.
///
/// Every page change re-arms a single quiet-period timer; only when the
/// timer expires (or a forced flush arrives) is a write issued, and only if
/// the page differs from the last one written. Clones share the same state
/// and timer.
#[derive(Clone)]
pub struct PositionTracker {
    state: Arc<Mutex<PositionState>>,
    timer: Arc<Mutex<Option<JoinHandle<()>>>>,
    page_tx: Arc<watch::Sender<u32>>,
    session: Arc<ReadingSession>,
    writer: ProgressWriter,
    quiet_period: Duration,
}

impl PositionTracker {
    pub fn new(
        session: Arc<ReadingSession>,
        writer: ProgressWriter,
        initial_page: u32,
        quiet_period: Duration,
    ) -> Self {
        let state = PositionState::new(initial_page);
        let (page_tx, _) = watch::channel(state.current_page);

        Self {
            state: Arc::new(Mutex::new(state)),
            timer: Arc::new(Mutex::new(None)),
            page_tx: Arc::new(page_tx),
            session,
            writer,
            quiet_period,
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Shared read access to the authoritative current page.
    pub fn subscribe_page(&self) -> watch::Receiver<u32> {
        self.page_tx.subscribe()
    }

    pub fn current_page(&self) -> u32 {
        *self.page_tx.borrow()
    }

    pub async fn snapshot(&self) -> PositionState {
        self.state.lock().await.clone()
    }

    pub async fn has_pending_timer(&self) -> bool {
        self.timer
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Records a new current page and restarts the quiet period. Range
    /// checking is the caller's job.
    pub async fn on_page_changed(&self, new_page: u32) {
        self.state.lock().await.current_page = new_page;
        self.page_tx.send_replace(new_page);
        log_debug!("page changed to {new_page}; re-arming debounce");
        self.arm_timer().await;
    }

    /// Called once the renderer knows the document length. Re-arms the
    /// timer if an earlier flush had to be deferred.
    pub async fn set_total_pages(&self, total_pages: u32) {
        let rearm = {
            let mut state = self.state.lock().await;
            state.total_pages = total_pages;
            total_pages > 0 && state.deferred && state.has_unflushed_change()
        };

        if rearm {
            log_info!("document loaded with {total_pages} pages; resuming deferred flush");
            self.arm_timer().await;
        }
    }

    /// Cancels any pending timer and flushes immediately. A second call
    /// with no page change in between writes nothing.
    pub async fn force_flush(&self) -> FlushOutcome {
        self.cancel_timer().await;
        self.flush_now("forced").await
    }

    /// Releases the timer. Does not flush.
    pub async fn shutdown(&self) {
        self.cancel_timer().await;
    }

    /// Best-effort teardown for contexts that cannot await (`Drop`). If
    /// either lock is contended the corresponding step is skipped.
    pub fn flush_without_waiting(&self) -> Option<FlushOutcome> {
        if let Ok(mut timer) = self.timer.try_lock() {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }

        let mut state = self.state.try_lock().ok()?;
        let outcome = state.take_flush();
        if let FlushOutcome::Written(page) = outcome {
            self.writer
                .dispatch(PersistenceWrite::position(&self.session, page));
        }
        Some(outcome)
    }

    async fn arm_timer(&self) {
        let mut timer = self.timer.lock().await;
        if let Some(handle) = timer.take() {
            handle.abort();
        }

        let tracker = self.clone();
        let quiet_period = self.quiet_period;
        *timer = Some(tokio::spawn(async move {
            time::sleep(quiet_period).await;
            tracker.flush_now("debounce").await;
        }));
    }

    async fn cancel_timer(&self) {
        if let Some(handle) = self.timer.lock().await.take() {
            handle.abort();
        }
    }

    async fn flush_now(&self, trigger: &str) -> FlushOutcome {
        let mut state = self.state.lock().await;
        let outcome = state.take_flush();

        match outcome {
            FlushOutcome::Written(page) => {
                self.writer
                    .dispatch(PersistenceWrite::position(&self.session, page));
                log_info!(
                    "{trigger} flush: book {} now at page {page}",
                    self.session.book_id
                );
            }
            FlushOutcome::Unchanged => {
                log_debug!("{trigger} flush skipped; page {} already written", state.current_page);
            }
            FlushOutcome::Deferred => {
                log_warn!(
                    "{trigger} flush deferred for book {}: page count not known yet",
                    self.session.book_id
                );
            }
        }

        outcome
    }
}
