use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{Context, Result};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::tracker::{FlushOutcome, PositionTracker};

use super::LifecycleSignal;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Cloneable handle hosts use to report visibility and unload events.
#[derive(Clone)]
pub struct LifecycleSender {
    tx: mpsc::UnboundedSender<LifecycleSignal>,
}

impl LifecycleSender {
    /// Returns false once the listener has been detached.
    pub fn send(&self, signal: LifecycleSignal) -> bool {
        self.tx.send(signal).is_ok()
    }
}

/// Records that teardown has begun. Every teardown trigger still flushes;
/// the guard only decides which one reports as the first.
struct TeardownGuard {
    started: AtomicBool,
}

impl TeardownGuard {
    fn begin(&self) -> bool {
        self.started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn has_begun(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}

/// Maps every "view is going away" signal onto the tracker's forced flush.
pub struct LifecycleFlushController {
    tracker: PositionTracker,
    sender: LifecycleSender,
    guard: Arc<TeardownGuard>,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl LifecycleFlushController {
    /// Starts listening for signals. Must be called from within a tokio
    /// runtime.
    pub fn attach(tracker: PositionTracker) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let guard = Arc::new(TeardownGuard {
            started: AtomicBool::new(false),
        });
        let cancel_token = CancellationToken::new();

        let handle = tokio::spawn(listen(
            tracker.clone(),
            rx,
            guard.clone(),
            cancel_token.clone(),
        ));

        Self {
            tracker,
            sender: LifecycleSender { tx },
            guard,
            cancel_token,
            handle: Some(handle),
        }
    }

    pub fn sender(&self) -> LifecycleSender {
        self.sender.clone()
    }

    pub fn signal(&self, signal: LifecycleSignal) {
        if !self.sender.send(signal) {
            log_warn!("lifecycle listener already detached; dropping {signal:?}");
        }
    }

    /// True once any teardown trigger (`Unloading`, `Deactivated`) has fired.
    pub fn teardown_started(&self) -> bool {
        self.guard.has_begun()
    }

    /// Flushes the latest page, then stops the listener and waits for it to
    /// exit. An earlier `Unloading` does not skip the flush: the host may
    /// have cancelled the unload and kept reading.
    pub async fn detach(&mut self) -> Result<FlushOutcome> {
        let outcome = teardown_flush(&self.tracker, &self.guard, LifecycleSignal::Deactivated).await;

        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("lifecycle listener task failed to join")?;
        }

        Ok(outcome)
    }

    /// Non-awaiting release for `Drop`: marks teardown, stops the listener.
    /// The caller is responsible for the flush itself.
    pub fn detach_without_waiting(&mut self) {
        self.guard.begin();
        self.cancel_token.cancel();
        self.handle.take();
    }
}

async fn teardown_flush(
    tracker: &PositionTracker,
    guard: &TeardownGuard,
    trigger: LifecycleSignal,
) -> FlushOutcome {
    let first = guard.begin();
    let outcome = tracker.force_flush().await;
    if first {
        log_info!("teardown flush on {trigger:?}: {outcome:?}");
    } else {
        log_debug!("repeated teardown flush on {trigger:?}: {outcome:?}");
    }
    outcome
}

async fn listen(
    tracker: PositionTracker,
    mut rx: mpsc::UnboundedReceiver<LifecycleSignal>,
    guard: Arc<TeardownGuard>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            signal = rx.recv() => {
                let Some(signal) = signal else { break };
                match signal {
                    LifecycleSignal::Hidden => {
                        let outcome = tracker.force_flush().await;
                        log_debug!("flush on hidden: {outcome:?}");
                    }
                    LifecycleSignal::Visible => {
                        log_debug!("view visible again");
                    }
                    LifecycleSignal::Unloading | LifecycleSignal::Deactivated => {
                        teardown_flush(&tracker, &guard, signal).await;
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_debug!("lifecycle listener shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time;

    use super::*;
    use crate::models::ReadingSession;
    use crate::store::{MemoryProgressStore, ProgressWriter};

    const QUIET: Duration = Duration::from_millis(2000);

    async fn setup() -> (Arc<MemoryProgressStore>, ProgressWriter, PositionTracker) {
        let store = Arc::new(MemoryProgressStore::new());
        let writer = ProgressWriter::spawn(store.clone());
        let session = Arc::new(ReadingSession::new("lifecycleSess001".into(), "book-1"));
        let tracker = PositionTracker::new(session, writer.clone(), 1, QUIET);
        tracker.set_total_pages(100).await;
        (store, writer, tracker)
    }

    fn pages(store: &MemoryProgressStore) -> Vec<u32> {
        store.writes().iter().map(|w| w.read_page).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_flushes_latest_page_once() {
        let (store, writer, tracker) = setup().await;
        let mut lifecycle = LifecycleFlushController::attach(tracker.clone());

        tracker.on_page_changed(3).await;
        lifecycle.signal(LifecycleSignal::Hidden);
        time::sleep(Duration::from_millis(10)).await;
        assert!(!tracker.has_pending_timer().await);

        time::sleep(QUIET * 2).await;
        assert_eq!(lifecycle.detach().await.unwrap(), FlushOutcome::Unchanged);
        writer.shutdown(Duration::from_secs(5)).await.unwrap();

        assert_eq!(pages(&store), vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_teardown_signals_flush_once() {
        let (store, writer, tracker) = setup().await;
        let mut lifecycle = LifecycleFlushController::attach(tracker.clone());
        let sender = lifecycle.sender();

        tracker.on_page_changed(42).await;
        assert!(sender.send(LifecycleSignal::Hidden));
        assert!(sender.send(LifecycleSignal::Unloading));
        assert!(sender.send(LifecycleSignal::Unloading));
        time::sleep(Duration::from_millis(10)).await;

        assert!(lifecycle.teardown_started());
        assert_eq!(lifecycle.detach().await.unwrap(), FlushOutcome::Unchanged);
        writer.shutdown(Duration::from_secs(5)).await.unwrap();

        assert_eq!(pages(&store), vec![42]);
    }

    #[tokio::test(start_paused = true)]
    async fn detach_flushes_and_stops_listening() {
        let (store, writer, tracker) = setup().await;
        let mut lifecycle = LifecycleFlushController::attach(tracker.clone());
        let sender = lifecycle.sender();

        tracker.on_page_changed(7).await;
        assert_eq!(lifecycle.detach().await.unwrap(), FlushOutcome::Written(7));
        assert!(!sender.send(LifecycleSignal::Hidden));
        writer.shutdown(Duration::from_secs(5)).await.unwrap();

        assert_eq!(pages(&store), vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn visible_does_not_write() {
        let (store, writer, tracker) = setup().await;
        let mut lifecycle = LifecycleFlushController::attach(tracker.clone());

        tracker.on_page_changed(5).await;
        lifecycle.signal(LifecycleSignal::Visible);
        time::sleep(Duration::from_millis(10)).await;
        assert!(tracker.has_pending_timer().await);

        tracker.shutdown().await;
        lifecycle.detach_without_waiting();
        writer.shutdown(Duration::from_secs(5)).await.unwrap();

        assert!(store.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reading_after_cancelled_unload_is_still_flushed() {
        let (store, writer, tracker) = setup().await;
        let mut lifecycle = LifecycleFlushController::attach(tracker.clone());

        tracker.on_page_changed(10).await;
        lifecycle.signal(LifecycleSignal::Unloading);
        time::sleep(Duration::from_millis(10)).await;
        assert!(lifecycle.teardown_started());

        tracker.on_page_changed(25).await;
        lifecycle.signal(LifecycleSignal::Hidden);
        time::sleep(Duration::from_millis(10)).await;
        assert!(!tracker.has_pending_timer().await);

        tracker.on_page_changed(40).await;
        assert_eq!(lifecycle.detach().await.unwrap(), FlushOutcome::Written(40));
        writer.shutdown(Duration::from_secs(5)).await.unwrap();

        assert_eq!(pages(&store), vec![10, 25, 40]);
    }
}
