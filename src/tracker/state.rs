use serde::Serialize;

/// Result of one flush step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FlushOutcome {
    /// A write for this page was dispatched.
    Written(u32),
    /// Current page already matches the last acknowledged one.
    Unchanged,
    /// Page count is not known yet; nothing was written.
    Deferred,
}

/// Durable cursor of a session as seen by the tracker.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionState {
    pub current_page: u32,
    /// Last page a write was issued for. Set optimistically when the write
    /// is dispatched and never rolled back on failure.
    pub last_acknowledged_page: u32,
    /// Zero until the renderer reports the document length.
    pub total_pages: u32,
    /// A flush found `total_pages == 0` and is waiting for the document.
    pub deferred: bool,
}

impl PositionState {
    /// The initial page comes from the activating view (usually a resumed
    /// position) and is treated as already durable.
    pub fn new(initial_page: u32) -> Self {
        let page = initial_page.max(1);
        Self {
            current_page: page,
            last_acknowledged_page: page,
            total_pages: 0,
            deferred: false,
        }
    }

    pub fn has_unflushed_change(&self) -> bool {
        self.current_page != self.last_acknowledged_page
    }

    /// Decides whether a write is due and, if so, acknowledges it.
    /// Returns the page to write.
    pub fn take_flush(&mut self) -> FlushOutcome {
        if self.total_pages == 0 {
            self.deferred = self.has_unflushed_change();
            return FlushOutcome::Deferred;
        }
        self.deferred = false;

        if !self.has_unflushed_change() {
            return FlushOutcome::Unchanged;
        }

        self.last_acknowledged_page = self.current_page;
        FlushOutcome::Written(self.current_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acknowledges_once_per_change() {
        let mut state = PositionState::new(1);
        state.total_pages = 100;
        state.current_page = 7;

        assert_eq!(state.take_flush(), FlushOutcome::Written(7));
        assert_eq!(state.last_acknowledged_page, 7);
        assert_eq!(state.take_flush(), FlushOutcome::Unchanged);
    }

    #[test]
    fn defers_until_page_count_is_known() {
        let mut state = PositionState::new(3);
        state.current_page = 4;

        assert_eq!(state.take_flush(), FlushOutcome::Deferred);
        assert!(state.deferred);
        assert_eq!(state.last_acknowledged_page, 3);

        state.total_pages = 10;
        assert_eq!(state.take_flush(), FlushOutcome::Written(4));
        assert!(!state.deferred);
    }

    #[test]
    fn zero_initial_page_is_lifted_to_first_page() {
        let state = PositionState::new(0);
        assert_eq!(state.current_page, 1);
        assert!(!state.has_unflushed_change());
    }
}
