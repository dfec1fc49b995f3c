//! Reading-position and bookmark sync core for the Shelf reader.
//!
//! A [`ReaderSession`] watches the current page of an open document and
//! lazily projects it to a [`ProgressStore`]: page turns are debounced,
//! bookmark additions go out immediately, and every way the view can
//! disappear funnels into one forced flush.

mod utils;

pub mod bookmarks;
pub mod db;
pub mod lifecycle;
pub mod models;
pub mod session;
pub mod settings;
pub mod store;
pub mod tracker;
pub mod view;

pub use bookmarks::{BookmarkChange, BookmarkManager};
pub use lifecycle::{LifecycleFlushController, LifecycleSender, LifecycleSignal};
pub use models::{Bookmark, BookmarkLogEntry, PersistenceWrite, ProgressRecord, ReadingSession};
pub use session::{generate_session_id, DeactivationReport, ReaderSession};
pub use settings::{SettingsStore, SyncSettings};
pub use store::{MemoryProgressStore, ProgressStore, ProgressWriter, SqliteProgressStore};
pub use tracker::{FlushOutcome, PositionState, PositionTracker};
pub use view::ViewState;
