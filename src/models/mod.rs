pub mod bookmark;
pub mod progress;
pub mod session;

pub use bookmark::{Bookmark, BookmarkLogEntry};
pub use progress::{PersistenceWrite, ProgressRecord};
pub use session::ReadingSession;
