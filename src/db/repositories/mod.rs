pub mod bookmarks;
pub mod progress;
