pub mod manager;

use crate::models::Bookmark;

pub use manager::BookmarkManager;

/// What an `add` did to the local list. A second bookmark on the same
/// page replaces the first rather than sitting next to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookmarkChange {
    Added,
    Replaced { previous: Bookmark },
}

impl BookmarkChange {
    fn verb(&self) -> &'static str {
        match self {
            BookmarkChange::Added => "added",
            BookmarkChange::Replaced { .. } => "replaced",
        }
    }
}
