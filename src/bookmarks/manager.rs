use std::sync::Arc;

use tokio::sync::watch;

use crate::models::{Bookmark, PersistenceWrite, ReadingSession};
use crate::store::ProgressWriter;

use super::BookmarkChange;

/// Owns the bookmark list of one session.
///
/// The list is the source of truth for the session's lifetime; the store
/// only ever receives additions. Every `add` is written immediately,
/// bypassing the position debounce, and carries the current page read from
/// the tracker.
pub struct BookmarkManager {
    bookmarks: Vec<Bookmark>,
    session: Arc<ReadingSession>,
    writer: ProgressWriter,
    current_page: watch::Receiver<u32>,
}

impl BookmarkManager {
    pub fn new(
        session: Arc<ReadingSession>,
        writer: ProgressWriter,
        current_page: watch::Receiver<u32>,
    ) -> Self {
        Self {
            bookmarks: Vec::new(),
            session,
            writer,
            current_page,
        }
    }

    /// Inserts or replaces the bookmark for `page_number`, keeping the list
    /// sorted, and dispatches it to the store.
    pub fn add(&mut self, page_number: u32, note: Option<&str>) -> BookmarkChange {
        let bookmark = Bookmark::new(page_number, note);
        let read_page = *self.current_page.borrow();

        let change = match self
            .bookmarks
            .binary_search_by_key(&page_number, |b| b.page_number)
        {
            Ok(index) => {
                let previous = std::mem::replace(&mut self.bookmarks[index], bookmark.clone());
                BookmarkChange::Replaced { previous }
            }
            Err(index) => {
                self.bookmarks.insert(index, bookmark.clone());
                BookmarkChange::Added
            }
        };

        log::info!(
            "bookmark {} on page {page_number} of book {}",
            change.verb(),
            self.session.book_id
        );
        self.writer.dispatch(PersistenceWrite::bookmark(
            &self.session,
            read_page,
            bookmark,
        ));

        change
    }

    /// Local-only removal. Missing pages are ignored.
    pub fn remove(&mut self, page_number: u32) -> Option<Bookmark> {
        let index = self
            .bookmarks
            .binary_search_by_key(&page_number, |b| b.page_number)
            .ok()?;
        Some(self.bookmarks.remove(index))
    }

    pub fn is_bookmarked(&self, page_number: u32) -> bool {
        self.get(page_number).is_some()
    }

    pub fn get(&self, page_number: u32) -> Option<&Bookmark> {
        self.bookmarks
            .binary_search_by_key(&page_number, |b| b.page_number)
            .ok()
            .map(|index| &self.bookmarks[index])
    }

    /// Sorted snapshot; later mutations are not reflected in it.
    pub fn list(&self) -> Vec<Bookmark> {
        self.bookmarks.clone()
    }

    pub fn len(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
    }
}
