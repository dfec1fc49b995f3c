use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use log::debug;

use crate::db::Database;
use crate::models::{BookmarkLogEntry, PersistenceWrite, ProgressRecord};

use super::ProgressStore;

/// Durable store on top of the sqlite worker.
///
/// Position writes upsert the single `reading_progress` row for the book;
/// bookmark writes additionally append to `bookmark_log` in the same
/// transaction.
#[derive(Clone)]
pub struct SqliteProgressStore {
    db: Database,
}

impl SqliteProgressStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        Ok(Self {
            db: Database::new(path)?,
        })
    }

    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    /// Where a reader should resume this book, if it was ever opened.
    pub async fn latest_progress(&self, book_id: &str) -> Result<Option<ProgressRecord>> {
        self.db.get_progress(book_id).await
    }

    pub async fn list_progress(&self) -> Result<Vec<ProgressRecord>> {
        self.db.list_progress().await
    }

    pub async fn bookmarks_for_book(&self, book_id: &str) -> Result<Vec<BookmarkLogEntry>> {
        self.db.list_bookmarks_for_book(book_id).await
    }
}

#[async_trait]
impl ProgressStore for SqliteProgressStore {
    async fn record_progress(&self, write: &PersistenceWrite) -> Result<()> {
        let moved = self.db.record_write(write).await?;
        if !moved {
            debug!(
                "ignored stale progress for book {} (page {})",
                write.book_id, write.read_page
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::{Bookmark, ReadingSession};

    fn open_store() -> (tempfile::TempDir, SqliteProgressStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteProgressStore::open(dir.path().join("shelf.sqlite3")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn keeps_latest_page_per_book() {
        let (_dir, store) = open_store();
        let session = ReadingSession::new("sessionAAAAAAAAA".into(), "book-1");

        store
            .record_progress(&PersistenceWrite::position(&session, 3))
            .await
            .unwrap();
        store
            .record_progress(&PersistenceWrite::position(&session, 17))
            .await
            .unwrap();

        let latest = store.latest_progress("book-1").await.unwrap().unwrap();
        assert_eq!(latest.read_page, 17);
        assert_eq!(latest.session_id, "sessionAAAAAAAAA");
        assert!(store.latest_progress("book-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_write_does_not_regress_position() {
        let (_dir, store) = open_store();
        let session = ReadingSession::new("s1".into(), "book-1");

        let newer = PersistenceWrite::position(&session, 40);
        let mut stale = PersistenceWrite::position(&session, 12);
        stale.updated_at = newer.updated_at - Duration::seconds(30);

        store.record_progress(&newer).await.unwrap();
        store.record_progress(&stale).await.unwrap();

        assert_eq!(
            store.latest_progress("book-1").await.unwrap().unwrap().read_page,
            40
        );
    }

    #[tokio::test]
    async fn bookmark_log_is_append_only_and_idempotent() {
        let (_dir, store) = open_store();
        let session = ReadingSession::new("s1".into(), "book-1");

        let first = PersistenceWrite::bookmark(&session, 10, Bookmark::new(10, Some("nice quote")));
        let second = PersistenceWrite::bookmark(&session, 10, Bookmark::new(10, Some("other")));

        store.record_progress(&first).await.unwrap();
        store.record_progress(&first).await.unwrap();
        store.record_progress(&second).await.unwrap();

        let log = store.bookmarks_for_book("book-1").await.unwrap();
        let notes: Vec<_> = log.iter().map(|e| e.bookmark.note.clone()).collect();
        assert_eq!(
            notes,
            vec![Some("nice quote".to_string()), Some("other".to_string())]
        );
        assert_eq!(log[0].write_id, first.write_id);
    }

    #[tokio::test]
    async fn history_lists_most_recent_first() {
        let (_dir, store) = open_store();
        let first = ReadingSession::new("s1".into(), "book-a");
        let second = ReadingSession::new("s2".into(), "book-b");

        let mut older = PersistenceWrite::position(&first, 5);
        older.updated_at = older.updated_at - Duration::minutes(10);
        store.record_progress(&older).await.unwrap();
        store
            .record_progress(&PersistenceWrite::position(&second, 9))
            .await
            .unwrap();

        let books: Vec<_> = store
            .list_progress()
            .await
            .unwrap()
            .into_iter()
            .map(|record| record.book_id)
            .collect();
        assert_eq!(books, vec!["book-b".to_string(), "book-a".to_string()]);
    }

    #[tokio::test]
    async fn failed_bookmark_append_leaves_position_untouched() {
        let (_dir, store) = open_store();
        let session = ReadingSession::new("s1".into(), "book-1");
        store
            .record_progress(&PersistenceWrite::position(&session, 8))
            .await
            .unwrap();

        store
            .db
            .execute(|conn| {
                conn.execute_batch("DROP TABLE bookmark_log")?;
                Ok(())
            })
            .await
            .unwrap();

        let write = PersistenceWrite::bookmark(&session, 30, Bookmark::new(30, None));
        assert!(store.record_progress(&write).await.is_err());
        assert_eq!(
            store.latest_progress("book-1").await.unwrap().unwrap().read_page,
            8
        );
    }
}
