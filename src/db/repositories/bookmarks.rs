use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, Connection, Row};

use crate::db::{
    helpers::{format_datetime, parse_datetime, to_page},
    Database,
};
use crate::models::{Bookmark, BookmarkLogEntry, PersistenceWrite};

fn row_to_entry(row: &Row) -> Result<BookmarkLogEntry> {
    let page_number: i64 = row.get("page_number")?;
    let created_at: String = row.get("created_at")?;
    let recorded_at: String = row.get("recorded_at")?;

    Ok(BookmarkLogEntry {
        write_id: row.get("write_id")?,
        book_id: row.get("book_id")?,
        session_id: row.get("session_id")?,
        bookmark: Bookmark {
            page_number: to_page(page_number, "page_number")?,
            note: row.get("note")?,
            timestamp: parse_datetime(&created_at, "created_at")?,
        },
        recorded_at: parse_datetime(&recorded_at, "recorded_at")?,
    })
}

/// Appends the bookmark carried by `write`. Keyed by `write_id`, so a
/// redelivered write is ignored. Returns whether a row was inserted.
pub(crate) fn append_bookmark_row(conn: &Connection, write: &PersistenceWrite) -> Result<bool> {
    let bookmark = write
        .bookmark
        .as_ref()
        .ok_or_else(|| anyhow!("write {} carries no bookmark", write.write_id))?;

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO bookmark_log
             (write_id, book_id, session_id, page_number, note, created_at, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            write.write_id,
            write.book_id,
            write.session_id,
            i64::from(bookmark.page_number),
            bookmark.note,
            format_datetime(&bookmark.timestamp),
            format_datetime(&Utc::now()),
        ],
    )?;
    Ok(inserted > 0)
}

impl Database {
    /// The full append-only log for a book, in the order it was recorded.
    pub async fn list_bookmarks_for_book(&self, book_id: &str) -> Result<Vec<BookmarkLogEntry>> {
        let book_id = book_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT write_id, book_id, session_id, page_number, note, created_at, recorded_at
                 FROM bookmark_log
                 WHERE book_id = ?1
                 ORDER BY recorded_at ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(params![book_id], |row| Ok(row_to_entry(row)))?;

            let mut entries = Vec::new();
            for row in rows {
                entries.push(row??);
            }
            Ok(entries)
        })
        .await
    }
}
