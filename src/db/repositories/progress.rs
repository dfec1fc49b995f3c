use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    helpers::{format_datetime, parse_datetime, to_page},
    Database,
};
use crate::models::{PersistenceWrite, ProgressRecord};

use super::bookmarks::append_bookmark_row;

fn row_to_progress(row: &Row) -> Result<ProgressRecord> {
    let read_page: i64 = row.get("read_page")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(ProgressRecord {
        book_id: row.get("book_id")?,
        session_id: row.get("session_id")?,
        read_page: to_page(read_page, "read_page")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

/// Keeps one row per book. An incoming write older than the stored one is
/// ignored, so late arrivals never move the cursor backwards. Returns
/// whether the row changed.
pub(crate) fn upsert_progress_row(conn: &Connection, write: &PersistenceWrite) -> Result<bool> {
    let changed = conn.execute(
        "INSERT INTO reading_progress (book_id, session_id, read_page, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(book_id) DO UPDATE SET
             session_id = excluded.session_id,
             read_page = excluded.read_page,
             updated_at = excluded.updated_at
         WHERE excluded.updated_at >= reading_progress.updated_at",
        params![
            write.book_id,
            write.session_id,
            i64::from(write.read_page),
            format_datetime(&write.updated_at),
        ],
    )?;
    Ok(changed > 0)
}

impl Database {
    /// Applies one write atomically: the progress upsert and, for bookmark
    /// writes, the log append commit together or not at all. Returns
    /// whether the progress row moved.
    pub async fn record_write(&self, write: &PersistenceWrite) -> Result<bool> {
        let write = write.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let moved = upsert_progress_row(&tx, &write)?;
            if write.is_bookmark() {
                append_bookmark_row(&tx, &write)?;
            }
            tx.commit()?;
            Ok(moved)
        })
        .await
    }

    pub async fn get_progress(&self, book_id: &str) -> Result<Option<ProgressRecord>> {
        let book_id = book_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT book_id, session_id, read_page, updated_at
                 FROM reading_progress
                 WHERE book_id = ?1",
            )?;
            let record = stmt
                .query_row(params![book_id], |row| Ok(row_to_progress(row)))
                .optional()?
                .transpose()?;
            Ok(record)
        })
        .await
    }

    /// Reading history, most recently updated first.
    pub async fn list_progress(&self) -> Result<Vec<ProgressRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT book_id, session_id, read_page, updated_at
                 FROM reading_progress
                 ORDER BY updated_at DESC",
            )?;
            let rows = stmt.query_map([], |row| Ok(row_to_progress(row)))?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row??);
            }
            Ok(records)
        })
        .await
    }
}
