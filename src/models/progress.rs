use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Bookmark, ReadingSession};

/// The unit sent to a [`crate::store::ProgressStore`].
///
/// `bookmark` is only present when the write comes from a bookmark
/// mutation; position flushes leave it empty. `write_id` is fresh per write
/// so a store can recognise a redelivered request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceWrite {
    pub write_id: String,
    pub session_id: String,
    pub book_id: String,
    pub read_page: u32,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmark: Option<Bookmark>,
}

impl PersistenceWrite {
    pub fn position(session: &ReadingSession, read_page: u32) -> Self {
        Self {
            write_id: Uuid::new_v4().to_string(),
            session_id: session.session_id.clone(),
            book_id: session.book_id.clone(),
            read_page,
            updated_at: Utc::now(),
            bookmark: None,
        }
    }

    pub fn bookmark(session: &ReadingSession, read_page: u32, bookmark: Bookmark) -> Self {
        Self {
            bookmark: Some(bookmark),
            ..Self::position(session, read_page)
        }
    }

    pub fn is_bookmark(&self) -> bool {
        self.bookmark.is_some()
    }
}

/// Latest recorded position for a book.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub book_id: String,
    pub session_id: String,
    pub read_page: u32,
    pub updated_at: DateTime<Utc>,
}

impl From<&PersistenceWrite> for ProgressRecord {
    fn from(write: &PersistenceWrite) -> Self {
        Self {
            book_id: write.book_id.clone(),
            session_id: write.session_id.clone(),
            read_page: write.read_page,
            updated_at: write.updated_at,
        }
    }
}
