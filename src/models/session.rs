use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One activation of the reader view for one book.
///
/// Never persisted on its own; `session_id` only tags the writes issued
/// while the view is open.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReadingSession {
    pub session_id: String,
    pub book_id: String,
    pub started_at: DateTime<Utc>,
}

impl ReadingSession {
    pub fn new(session_id: String, book_id: impl Into<String>) -> Self {
        Self {
            session_id,
            book_id: book_id.into(),
            started_at: Utc::now(),
        }
    }
}
