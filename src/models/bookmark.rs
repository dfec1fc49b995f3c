use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub page_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Bookmark {
    /// Builds a bookmark stamped with the current instant. Blank notes are
    /// stored as `None`.
    pub fn new(page_number: u32, note: Option<&str>) -> Self {
        let note = note
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_owned);

        Self {
            page_number,
            note,
            timestamp: Utc::now(),
        }
    }
}

/// A bookmark as recorded in a store's append-only log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkLogEntry {
    pub write_id: String,
    pub book_id: String,
    pub session_id: String,
    pub bookmark: Bookmark,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_notes_collapse_to_none() {
        assert_eq!(Bookmark::new(3, Some("   ")).note, None);
        assert_eq!(Bookmark::new(3, None).note, None);
        assert_eq!(
            Bookmark::new(3, Some("  nice quote ")).note.as_deref(),
            Some("nice quote")
        );
    }

    #[test]
    fn serializes_with_camel_case_and_skips_missing_note() {
        let bookmark = Bookmark::new(10, None);
        let json = serde_json::to_value(&bookmark).unwrap();
        assert_eq!(json["pageNumber"], 10);
        assert!(json.get("note").is_none());
        assert!(json.get("timestamp").is_some());
    }
}
