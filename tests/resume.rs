use std::{sync::Arc, time::Duration};

use shelf_reader::{LifecycleSignal, ReaderSession, SqliteProgressStore, SyncSettings};

fn settings(dir: &tempfile::TempDir) -> SyncSettings {
    SyncSettings {
        debounce_ms: 50,
        shutdown_timeout_ms: 5_000,
        database_path: dir.path().join("shelf.sqlite3"),
    }
}

#[tokio::test]
async fn reopening_a_book_resumes_where_the_last_session_left_off() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(&dir);
    let store = SqliteProgressStore::open(settings.database_path.clone()).unwrap();

    let mut first = ReaderSession::activate("dune", 1, Arc::new(store.clone()), &settings);
    first.on_document_loaded(412).await;
    first.go_to_page(57).await;
    first.add_bookmark(Some("spice must flow"));
    first.go_to_page(58).await;
    let first_id = first.session().session_id.clone();
    first.deactivate().await.unwrap();

    let resumed = store.latest_progress("dune").await.unwrap().unwrap();
    assert_eq!(resumed.read_page, 58);
    assert_eq!(resumed.session_id, first_id);

    let second = ReaderSession::activate("dune", resumed.read_page, Arc::new(store.clone()), &settings);
    assert_ne!(second.session().session_id, first_id);
    assert_eq!(second.current_page(), 58);
    second.on_document_loaded(412).await;
    let report = second.deactivate().await.unwrap();
    assert!(report.drained);

    let log = store.bookmarks_for_book("dune").await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].bookmark.page_number, 57);
    assert_eq!(log[0].bookmark.note.as_deref(), Some("spice must flow"));
}

#[tokio::test]
async fn debounced_position_lands_in_sqlite_without_deactivation() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(&dir);
    let store = SqliteProgressStore::open(settings.database_path.clone()).unwrap();

    let session = ReaderSession::activate("emma", 1, Arc::new(store.clone()), &settings);
    session.on_document_loaded(300).await;
    for page in 2..=6 {
        session.go_to_page(page).await;
    }

    let mut recorded = None;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        recorded = store.latest_progress("emma").await.unwrap();
        if recorded.is_some() {
            break;
        }
    }
    assert_eq!(recorded.map(|r| r.read_page), Some(6));

    session.signal(LifecycleSignal::Unloading);
    let report = session.deactivate().await.unwrap();
    assert_eq!(report.final_page, 6);
}
