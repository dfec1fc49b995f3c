//! The durable side of reading progress.
//!
//! The core only ever talks to a store through [`ProgressStore`]; the
//! transport behind it (HTTP, sqlite, memory) is the implementor's business.

pub mod memory;
pub mod sqlite;
pub mod writer;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::PersistenceWrite;

pub use memory::MemoryProgressStore;
pub use sqlite::SqliteProgressStore;
pub use writer::ProgressWriter;

/// Remote position store contract.
///
/// Implementations must keep at least the latest `read_page` per book and
/// an append-only log of bookmarks. Writes can arrive out of issuance order
/// across sessions, so "most recent" is decided by `updated_at`, never by
/// arrival. Repeating an identical write must be harmless.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn record_progress(&self, write: &PersistenceWrite) -> Result<()>;
}
