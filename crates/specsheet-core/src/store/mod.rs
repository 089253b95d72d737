//! Record store seam and its two backends.
//!
//! - [`MemoryStore`] keeps everything in process (default, and tests).
//! - [`RedbStore`] persists to a single redb file.
//!
//! Both enforce the same id-lookup cap as the hosted document store the
//! service was designed against: [`RecordStore::query_ids`] accepts at most
//! [`MAX_IDS_PER_QUERY`] ids. Batching lives in [`crate::records`].

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{DriveLogEntry, NewSpec, RecordId, SearchLogEntry, SpecRecord};

mod memory;
mod redb_store;

pub use self::memory::MemoryStore;
pub use self::redb_store::RedbStore;

/// Upper bound on ids accepted by one [`RecordStore::query_ids`] call.
pub const MAX_IDS_PER_QUERY: usize = 10;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append a record; the store assigns the id and `created_at`.
    async fn insert(&self, spec: NewSpec) -> Result<SpecRecord>;

    async fn get(&self, id: &str) -> Result<Option<SpecRecord>>;

    /// Records owned by `owner_id`, newest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<SpecRecord>>;

    /// One lookup of up to [`MAX_IDS_PER_QUERY`] ids. Missing ids are
    /// skipped; result order is unspecified.
    async fn query_ids(&self, ids: &[RecordId]) -> Result<Vec<SpecRecord>>;

    /// Returns `false` when no record had that id.
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn append_search_log(&self, entry: SearchLogEntry) -> Result<()>;

    async fn append_drive_log(&self, entry: DriveLogEntry) -> Result<()>;
}

pub(crate) fn check_id_cap(ids: &[RecordId]) -> Result<()> {
    if ids.len() > MAX_IDS_PER_QUERY {
        return Err(crate::error::SpecsheetError::Store(format!(
            "query_ids accepts at most {MAX_IDS_PER_QUERY} ids, got {}",
            ids.len()
        )));
    }
    Ok(())
}

pub(crate) fn new_record_id() -> RecordId {
    uuid::Uuid::new_v4().simple().to_string()
}
