use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{check_id_cap, new_record_id, RecordStore};
use crate::error::Result;
use crate::types::{DriveLogEntry, NewSpec, RecordId, SearchLogEntry, SpecRecord};

#[derive(Default)]
struct Inner {
    specs: HashMap<RecordId, SpecRecord>,
    search_logs: Vec<SearchLogEntry>,
    drive_logs: Vec<DriveLogEntry>,
}

/// In-process store. Also counts `query_ids` calls so batching can be
/// observed from tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    id_queries: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `query_ids` calls served so far.
    pub fn id_queries(&self) -> usize {
        self.id_queries.load(Ordering::SeqCst)
    }

    pub async fn search_logs(&self) -> Vec<SearchLogEntry> {
        self.inner.read().await.search_logs.clone()
    }

    pub async fn drive_logs(&self) -> Vec<DriveLogEntry> {
        self.inner.read().await.drive_logs.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.specs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, spec: NewSpec) -> Result<SpecRecord> {
        let record = SpecRecord {
            id: new_record_id(),
            owner_id: spec.owner_id,
            product_idea: spec.product_idea,
            spec_text: spec.spec_text,
            created_at: Utc::now(),
        };
        self.inner
            .write()
            .await
            .specs
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<SpecRecord>> {
        Ok(self.inner.read().await.specs.get(id).cloned())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<SpecRecord>> {
        let inner = self.inner.read().await;
        let mut out: Vec<SpecRecord> = inner
            .specs
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    async fn query_ids(&self, ids: &[RecordId]) -> Result<Vec<SpecRecord>> {
        check_id_cap(ids)?;
        self.id_queries.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.read().await;
        Ok(ids.iter().filter_map(|id| inner.specs.get(id).cloned()).collect())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.inner.write().await.specs.remove(id).is_some())
    }

    async fn append_search_log(&self, entry: SearchLogEntry) -> Result<()> {
        self.inner.write().await.search_logs.push(entry);
        Ok(())
    }

    async fn append_drive_log(&self, entry: DriveLogEntry) -> Result<()> {
        self.inner.write().await.drive_logs.push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_spec(owner: &str, idea: &str) -> NewSpec {
        NewSpec {
            owner_id: owner.into(),
            product_idea: idea.into(),
            spec_text: format!("# {idea}"),
        }
    }

    #[tokio::test]
    async fn insert_assigns_id_and_timestamp() {
        let store = MemoryStore::new();
        let rec = store.insert(new_spec("u1", "todo")).await.unwrap();
        assert!(!rec.id.is_empty());
        assert_eq!(store.get(&rec.id).await.unwrap(), Some(rec));
    }

    #[tokio::test]
    async fn list_by_owner_is_newest_first_and_scoped() {
        let store = MemoryStore::new();
        let a = store.insert(new_spec("u1", "first")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let b = store.insert(new_spec("u1", "second")).await.unwrap();
        store.insert(new_spec("u2", "other")).await.unwrap();

        let list = store.list_by_owner("u1").await.unwrap();
        let ids: Vec<_> = list.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn query_ids_enforces_cap() {
        let store = MemoryStore::new();
        let ids: Vec<RecordId> = (0..11).map(|i| i.to_string()).collect();
        assert!(store.query_ids(&ids).await.is_err());
        assert_eq!(store.id_queries(), 0);
    }

    #[tokio::test]
    async fn query_ids_skips_missing() {
        let store = MemoryStore::new();
        let rec = store.insert(new_spec("u1", "todo")).await.unwrap();
        let found = store
            .query_ids(&[rec.id.clone(), "missing".into()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(store.id_queries(), 1);
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let store = MemoryStore::new();
        let rec = store.insert(new_spec("u1", "todo")).await.unwrap();
        assert!(store.delete(&rec.id).await.unwrap());
        assert!(!store.delete(&rec.id).await.unwrap());
        assert!(store.is_empty().await);
    }
}
