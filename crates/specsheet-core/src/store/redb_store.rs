//! Persistent record store using redb.
//!
//! # Table design
//!
//! - `SPECS`: record id → JSON-encoded [`SpecRecord`].
//! - `SEARCH_LOGS` / `DRIVE_LOGS`: 24-byte composite key
//!   ```text
//!   [ timestamp_ms: u64 big-endian (8 bytes) | uuid: 16 bytes ]
//!   ```
//!   so byte order equals append order. Values are JSON.
//!
//! redb is synchronous; every operation runs on the blocking pool.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use uuid::Uuid;

use super::{check_id_cap, new_record_id, RecordStore};
use crate::error::{Result, SpecsheetError};
use crate::types::{DriveLogEntry, NewSpec, RecordId, SearchLogEntry, SpecRecord};

const SPECS: TableDefinition<&str, &[u8]> = TableDefinition::new("specs");
const SEARCH_LOGS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("search_logs");
const DRIVE_LOGS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("drive_logs");

fn log_key(ts: DateTime<Utc>) -> [u8; 24] {
    let mut key = [0u8; 24];
    let ms = ts.timestamp_millis().max(0) as u64;
    key[..8].copy_from_slice(&ms.to_be_bytes());
    key[8..].copy_from_slice(Uuid::new_v4().as_bytes());
    key
}

fn db_err(e: impl std::fmt::Display) -> SpecsheetError {
    SpecsheetError::Store(e.to_string())
}

pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create the database at `path`, creating parent directories
    /// and all tables.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(db_err)?;
        let wt = db.begin_write().map_err(db_err)?;
        wt.open_table(SPECS).map_err(db_err)?;
        wt.open_table(SEARCH_LOGS).map_err(db_err)?;
        wt.open_table(DRIVE_LOGS).map_err(db_err)?;
        wt.commit().map_err(db_err)?;
        Ok(Self { db: Arc::new(db) })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(db_err)?
    }

    /// All search log entries in append order.
    pub async fn search_logs(&self) -> Result<Vec<SearchLogEntry>> {
        self.blocking(|db| read_log(db, SEARCH_LOGS)).await
    }

    /// All drive log entries in append order.
    pub async fn drive_logs(&self) -> Result<Vec<DriveLogEntry>> {
        self.blocking(|db| read_log(db, DRIVE_LOGS)).await
    }
}

fn append_log<T: serde::Serialize>(
    db: &Database,
    table: TableDefinition<'static, &'static [u8], &'static [u8]>,
    ts: DateTime<Utc>,
    entry: &T,
) -> Result<()> {
    let key = log_key(ts);
    let value = serde_json::to_vec(entry)?;
    let wt = db.begin_write().map_err(db_err)?;
    {
        let mut t = wt.open_table(table).map_err(db_err)?;
        t.insert(key.as_slice(), value.as_slice()).map_err(db_err)?;
    }
    wt.commit().map_err(db_err)?;
    Ok(())
}

fn read_log<T: serde::de::DeserializeOwned>(
    db: &Database,
    table: TableDefinition<'static, &'static [u8], &'static [u8]>,
) -> Result<Vec<T>> {
    let rt = db.begin_read().map_err(db_err)?;
    let t = rt.open_table(table).map_err(db_err)?;
    let mut out = Vec::new();
    for entry in t.iter().map_err(db_err)? {
        let (_, v) = entry.map_err(db_err)?;
        out.push(serde_json::from_slice(v.value())?);
    }
    Ok(out)
}

fn read_spec(db: &Database, id: &str) -> Result<Option<SpecRecord>> {
    let rt = db.begin_read().map_err(db_err)?;
    let t = rt.open_table(SPECS).map_err(db_err)?;
    match t.get(id).map_err(db_err)? {
        Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
        None => Ok(None),
    }
}

#[async_trait]
impl RecordStore for RedbStore {
    async fn insert(&self, spec: NewSpec) -> Result<SpecRecord> {
        let record = SpecRecord {
            id: new_record_id(),
            owner_id: spec.owner_id,
            product_idea: spec.product_idea,
            spec_text: spec.spec_text,
            created_at: Utc::now(),
        };
        let stored = record.clone();
        self.blocking(move |db| {
            let value = serde_json::to_vec(&stored)?;
            let wt = db.begin_write().map_err(db_err)?;
            {
                let mut t = wt.open_table(SPECS).map_err(db_err)?;
                t.insert(stored.id.as_str(), value.as_slice())
                    .map_err(db_err)?;
            }
            wt.commit().map_err(db_err)?;
            Ok(())
        })
        .await?;
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<SpecRecord>> {
        let id = id.to_string();
        self.blocking(move |db| read_spec(db, &id)).await
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<SpecRecord>> {
        let owner_id = owner_id.to_string();
        self.blocking(move |db| {
            let rt = db.begin_read().map_err(db_err)?;
            let t = rt.open_table(SPECS).map_err(db_err)?;
            let mut out = Vec::new();
            for entry in t.iter().map_err(db_err)? {
                let (_, v) = entry.map_err(db_err)?;
                let rec: SpecRecord = serde_json::from_slice(v.value())?;
                if rec.owner_id == owner_id {
                    out.push(rec);
                }
            }
            out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(out)
        })
        .await
    }

    async fn query_ids(&self, ids: &[RecordId]) -> Result<Vec<SpecRecord>> {
        check_id_cap(ids)?;
        let ids = ids.to_vec();
        self.blocking(move |db| {
            let rt = db.begin_read().map_err(db_err)?;
            let t = rt.open_table(SPECS).map_err(db_err)?;
            let mut out = Vec::with_capacity(ids.len());
            for id in &ids {
                if let Some(v) = t.get(id.as_str()).map_err(db_err)? {
                    out.push(serde_json::from_slice(v.value())?);
                }
            }
            Ok(out)
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.blocking(move |db| {
            let wt = db.begin_write().map_err(db_err)?;
            let existed = {
                let mut t = wt.open_table(SPECS).map_err(db_err)?;
                let removed = t.remove(id.as_str()).map_err(db_err)?;
                removed.is_some()
            };
            wt.commit().map_err(db_err)?;
            Ok(existed)
        })
        .await
    }

    async fn append_search_log(&self, entry: SearchLogEntry) -> Result<()> {
        self.blocking(move |db| append_log(db, SEARCH_LOGS, entry.timestamp, &entry))
            .await
    }

    async fn append_drive_log(&self, entry: DriveLogEntry) -> Result<()> {
        self.blocking(move |db| append_log(db, DRIVE_LOGS, entry.timestamp, &entry))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QueryType;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, RedbStore) {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(&dir.path().join("nested").join("specs.redb")).unwrap();
        (dir, store)
    }

    fn new_spec(owner: &str, idea: &str) -> NewSpec {
        NewSpec {
            owner_id: owner.into(),
            product_idea: idea.into(),
            spec_text: format!("# {idea}"),
        }
    }

    #[tokio::test]
    async fn insert_then_get() {
        let (_dir, store) = open_tmp();
        let rec = store.insert(new_spec("u1", "todo")).await.unwrap();
        let got = store.get(&rec.id).await.unwrap().unwrap();
        assert_eq!(got, rec);
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_by_owner_newest_first() {
        let (_dir, store) = open_tmp();
        let a = store.insert(new_spec("u1", "a")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let b = store.insert(new_spec("u1", "b")).await.unwrap();
        store.insert(new_spec("u2", "c")).await.unwrap();
        let ids: Vec<_> = store
            .list_by_owner("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("specs.redb");
        let id = {
            let store = RedbStore::open(&path).unwrap();
            store.insert(new_spec("u1", "todo")).await.unwrap().id
        };
        let store = RedbStore::open(&path).unwrap();
        assert!(store.get(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let (_dir, store) = open_tmp();
        let rec = store.insert(new_spec("u1", "todo")).await.unwrap();
        assert!(store.delete(&rec.id).await.unwrap());
        assert!(!store.delete(&rec.id).await.unwrap());
        assert!(store.list_by_owner("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn query_ids_caps_and_skips_missing() {
        let (_dir, store) = open_tmp();
        let rec = store.insert(new_spec("u1", "todo")).await.unwrap();
        let found = store
            .query_ids(&[rec.id.clone(), "gone".into()])
            .await
            .unwrap();
        assert_eq!(found, vec![rec]);

        let too_many: Vec<RecordId> = (0..11).map(|i| i.to_string()).collect();
        assert!(matches!(
            store.query_ids(&too_many).await,
            Err(SpecsheetError::Store(_))
        ));
    }

    #[tokio::test]
    async fn logs_append_in_order() {
        let (_dir, store) = open_tmp();
        for q in ["first", "second"] {
            store
                .append_search_log(SearchLogEntry {
                    owner_id: "anonymous".into(),
                    query_type: QueryType::Text,
                    query_text: q.into(),
                    matched_ids: vec![],
                    latency_ms: 1,
                    timestamp: Utc::now(),
                })
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        let logs = store.search_logs().await.unwrap();
        let queries: Vec<_> = logs.iter().map(|l| l.query_text.as_str()).collect();
        assert_eq!(queries, vec!["first", "second"]);
    }
}
