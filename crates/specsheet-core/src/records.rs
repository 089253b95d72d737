//! Record gateway: the only write path into the record store.
//!
//! Every successful create/delete is followed by an index sync (spawned)
//! and a [`SpecChange`] broadcast for live views.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::error::{Result, SpecsheetError};
use crate::index::IndexObject;
use crate::store::{RecordStore, MAX_IDS_PER_QUERY};
use crate::sync::{IndexChange, IndexSync};
use crate::types::{ChangeKind, NewSpec, RecordId, SpecChange, SpecRecord};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

pub struct RecordGateway {
    store: Arc<dyn RecordStore>,
    sync: IndexSync,
    changes: broadcast::Sender<SpecChange>,
}

impl RecordGateway {
    pub fn new(store: Arc<dyn RecordStore>, sync: IndexSync) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            store,
            sync,
            changes,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Receive a [`SpecChange`] for every create and delete from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SpecChange> {
        self.changes.subscribe()
    }

    pub async fn create(
        &self,
        owner_id: &str,
        product_idea: &str,
        spec_text: &str,
    ) -> Result<SpecRecord> {
        let record = self
            .store
            .insert(NewSpec {
                owner_id: owner_id.to_string(),
                product_idea: product_idea.to_string(),
                spec_text: spec_text.to_string(),
            })
            .await?;

        info!(owner = owner_id, record_id = %record.id, "spec record created");
        self.sync
            .spawn(IndexChange::Upsert(IndexObject::from(&record)));
        self.notify(owner_id, &record.id, ChangeKind::Created);
        Ok(record)
    }

    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<SpecRecord>> {
        self.store.list_by_owner(owner_id).await
    }

    /// Resolve ids to records, one store query per [`MAX_IDS_PER_QUERY`]
    /// ids. Missing ids are skipped, duplicates collapse, and the result
    /// order is unspecified.
    pub async fn get_by_ids(&self, ids: &[RecordId]) -> Result<Vec<SpecRecord>> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
            for record in self.store.query_ids(chunk).await? {
                if seen.insert(record.id.clone()) {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }

    /// Delete a record owned by `owner_id`. A missing record and one owned
    /// by someone else are indistinguishable (`NotFound`).
    ///
    /// Index removal is spawned and not awaited.
    pub async fn delete(&self, owner_id: &str, record_id: &str) -> Result<()> {
        let not_found = || SpecsheetError::NotFound(format!("spec {record_id}"));
        let record = self.store.get(record_id).await?.ok_or_else(not_found)?;
        if record.owner_id != owner_id {
            return Err(not_found());
        }
        if !self.store.delete(record_id).await? {
            return Err(not_found());
        }

        info!(owner = owner_id, record_id, "spec record deleted");
        self.sync.spawn(IndexChange::Delete(record_id.to_string()));
        self.notify(owner_id, record_id, ChangeKind::Deleted);
        Ok(())
    }

    fn notify(&self, owner_id: &str, record_id: &str, kind: ChangeKind) {
        // No receivers is fine.
        let _ = self.changes.send(SpecChange {
            owner_id: owner_id.to_string(),
            record_id: record_id.to_string(),
            kind,
        });
    }
}
