//! Mirrors record-store writes into the search index.
//!
//! Called explicitly from the record gateway after a successful write.
//! Work is spawned onto the runtime; failures are logged and dropped, and
//! never roll back the store write.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;
use crate::index::{IndexObject, SearchIndex};
use crate::types::RecordId;

#[derive(Debug, Clone, PartialEq)]
pub enum IndexChange {
    Upsert(IndexObject),
    Delete(RecordId),
}

impl IndexChange {
    fn object_id(&self) -> &str {
        match self {
            IndexChange::Upsert(o) => &o.object_id,
            IndexChange::Delete(id) => id,
        }
    }
}

#[derive(Clone)]
pub struct IndexSync {
    index: Option<Arc<dyn SearchIndex>>,
}

impl IndexSync {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index: Some(index) }
    }

    /// A sync that drops every change.
    pub fn disabled() -> Self {
        Self { index: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.index.is_some()
    }

    /// Apply one change and wait for the index.
    pub async fn apply(&self, change: &IndexChange) -> Result<()> {
        let Some(index) = &self.index else {
            return Ok(());
        };
        match change {
            IndexChange::Upsert(obj) => index.save_object(obj).await,
            IndexChange::Delete(id) => index.delete_object(id).await,
        }
    }

    /// Fire-and-forget [`IndexSync::apply`]. The handle is only useful to
    /// tests; callers on the write path drop it.
    pub fn spawn(&self, change: IndexChange) -> Option<JoinHandle<()>> {
        if !self.is_enabled() {
            return None;
        }
        let sync = self.clone();
        Some(tokio::spawn(async move {
            match sync.apply(&change).await {
                Ok(()) => debug!(object_id = change.object_id(), "index synced"),
                Err(e) => warn!(
                    object_id = change.object_id(),
                    error = %e,
                    "index sync failed; store and index diverge until the next write"
                ),
            }
        }))
    }
}
