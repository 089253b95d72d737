//! Full-text search index seam.
//!
//! Production uses Algolia ([`AlgoliaIndex`]). Without Algolia credentials
//! the server falls back to an in-process tantivy index ([`LocalIndex`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{RecordId, SpecRecord};

mod algolia;
mod local;

pub use self::algolia::AlgoliaIndex;
pub use self::local::LocalIndex;

/// Denormalized record mirrored into the index, keyed by `objectID`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexObject {
    #[serde(rename = "objectID")]
    pub object_id: RecordId,
    pub uid: String,
    pub product_idea: String,
    pub spec: String,
    /// Epoch milliseconds.
    pub created_at: i64,
}

impl From<&SpecRecord> for IndexObject {
    fn from(r: &SpecRecord) -> Self {
        Self {
            object_id: r.id.clone(),
            uid: r.owner_id.clone(),
            product_idea: r.product_idea.clone(),
            spec: r.spec_text.clone(),
            created_at: r.created_at.timestamp_millis(),
        }
    }
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Insert or replace the object with the same `objectID`.
    async fn save_object(&self, object: &IndexObject) -> Result<()>;

    async fn delete_object(&self, object_id: &str) -> Result<()>;

    /// Matching ids in relevance order, at most `hits_per_page`.
    async fn search(&self, query: &str, hits_per_page: usize) -> Result<Vec<RecordId>>;
}
