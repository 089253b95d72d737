use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Owner id recorded for searches made without a verified identity.
pub const ANONYMOUS: &str = "anonymous";

/// Opaque record id assigned by the store.
pub type RecordId = String;

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// Stable user identifier yielded by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// SpecRecord
// ---------------------------------------------------------------------------

/// A generated specification. Immutable once created; only deletion is allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecRecord {
    pub id: RecordId,
    pub owner_id: String,
    pub product_idea: String,
    pub spec_text: String,
    pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::RecordStore::insert`]; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSpec {
    pub owner_id: String,
    pub product_idea: String,
    pub spec_text: String,
}

// ---------------------------------------------------------------------------
// Diagnostic logs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Text,
}

/// One search call. Append-only; never read back by the service itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchLogEntry {
    pub owner_id: String,
    pub query_type: QueryType,
    pub query_text: String,
    pub matched_ids: Vec<RecordId>,
    pub latency_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// One successful file-storage upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveLogEntry {
    pub owner_id: String,
    pub file_id: String,
    pub link: Option<String>,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Change notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Deleted,
}

/// Broadcast after every successful write so live views can refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecChange {
    pub owner_id: String,
    pub record_id: RecordId,
    pub kind: ChangeKind,
}
