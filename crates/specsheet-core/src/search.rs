use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{Result, SpecsheetError};
use crate::index::SearchIndex;
use crate::records::RecordGateway;
use crate::types::{QueryType, SearchLogEntry, SpecRecord, UserId, ANONYMOUS};

pub const DEFAULT_HITS_PER_PAGE: usize = 20;

/// Free-text search: index lookup, batched record resolution, and a
/// fire-and-forget search log entry.
pub struct SearchGateway {
    index: Arc<dyn SearchIndex>,
    records: Arc<RecordGateway>,
    hits_per_page: usize,
}

impl SearchGateway {
    pub fn new(index: Arc<dyn SearchIndex>, records: Arc<RecordGateway>) -> Self {
        Self {
            index,
            records,
            hits_per_page: DEFAULT_HITS_PER_PAGE,
        }
    }

    pub fn with_hits_per_page(mut self, hits: usize) -> Self {
        self.hits_per_page = hits.max(1);
        self
    }

    /// Records matching `query`, in the index's relevance order.
    ///
    /// Blank queries fail with `Validation` before the index is touched.
    pub async fn search(&self, query: &str, requester: Option<&UserId>) -> Result<Vec<SpecRecord>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SpecsheetError::validation("q parameter is required"));
        }

        let started = Instant::now();
        let ids = self.index.search(query, self.hits_per_page).await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let mut records = self.records.get_by_ids(&ids).await?;
        // Batched resolution loses the relevance order; put it back.
        let rank: HashMap<&str, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        records.sort_by_key(|r| rank.get(r.id.as_str()).copied().unwrap_or(usize::MAX));

        info!(
            owner = requester.map(UserId::as_str).unwrap_or(ANONYMOUS),
            hits = ids.len(),
            resolved = records.len(),
            latency_ms,
            "search"
        );

        self.log(SearchLogEntry {
            owner_id: requester
                .map(|u| u.as_str().to_string())
                .unwrap_or_else(|| ANONYMOUS.to_string()),
            query_type: QueryType::Text,
            query_text: query.to_string(),
            matched_ids: ids,
            latency_ms,
            timestamp: Utc::now(),
        });

        Ok(records)
    }

    fn log(&self, entry: SearchLogEntry) {
        let store = Arc::clone(self.records.store());
        tokio::spawn(async move {
            if let Err(e) = store.append_search_log(entry).await {
                warn!(error = %e, "search log write failed");
            }
        });
    }
}
