use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{IndexObject, SearchIndex};
use crate::error::{Result, SpecsheetError};
use crate::types::RecordId;

const SERVICE: &str = "algolia";

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "objectID")]
    object_id: String,
}

/// Algolia REST client for a single index.
#[derive(Debug, Clone)]
pub struct AlgoliaIndex {
    http: reqwest::Client,
    app_id: String,
    api_key: String,
    index_name: String,
    write_base: String,
    read_base: String,
}

impl AlgoliaIndex {
    pub fn new(
        app_id: impl Into<String>,
        api_key: impl Into<String>,
        index_name: impl Into<String>,
    ) -> Self {
        let app_id = app_id.into();
        Self {
            http: reqwest::Client::new(),
            write_base: format!("https://{app_id}.algolia.net"),
            read_base: format!("https://{app_id}-dsn.algolia.net"),
            app_id,
            api_key: api_key.into(),
            index_name: index_name.into(),
        }
    }

    /// Point both read and write hosts at `base_url`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base = base_url.into().trim_end_matches('/').to_string();
        self.write_base = base.clone();
        self.read_base = base;
        self
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn url(&self, base: &str, tail: &[&str]) -> Result<Url> {
        let mut url = Url::parse(base)
            .map_err(|e| SpecsheetError::Configuration(format!("bad algolia url {base}: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| SpecsheetError::Configuration(format!("bad algolia url {base}")))?
            .pop_if_empty()
            .extend(["1", "indexes", self.index_name.as_str()])
            .extend(tail);
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url, body: Option<serde_json::Value>) -> Result<reqwest::Response> {
        let mut req = self
            .http
            .request(method, url)
            .header("X-Algolia-Application-Id", &self.app_id)
            .header("X-Algolia-API-Key", &self.api_key);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| SpecsheetError::transport(SERVICE, e))?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let detail = resp.text().await.unwrap_or_default();
            return Err(SpecsheetError::upstream(SERVICE, Some(status), detail));
        }
        Ok(resp)
    }
}

#[async_trait]
impl SearchIndex for AlgoliaIndex {
    async fn save_object(&self, object: &IndexObject) -> Result<()> {
        let url = self.url(&self.write_base, &[object.object_id.as_str()])?;
        self.send(Method::PUT, url, Some(serde_json::to_value(object)?))
            .await?;
        debug!(object_id = %object.object_id, "algolia object saved");
        Ok(())
    }

    async fn delete_object(&self, object_id: &str) -> Result<()> {
        let url = self.url(&self.write_base, &[object_id])?;
        self.send(Method::DELETE, url, None).await?;
        debug!(object_id, "algolia object deleted");
        Ok(())
    }

    async fn search(&self, query: &str, hits_per_page: usize) -> Result<Vec<RecordId>> {
        let url = self.url(&self.read_base, &["query"])?;
        let body = json!({
            "query": query,
            "hitsPerPage": hits_per_page,
            "attributesToRetrieve": ["objectID"],
        });
        let resp = self.send(Method::POST, url, Some(body)).await?;
        let parsed: SearchResponse = resp
            .json()
            .await
            .map_err(|e| SpecsheetError::transport(SERVICE, e))?;
        Ok(parsed.hits.into_iter().map(|h| h.object_id).collect())
    }
}
