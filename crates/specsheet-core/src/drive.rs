//! Export to file storage (Google Drive v3).
//!
//! Upload flow: find-or-create the destination folder by name, multipart
//! upload the Markdown, optionally grant `anyone:reader`, then append a
//! [`DriveLogEntry`]. The log write is best effort.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::error::{Result, SpecsheetError};
use crate::store::RecordStore;
use crate::types::{DriveLogEntry, UserId};

pub const DRIVE_API_URL: &str = "https://www.googleapis.com";
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

const SERVICE: &str = "drive";
const UPLOAD_BOUNDARY: &str = "specsheet_upload_boundary";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: String,
    #[serde(default)]
    pub web_view_link: Option<String>,
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn find_folder(&self, token: &str, name: &str) -> Result<Option<String>>;
    async fn create_folder(&self, token: &str, name: &str) -> Result<String>;
    async fn upload_markdown(
        &self,
        token: &str,
        folder_id: &str,
        file_name: &str,
        content: &str,
    ) -> Result<UploadedFile>;
    async fn make_public(&self, token: &str, file_id: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// DriveClient
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

#[derive(Deserialize)]
struct FileRef {
    id: String,
}

#[derive(Debug, Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for DriveClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DRIVE_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let detail = resp.text().await.unwrap_or_default();
        if status.as_u16() == 401 {
            return Err(SpecsheetError::ReauthRequired(
                "storage authorization expired".into(),
            ));
        }
        Err(SpecsheetError::upstream(SERVICE, Some(status.as_u16()), detail))
    }
}

/// Quote a value for a Drive `q` expression.
fn query_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn multipart_related(metadata: &serde_json::Value, content: &str) -> String {
    format!(
        "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n\
         --{b}\r\nContent-Type: text/markdown; charset=UTF-8\r\n\r\n{content}\r\n--{b}--",
        b = UPLOAD_BOUNDARY,
        meta = metadata,
    )
}

#[async_trait]
impl FileStorage for DriveClient {
    async fn find_folder(&self, token: &str, name: &str) -> Result<Option<String>> {
        let q = format!(
            "mimeType='{FOLDER_MIME}' and name={} and trashed=false",
            query_literal(name)
        );
        let resp = self
            .http
            .get(format!("{}/drive/v3/files", self.base_url))
            .bearer_auth(token)
            .query(&[("q", q.as_str()), ("fields", "files(id,name)"), ("spaces", "drive")])
            .send()
            .await
            .map_err(|e| SpecsheetError::transport(SERVICE, e))?;
        let list: FileList = Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| SpecsheetError::transport(SERVICE, e))?;
        Ok(list.files.into_iter().next().map(|f| f.id))
    }

    async fn create_folder(&self, token: &str, name: &str) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/drive/v3/files", self.base_url))
            .bearer_auth(token)
            .query(&[("fields", "id")])
            .json(&json!({ "name": name, "mimeType": FOLDER_MIME }))
            .send()
            .await
            .map_err(|e| SpecsheetError::transport(SERVICE, e))?;
        let file: FileRef = Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| SpecsheetError::transport(SERVICE, e))?;
        Ok(file.id)
    }

    async fn upload_markdown(
        &self,
        token: &str,
        folder_id: &str,
        file_name: &str,
        content: &str,
    ) -> Result<UploadedFile> {
        let metadata = json!({
            "name": file_name,
            "parents": [folder_id],
            "mimeType": "text/markdown",
        });
        let resp = self
            .http
            .post(format!("{}/upload/drive/v3/files", self.base_url))
            .bearer_auth(token)
            .query(&[("uploadType", "multipart"), ("fields", "id,webViewLink")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={UPLOAD_BOUNDARY}"),
            )
            .body(multipart_related(&metadata, content))
            .send()
            .await
            .map_err(|e| SpecsheetError::transport(SERVICE, e))?;
        Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| SpecsheetError::transport(SERVICE, e))
    }

    async fn make_public(&self, token: &str, file_id: &str) -> Result<()> {
        let resp = self
            .http
            .post(format!("{}/drive/v3/files/{file_id}/permissions", self.base_url))
            .bearer_auth(token)
            .json(&json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await
            .map_err(|e| SpecsheetError::transport(SERVICE, e))?;
        Self::check(resp).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DriveUploader
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadRequest {
    pub content: String,
    pub file_name: Option<String>,
    pub token: String,
    /// Overrides the configured sharing default when `Some(true)`.
    pub public: Option<bool>,
}

pub struct DriveUploader {
    storage: Arc<dyn FileStorage>,
    store: Arc<dyn RecordStore>,
    folder_name: String,
    public_by_default: bool,
}

impl DriveUploader {
    pub fn new(
        storage: Arc<dyn FileStorage>,
        store: Arc<dyn RecordStore>,
        folder_name: impl Into<String>,
        public_by_default: bool,
    ) -> Self {
        Self {
            storage,
            store,
            folder_name: folder_name.into(),
            public_by_default,
        }
    }

    async fn ensure_folder(&self, token: &str) -> Result<String> {
        if let Some(id) = self.storage.find_folder(token, &self.folder_name).await? {
            return Ok(id);
        }
        let id = self.storage.create_folder(token, &self.folder_name).await?;
        info!(folder = %self.folder_name, folder_id = %id, "storage folder created");
        Ok(id)
    }

    pub async fn upload(&self, owner: &UserId, req: UploadRequest) -> Result<UploadedFile> {
        if req.content.trim().is_empty() {
            return Err(SpecsheetError::validation("content is required"));
        }
        if req.token.trim().is_empty() {
            return Err(SpecsheetError::validation("uploadToken is required"));
        }

        let folder_id = self.ensure_folder(&req.token).await?;
        let file_name = req
            .file_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("specsheet_{}.md", Utc::now().timestamp_millis()));

        let file = self
            .storage
            .upload_markdown(&req.token, &folder_id, &file_name, &req.content)
            .await?;

        if req.public.unwrap_or(false) || self.public_by_default {
            self.storage.make_public(&req.token, &file.id).await?;
        }

        info!(owner = %owner, file_id = %file.id, file_name = %file_name, "spec exported to storage");

        let entry = DriveLogEntry {
            owner_id: owner.to_string(),
            file_id: file.id.clone(),
            link: file.web_view_link.clone(),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.store.append_drive_log(entry).await {
            warn!(error = %e, "drive log write failed");
        }
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeStorage;
    use crate::store::MemoryStore;
    use mockito::Matcher;

    fn uploader(storage: Arc<FakeStorage>, public: bool) -> (Arc<MemoryStore>, DriveUploader) {
        let store = Arc::new(MemoryStore::new());
        let up = DriveUploader::new(storage, store.clone(), "Specsheet Generator", public);
        (store, up)
    }

    fn request(name: Option<&str>) -> UploadRequest {
        UploadRequest {
            content: "# Spec".into(),
            file_name: name.map(String::from),
            token: "drive-token".into(),
            public: None,
        }
    }

    #[test]
    fn query_literal_escapes_quotes() {
        assert_eq!(query_literal("Bob's specs"), r"'Bob\'s specs'");
    }

    #[tokio::test]
    async fn creates_folder_once_then_reuses_it() {
        let storage = Arc::new(FakeStorage::new());
        let (store, up) = uploader(storage.clone(), false);
        let owner = UserId::new("u1");

        up.upload(&owner, request(Some("a.md"))).await.unwrap();
        up.upload(&owner, request(Some("b.md"))).await.unwrap();

        assert_eq!(storage.folders_created(), 1);
        assert_eq!(storage.uploaded_names(), vec!["a.md", "b.md"]);
        assert_eq!(store.drive_logs().await.len(), 2);
        assert_eq!(store.drive_logs().await[0].owner_id, "u1");
    }

    #[tokio::test]
    async fn default_file_name_is_timestamped() {
        let storage = Arc::new(FakeStorage::new());
        let (_store, up) = uploader(storage.clone(), false);
        up.upload(&UserId::new("u1"), request(None)).await.unwrap();
        let name = &storage.uploaded_names()[0];
        assert!(name.starts_with("specsheet_") && name.ends_with(".md"), "{name}");
    }

    #[tokio::test]
    async fn public_flag_or_default_shares_file() {
        let storage = Arc::new(FakeStorage::new());
        let (_store, up) = uploader(storage.clone(), false);
        up.upload(&UserId::new("u1"), request(None)).await.unwrap();
        assert_eq!(storage.shared(), 0);

        let mut req = request(None);
        req.public = Some(true);
        up.upload(&UserId::new("u1"), req).await.unwrap();
        assert_eq!(storage.shared(), 1);

        let storage = Arc::new(FakeStorage::new());
        let (_store, up) = uploader(storage.clone(), true);
        up.upload(&UserId::new("u1"), request(None)).await.unwrap();
        assert_eq!(storage.shared(), 1);
    }

    #[tokio::test]
    async fn empty_content_is_validation() {
        let (_store, up) = uploader(Arc::new(FakeStorage::new()), false);
        let mut req = request(None);
        req.content = "  ".into();
        assert!(matches!(
            up.upload(&UserId::new("u1"), req).await,
            Err(SpecsheetError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn drive_client_upload_flow() {
        let mut server = mockito::Server::new_async().await;
        let find = server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::UrlEncoded("fields".into(), "files(id,name)".into()))
            .match_header("authorization", "Bearer tok")
            .with_body(r#"{"files":[]}"#)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/drive/v3/files")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({"mimeType": FOLDER_MIME})))
            .with_body(r#"{"id":"folder-1"}"#)
            .create_async()
            .await;
        let upload = server
            .mock("POST", "/upload/drive/v3/files")
            .match_query(Matcher::UrlEncoded("uploadType".into(), "multipart".into()))
            .match_body(Matcher::Regex("\"parents\":\\[\"folder-1\"\\]".into()))
            .with_body(r#"{"id":"file-1","webViewLink":"https://drive.example/file-1"}"#)
            .create_async()
            .await;

        let client = DriveClient::new().with_base_url(server.url());
        assert_eq!(client.find_folder("tok", "Specs").await.unwrap(), None);
        let folder = client.create_folder("tok", "Specs").await.unwrap();
        let file = client
            .upload_markdown("tok", &folder, "spec.md", "# Spec")
            .await
            .unwrap();
        assert_eq!(file.id, "file-1");
        assert_eq!(file.web_view_link.as_deref(), Some("https://drive.example/file-1"));
        find.assert_async().await;
        create.assert_async().await;
        upload.assert_async().await;
    }

    #[tokio::test]
    async fn drive_client_401_is_reauth() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;
        let client = DriveClient::new().with_base_url(server.url());
        assert!(matches!(
            client.find_folder("expired", "Specs").await,
            Err(SpecsheetError::ReauthRequired(_))
        ));
    }
}
