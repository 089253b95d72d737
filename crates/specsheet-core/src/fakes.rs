//! In-memory test doubles for every provider seam.
//!
//! Each fake counts its calls so tests can assert that a provider was, or
//! was not, reached. Compiled for unit tests here and, behind the
//! `test-support` feature, for the server's integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::drive::{FileStorage, UploadedFile};
use crate::error::{Result, SpecsheetError};
use crate::identity::IdentityVerifier;
use crate::index::{IndexObject, SearchIndex};
use crate::mail::Mailer;
use crate::oauth::{Grant, OAuthProvider, OAuthTokens};
use crate::types::{RecordId, UserId};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// FakeIdentity
// ---------------------------------------------------------------------------

/// Accepts only the tokens registered with [`FakeIdentity::with_user`].
#[derive(Default)]
pub struct FakeIdentity {
    users: HashMap<String, String>,
    calls: AtomicUsize,
}

impl FakeIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, token: &str, uid: &str) -> Self {
        self.users.insert(token.to_string(), uid.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityVerifier for FakeIdentity {
    async fn verify_token(&self, token: &str) -> Result<UserId> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.users
            .get(token)
            .map(UserId::new)
            .ok_or(SpecsheetError::Unauthenticated)
    }
}

// ---------------------------------------------------------------------------
// FakeIndex
// ---------------------------------------------------------------------------

/// Substring-matching index. [`FakeIndex::set_results`] pins the result
/// list regardless of the query.
#[derive(Default)]
pub struct FakeIndex {
    objects: Mutex<Vec<IndexObject>>,
    pinned: Mutex<Option<Vec<RecordId>>>,
    failing: bool,
    search_calls: AtomicUsize,
}

impl FakeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with an upstream error.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn set_results(&self, ids: Vec<RecordId>) {
        *lock(&self.pinned) = Some(ids);
    }

    /// Seed an object directly, bypassing the trait.
    pub fn save(&self, object: IndexObject) {
        let mut objects = lock(&self.objects);
        objects.retain(|o| o.object_id != object.object_id);
        objects.push(object);
    }

    pub fn contains(&self, id: &str) -> bool {
        lock(&self.objects).iter().any(|o| o.object_id == id)
    }

    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.failing {
            return Err(SpecsheetError::upstream("fake-index", Some(503), "unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl SearchIndex for FakeIndex {
    async fn save_object(&self, object: &IndexObject) -> Result<()> {
        self.check()?;
        self.save(object.clone());
        Ok(())
    }

    async fn delete_object(&self, object_id: &str) -> Result<()> {
        self.check()?;
        lock(&self.objects).retain(|o| o.object_id != object_id);
        Ok(())
    }

    async fn search(&self, query: &str, hits_per_page: usize) -> Result<Vec<RecordId>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        if let Some(ids) = lock(&self.pinned).clone() {
            return Ok(ids.into_iter().take(hits_per_page).collect());
        }
        let needle = query.to_lowercase();
        Ok(lock(&self.objects)
            .iter()
            .filter(|o| {
                o.product_idea.to_lowercase().contains(&needle)
                    || o.spec.to_lowercase().contains(&needle)
            })
            .take(hits_per_page)
            .map(|o| o.object_id.clone())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// FakeMailer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub access_token: String,
    pub raw: String,
}

#[derive(Default)]
pub struct FakeMailer {
    sent: Mutex<Vec<SentMail>>,
    reject_grant: bool,
}

impl FakeMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every send the way the provider reports an expired grant.
    pub fn rejecting_grant(mut self) -> Self {
        self.reject_grant = true;
        self
    }

    pub fn sent(&self) -> Vec<SentMail> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send_raw(&self, access_token: &str, raw: &str) -> Result<String> {
        if self.reject_grant {
            return Err(SpecsheetError::upstream(
                "gmail",
                Some(400),
                r#"{"error":"invalid_grant"}"#,
            ));
        }
        let mut sent = lock(&self.sent);
        sent.push(SentMail {
            access_token: access_token.to_string(),
            raw: raw.to_string(),
        });
        Ok(format!("msg-{}", sent.len()))
    }
}

// ---------------------------------------------------------------------------
// FakeStorage
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeStorage {
    folders: Mutex<Vec<(String, String)>>,
    uploads: Mutex<Vec<String>>,
    tokens: Mutex<Vec<String>>,
    shared: AtomicUsize,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn folders_created(&self) -> usize {
        lock(&self.folders).len()
    }

    pub fn uploaded_names(&self) -> Vec<String> {
        lock(&self.uploads).clone()
    }

    pub fn shared(&self) -> usize {
        self.shared.load(Ordering::SeqCst)
    }

    /// Access token presented with each upload.
    pub fn tokens_seen(&self) -> Vec<String> {
        lock(&self.tokens).clone()
    }
}

#[async_trait]
impl FileStorage for FakeStorage {
    async fn find_folder(&self, _token: &str, name: &str) -> Result<Option<String>> {
        Ok(lock(&self.folders)
            .iter()
            .find(|(_, n)| n == name)
            .map(|(id, _)| id.clone()))
    }

    async fn create_folder(&self, _token: &str, name: &str) -> Result<String> {
        let mut folders = lock(&self.folders);
        let id = format!("folder-{}", folders.len() + 1);
        folders.push((id.clone(), name.to_string()));
        Ok(id)
    }

    async fn upload_markdown(
        &self,
        token: &str,
        _folder_id: &str,
        file_name: &str,
        _content: &str,
    ) -> Result<UploadedFile> {
        lock(&self.tokens).push(token.to_string());
        let mut uploads = lock(&self.uploads);
        uploads.push(file_name.to_string());
        let id = format!("file-{}", uploads.len());
        Ok(UploadedFile {
            web_view_link: Some(format!("https://drive.example/{id}")),
            id,
        })
    }

    async fn make_public(&self, _token: &str, _file_id: &str) -> Result<()> {
        self.shared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeOAuth
// ---------------------------------------------------------------------------

/// Exchanges exactly one code for a fixed access token.
pub struct FakeOAuth {
    valid_code: String,
    access_token: String,
}

impl FakeOAuth {
    pub fn new(valid_code: &str, access_token: &str) -> Self {
        Self {
            valid_code: valid_code.to_string(),
            access_token: access_token.to_string(),
        }
    }
}

#[async_trait]
impl OAuthProvider for FakeOAuth {
    fn authorization_url(&self, grant: Grant, state: &str) -> Result<String> {
        Ok(format!(
            "https://auth.example/consent?scope={}&state={state}",
            grant.as_str()
        ))
    }

    async fn exchange_code(&self, _grant: Grant, code: &str) -> Result<OAuthTokens> {
        if code != self.valid_code {
            return Err(SpecsheetError::ReauthRequired("authorization code rejected".into()));
        }
        Ok(OAuthTokens {
            access_token: self.access_token.clone(),
            refresh_token: None,
            expires_in: Some(3600),
        })
    }
}
