//! Bearer-token verification against the identity provider.
//!
//! Verification is delegated to the Identity Toolkit `accounts:lookup`
//! endpoint. Every failure (expired, malformed, revoked, provider down)
//! collapses to [`SpecsheetError::Unauthenticated`]. Nothing is cached.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{Result, SpecsheetError};
use crate::types::UserId;

pub const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com";

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Resolve a raw ID token to a user id, or fail with `Unauthenticated`.
    async fn verify_token(&self, token: &str) -> Result<UserId>;
}

/// How a call site treats a missing or invalid bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    /// Reject with `Unauthenticated`.
    Required,
    /// Continue as anonymous.
    Optional,
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Single entry point for both policies.
///
/// Returns `Ok(Some(uid))` for a verified caller, `Ok(None)` for an
/// anonymous caller under [`AuthPolicy::Optional`], and `Unauthenticated`
/// otherwise.
pub async fn authenticate(
    verifier: &dyn IdentityVerifier,
    token: Option<&str>,
    policy: AuthPolicy,
) -> Result<Option<UserId>> {
    let outcome = match token {
        Some(t) => verifier.verify_token(t).await,
        None => Err(SpecsheetError::Unauthenticated),
    };
    match (outcome, policy) {
        (Ok(uid), _) => Ok(Some(uid)),
        (Err(_), AuthPolicy::Optional) => Ok(None),
        (Err(_), AuthPolicy::Required) => Err(SpecsheetError::Unauthenticated),
    }
}

// ---------------------------------------------------------------------------
// FirebaseVerifier
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
}

#[derive(Debug, Clone)]
pub struct FirebaseVerifier {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl FirebaseVerifier {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: IDENTITY_TOOLKIT_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_http(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify_token(&self, token: &str) -> Result<UserId> {
        let Some(api_key) = &self.api_key else {
            warn!("identity API key not configured; rejecting token");
            return Err(SpecsheetError::Unauthenticated);
        };

        let resp = self
            .http
            .post(format!("{}/v1/accounts:lookup", self.base_url))
            .query(&[("key", api_key)])
            .json(&json!({ "idToken": token }))
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "identity provider unreachable");
                SpecsheetError::Unauthenticated
            })?;

        if !resp.status().is_success() {
            debug!(status = resp.status().as_u16(), "token rejected");
            return Err(SpecsheetError::Unauthenticated);
        }

        let body: LookupResponse = resp.json().await.map_err(|e| {
            debug!(error = %e, "unreadable lookup response");
            SpecsheetError::Unauthenticated
        })?;

        body.users
            .into_iter()
            .next()
            .filter(|u| !u.local_id.is_empty())
            .map(|u| UserId::new(u.local_id))
            .ok_or(SpecsheetError::Unauthenticated)
    }
}
