use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use specsheet_core::identity::{authenticate, bearer_token, AuthPolicy};
use specsheet_core::types::UserId;

use crate::error::AppError;
use crate::state::AppState;

/// Cookie holding the Gmail access token after the OAuth callback.
pub const EMAIL_TOKEN_COOKIE: &str = "gmail_access_token";
/// Cookie holding the OAuth `state` nonce between consent and callback.
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
/// Cookie holding the storage access token after the storage consent.
pub const DRIVE_TOKEN_COOKIE: &str = "drive_access_token";
/// State nonce for the storage consent, kept apart from the email one so
/// the two flows can run in parallel tabs.
pub const DRIVE_STATE_COOKIE: &str = "drive_oauth_state";

/// A caller with a verified identity token. Rejects with 401 otherwise.
#[derive(Debug, Clone)]
pub struct RequiredUser(pub UserId);

/// A caller who may be anonymous. Invalid tokens degrade to `None`.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<UserId>);

/// A verified caller on the event stream. EventSource cannot set headers,
/// so the token may also arrive as a `token=` query parameter here.
#[derive(Debug, Clone)]
pub struct StreamUser(pub UserId);

fn header_token(parts: &Parts) -> Option<String> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    bearer_token(header).map(str::to_string)
}

fn query_token(query: &str) -> Option<&str> {
    query
        .split('&')
        .find_map(|kv| kv.strip_prefix("token="))
        .filter(|t| !t.is_empty())
}

async fn resolve(
    app: &AppState,
    token: Option<String>,
    policy: AuthPolicy,
) -> Result<Option<UserId>, AppError> {
    Ok(authenticate(app.identity.as_ref(), token.as_deref(), policy).await?)
}

impl FromRequestParts<AppState> for RequiredUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, app: &AppState) -> Result<Self, AppError> {
        resolve(app, header_token(parts), AuthPolicy::Required)
            .await?
            .map(RequiredUser)
            .ok_or_else(AppError::unauthenticated)
    }
}

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, app: &AppState) -> Result<Self, AppError> {
        Ok(OptionalUser(
            resolve(app, header_token(parts), AuthPolicy::Optional).await?,
        ))
    }
}

impl FromRequestParts<AppState> for StreamUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, app: &AppState) -> Result<Self, AppError> {
        let token = header_token(parts).or_else(|| {
            parts
                .uri
                .query()
                .and_then(query_token)
                .map(str::to_string)
        });
        resolve(app, token, AuthPolicy::Required)
            .await?
            .map(StreamUser)
            .ok_or_else(AppError::unauthenticated)
    }
}

// ---------------------------------------------------------------------------
// Cookies
// ---------------------------------------------------------------------------

/// Value of the named cookie, if present and non-empty.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|part| part.trim().strip_prefix(prefix.as_str()).map(str::to_string))
        .filter(|v| !v.is_empty())
}

/// `Set-Cookie` value for an HttpOnly, path-wide cookie.
pub fn set_cookie(name: &str, value: &str, max_age_secs: u64, secure: bool) -> String {
    let mut cookie = format!("{name}={value}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the named cookie.
pub fn clear_cookie(name: &str) -> String {
    format!("{name}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
