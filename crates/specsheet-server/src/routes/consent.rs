//! OAuth consent handshake shared by the email and storage grants.
//!
//! `begin` hands the browser a consent URL and pins a random `state` nonce
//! in a cookie; `complete` checks the nonce, exchanges the code and keeps
//! the access token in an http-only cookie scoped to the grant.

use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::Json;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use specsheet_core::error::SpecsheetError;
use specsheet_core::oauth::{Grant, OAuthProvider};
use tracing::{info, warn};

use crate::auth::{
    clear_cookie, read_cookie, set_cookie, DRIVE_STATE_COOKIE, DRIVE_TOKEN_COOKIE,
    EMAIL_TOKEN_COOKIE, OAUTH_STATE_COOKIE,
};
use crate::error::AppError;
use crate::state::AppState;

const STATE_MAX_AGE_SECS: u64 = 600;
const TOKEN_MAX_AGE_SECS: u64 = 3600;

fn state_cookie(grant: Grant) -> &'static str {
    match grant {
        Grant::Email => OAUTH_STATE_COOKIE,
        Grant::Drive => DRIVE_STATE_COOKIE,
    }
}

/// Cookie holding the access token obtained for `grant`.
pub fn token_cookie(grant: Grant) -> &'static str {
    match grant {
        Grant::Email => EMAIL_TOKEN_COOKIE,
        Grant::Drive => DRIVE_TOKEN_COOKIE,
    }
}

fn provider(app: &AppState, grant: Grant) -> Result<&dyn OAuthProvider, AppError> {
    app.oauth.as_deref().ok_or_else(|| {
        AppError(
            SpecsheetError::Configuration(format!(
                "{} is not configured (GMAIL_CLIENT_ID / GMAIL_CLIENT_SECRET)",
                grant.as_str()
            ))
            .into(),
        )
    })
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

/// `{ authUrl }` plus a `Set-Cookie` carrying the state nonce.
pub fn begin(app: &AppState, grant: Grant) -> Result<Response, AppError> {
    let provider = provider(app, grant)?;
    let state: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    let auth_url = provider.authorization_url(grant, &state)?;
    let cookie = set_cookie(
        state_cookie(grant),
        &state,
        STATE_MAX_AGE_SECS,
        app.secure_cookies(),
    );
    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(json!({ "authUrl": auth_url })),
    )
        .into_response())
}

/// Exchange the code and redirect to `/?{grant}=connected`.
pub async fn complete(
    app: &AppState,
    headers: &HeaderMap,
    params: CallbackParams,
    grant: Grant,
) -> Result<Response, AppError> {
    let provider = provider(app, grant)?;
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::bad_request("authorization code is required"))?;

    let expected = read_cookie(headers, state_cookie(grant));
    if expected.is_none() || expected != params.state {
        warn!(grant = grant.as_str(), "oauth callback state mismatch");
        return Err(AppError::bad_request("oauth state mismatch"));
    }

    let tokens = provider.exchange_code(grant, &code).await?;
    info!(grant = grant.as_str(), "delegated account connected");

    let token_cookie = set_cookie(
        token_cookie(grant),
        &tokens.access_token,
        TOKEN_MAX_AGE_SECS,
        app.secure_cookies(),
    );
    Ok((
        AppendHeaders([
            (SET_COOKIE, token_cookie),
            (SET_COOKIE, clear_cookie(state_cookie(grant))),
        ]),
        Redirect::to(&format!("/?{}=connected", grant.as_str())),
    )
        .into_response())
}

/// `{ isAuthenticated }` for the grant's token cookie.
pub fn connected(headers: &HeaderMap, grant: Grant) -> Json<serde_json::Value> {
    let present = read_cookie(headers, token_cookie(grant)).is_some();
    Json(json!({ "isAuthenticated": present }))
}
