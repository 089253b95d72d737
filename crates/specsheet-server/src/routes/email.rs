use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use specsheet_core::mail::{Attachment, EmailDraft};
use specsheet_core::oauth::Grant;
use tracing::info;

use crate::auth::{read_cookie, RequiredUser, EMAIL_TOKEN_COOKIE};
use crate::error::AppError;
use crate::routes::consent::{self, CallbackParams};
use crate::state::AppState;

/// GET /api/email-auth — start the OAuth consent flow for sending mail.
///
/// Returns `{ authUrl }` and stores a random `state` nonce in a cookie that
/// the callback checks.
pub async fn email_auth(State(app): State<AppState>) -> Result<Response, AppError> {
    consent::begin(&app, Grant::Email)
}

/// GET /api/email-callback?code&state — exchange the code and keep the
/// access token in an http-only cookie.
pub async fn email_callback(
    State(app): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AppError> {
    consent::complete(&app, &headers, params, Grant::Email).await
}

/// GET /api/email-check-auth — whether a delegated email credential is present.
pub async fn email_check_auth(headers: HeaderMap) -> Json<serde_json::Value> {
    consent::connected(&headers, Grant::Email)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBody {
    #[serde(default)]
    to: String,
    #[serde(default)]
    subject: String,
    #[serde(default, alias = "emailBody")]
    body: String,
    #[serde(default)]
    attachment_content: Option<String>,
    #[serde(default)]
    attachment_name: Option<String>,
}

/// POST /api/email-send — send a message, optionally with one attachment,
/// using the caller's delegated email credential.
pub async fn email_send(
    State(app): State<AppState>,
    RequiredUser(uid): RequiredUser,
    headers: HeaderMap,
    Json(body): Json<SendBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let attachment = match (body.attachment_content, body.attachment_name) {
        (Some(content_base64), Some(name)) if !content_base64.is_empty() && !name.is_empty() => {
            Some(Attachment {
                name,
                content_base64,
            })
        }
        _ => None,
    };
    let draft = EmailDraft::new(&body.to, &body.subject, &body.body, attachment)?;

    let credential = read_cookie(&headers, EMAIL_TOKEN_COOKIE);
    let message_id = app
        .notifier
        .send_email(credential.as_deref(), &draft)
        .await?;
    info!(owner = %uid, message_id = %message_id, "email sent");
    Ok(Json(json!({ "success": true, "messageId": message_id })))
}
