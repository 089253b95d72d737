use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use specsheet_core::drive::{UploadRequest, UploadedFile};
use specsheet_core::error::SpecsheetError;
use specsheet_core::oauth::Grant;

use crate::auth::{read_cookie, RequiredUser, DRIVE_TOKEN_COOKIE};
use crate::error::AppError;
use crate::routes::consent::{self, CallbackParams};
use crate::state::AppState;

/// GET /api/drive-auth — start the OAuth consent flow for file storage.
pub async fn drive_auth(State(app): State<AppState>) -> Result<Response, AppError> {
    consent::begin(&app, Grant::Drive)
}

/// GET /api/drive-callback?code&state
pub async fn drive_callback(
    State(app): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AppError> {
    consent::complete(&app, &headers, params, Grant::Drive).await
}

/// GET /api/drive-check-auth
pub async fn drive_check_auth(headers: HeaderMap) -> Json<serde_json::Value> {
    consent::connected(&headers, Grant::Drive)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadBody {
    #[serde(default, alias = "markdown")]
    content: String,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default, alias = "driveAccessToken")]
    upload_token: Option<String>,
    #[serde(default)]
    public: Option<bool>,
}

/// POST /api/drive-upload — save a document to the caller's storage folder.
///
/// Uses the token in the body when given, else the one stored by the
/// storage consent. With neither, answers `requireReauth` so the client
/// can start the consent flow.
pub async fn drive_upload(
    State(app): State<AppState>,
    RequiredUser(uid): RequiredUser,
    headers: HeaderMap,
    Json(body): Json<UploadBody>,
) -> Result<Json<UploadedFile>, AppError> {
    let token = body
        .upload_token
        .filter(|t| !t.trim().is_empty())
        .or_else(|| read_cookie(&headers, DRIVE_TOKEN_COOKIE))
        .ok_or_else(|| {
            AppError(
                SpecsheetError::ReauthRequired("storage access is not connected".into()).into(),
            )
        })?;

    let file = app
        .drive
        .upload(
            &uid,
            UploadRequest {
                content: body.content,
                file_name: body.file_name,
                token,
                public: body.public,
            },
        )
        .await?;
    Ok(Json(file))
}
