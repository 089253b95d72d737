use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gemini_agent::GeminiError;
use serde_json::json;
use specsheet_core::error::SpecsheetError;
use tracing::error;

// ---------------------------------------------------------------------------
// AppError — unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
///
/// | Source | Status | Body |
/// |---|---|---|
/// | `Validation` | 400 | `{ error }` |
/// | `Unauthenticated` | 401 | `{ error }` |
/// | `ReauthRequired` | 401 | `{ error, requireReauth: true }` |
/// | `NotFound` | 404 | `{ error }` |
/// | upstream provider failures | 500 | `{ error, status?, detail }` |
/// | everything else | 500 | `{ error }` |
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(SpecsheetError::Validation(msg.into()).into())
    }

    pub fn unauthenticated() -> Self {
        Self(SpecsheetError::Unauthenticated.into())
    }
}

fn specsheet_response(e: &SpecsheetError) -> (StatusCode, serde_json::Value) {
    match e {
        SpecsheetError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
        SpecsheetError::Unauthenticated => (
            StatusCode::UNAUTHORIZED,
            json!({ "error": "authentication required" }),
        ),
        SpecsheetError::ReauthRequired(msg) => (
            StatusCode::UNAUTHORIZED,
            json!({ "error": format!("re-authorization required: {msg}"), "requireReauth": true }),
        ),
        SpecsheetError::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "error": e.to_string() })),
        SpecsheetError::Upstream {
            service,
            status,
            detail,
        } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": format!("{service} request failed"), "status": status, "detail": detail }),
        ),
        SpecsheetError::Configuration(_)
        | SpecsheetError::Store(_)
        | SpecsheetError::Search(_)
        | SpecsheetError::Io(_)
        | SpecsheetError::Yaml(_)
        | SpecsheetError::Json(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": e.to_string() }),
        ),
    }
}

fn gemini_response(e: &GeminiError) -> (StatusCode, serde_json::Value) {
    match e {
        GeminiError::Upstream { status, body } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "generation request failed", "status": status, "detail": body }),
        ),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": other.to_string(), "status": other.status() }),
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = if let Some(e) = self.0.downcast_ref::<SpecsheetError>() {
            specsheet_response(e)
        } else if let Some(e) = self.0.downcast_ref::<GeminiError>() {
            gemini_response(e)
        } else {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": self.0.to_string() }),
            )
        };

        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn validation_maps_to_400() {
        let (status, body) = render(AppError::bad_request("q parameter is required")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "q parameter is required");
    }

    #[tokio::test]
    async fn unauthenticated_maps_to_401() {
        let (status, body) = render(AppError::unauthenticated()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.get("requireReauth").is_none());
    }

    #[tokio::test]
    async fn reauth_maps_to_401_with_flag() {
        let err = AppError(SpecsheetError::ReauthRequired("expired".into()).into());
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["requireReauth"], true);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn not_found_maps_to_404() {
        let err = AppError(SpecsheetError::NotFound("spec x".into()).into());
        assert_eq!(render(err).await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upstream_carries_status_and_detail() {
        let err = AppError(SpecsheetError::upstream("algolia", Some(403), "bad key").into());
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], 403);
        assert_eq!(body["detail"], "bad key");
    }

    #[tokio::test]
    async fn generation_failure_carries_provider_status() {
        let err = AppError(
            GeminiError::Upstream {
                status: 429,
                body: "quota".into(),
            }
            .into(),
        );
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], 429);
        assert_eq!(body["detail"], "quota");
    }

    #[tokio::test]
    async fn configuration_maps_to_500() {
        let err = AppError(GeminiError::Configuration("no key".into()).into());
        assert_eq!(render(err).await.0, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
