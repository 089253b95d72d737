use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderName;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gemini_agent::cancellation;
use serde::Deserialize;
use specsheet_core::prompt::{compose_idea, strip_fences, validate_idea, GenerationOptions};
use tracing::info;

use crate::auth::RequiredUser;
use crate::error::AppError;
use crate::state::AppState;

pub const SPEC_ID_HEADER: HeaderName = HeaderName::from_static("x-spec-id");

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    #[serde(default)]
    product_idea: String,
    #[serde(default)]
    options: GenerationOptions,
}

/// POST /api/generate — generate, persist, and return a specification.
///
/// The generation call is cancelled if the client disconnects before the
/// provider finishes; no record is written in that case.
pub async fn generate(
    State(app): State<AppState>,
    RequiredUser(uid): RequiredUser,
    Json(body): Json<GenerateBody>,
) -> Result<Response, AppError> {
    let idea = validate_idea(&body.product_idea, app.config.server.max_idea_chars)?;
    let prompt = compose_idea(idea, &body.options);

    let (handle, cancel) = cancellation();
    let _guard = handle.cancel_on_drop();

    let started = std::time::Instant::now();
    let raw = app.generator.generate(&prompt, &cancel).await?;
    let text = strip_fences(&raw);
    info!(
        owner = %uid,
        latency_ms = started.elapsed().as_millis() as u64,
        chars = text.len(),
        "specification generated"
    );

    let record = app.records.create(uid.as_str(), idea, &text).await?;

    Ok((
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (SPEC_ID_HEADER, record.id),
        ],
        text,
    )
        .into_response())
}
