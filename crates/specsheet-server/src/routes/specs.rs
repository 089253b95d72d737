use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use specsheet_core::types::SpecRecord;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::auth::{RequiredUser, StreamUser};
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/specs — the caller's records, newest first.
pub async fn list_specs(
    State(app): State<AppState>,
    RequiredUser(uid): RequiredUser,
) -> Result<Json<Vec<SpecRecord>>, AppError> {
    Ok(Json(app.records.list_by_owner(uid.as_str()).await?))
}

/// DELETE /api/specs/{id} — delete one of the caller's records.
pub async fn delete_spec(
    State(app): State<AppState>,
    RequiredUser(uid): RequiredUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    app.records.delete(uid.as_str(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/specs/events?token= — SSE stream that emits `update` whenever
/// the caller's records change.
pub async fn spec_events(
    State(app): State<AppState>,
    StreamUser(uid): StreamUser,
) -> impl IntoResponse {
    let owner = uid.as_str().to_string();
    let rx = app.records.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| {
        msg.ok()
            .filter(|change| change.owner_id == owner)
            .map(|change| {
                let data = serde_json::to_string(&change).unwrap_or_default();
                Ok::<Event, Infallible>(Event::default().event("update").data(data))
            })
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
