use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use specsheet_core::types::SpecRecord;

use crate::auth::OptionalUser;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    q: String,
}

/// GET /api/search?q= — full-text search over stored specifications.
///
/// Anonymous callers are allowed; the search is logged under `anonymous`.
pub async fn search(
    State(app): State<AppState>,
    OptionalUser(uid): OptionalUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SpecRecord>>, AppError> {
    let records = app.search.search(&params.q, uid.as_ref()).await?;
    Ok(Json(records))
}
