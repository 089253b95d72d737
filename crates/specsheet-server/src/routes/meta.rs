use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

/// GET /api/client-config — public settings the browser needs at startup.
pub async fn client_config(State(app): State<AppState>) -> Json<serde_json::Value> {
    let config = &app.config;
    Json(json!({
        "identityApiKey": config.identity.api_key,
        "emailEnabled": app.oauth.is_some(),
        "driveEnabled": app.oauth.is_some(),
        "searchBackend": if config.search.algolia_enabled() { "algolia" } else { "local" },
        "maxIdeaChars": config.server.max_idea_chars,
    }))
}

/// GET /api/health — liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
