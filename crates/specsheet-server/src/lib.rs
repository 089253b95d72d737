pub mod auth;
pub mod embed;
pub mod error;
pub mod generator;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .expose_headers([routes::generate::SPEC_ID_HEADER]);

    if allowed_origins.iter().any(|o| o.trim() == "*") {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o.trim()) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.config.server.allowed_origins);
    let body_limit = DefaultBodyLimit::max(app_state.config.server.max_body_bytes);

    Router::new()
        // Generation
        .route("/api/generate", post(routes::generate::generate))
        // Records
        .route("/api/specs", get(routes::specs::list_specs))
        .route("/api/specs/events", get(routes::specs::spec_events))
        .route("/api/specs/{id}", delete(routes::specs::delete_spec))
        // Search
        .route("/api/search", get(routes::search::search))
        // Email
        .route("/api/email-auth", get(routes::email::email_auth))
        .route("/api/email-callback", get(routes::email::email_callback))
        .route("/api/email-check-auth", get(routes::email::email_check_auth))
        .route("/api/email-send", post(routes::email::email_send))
        // Storage
        .route("/api/drive-auth", get(routes::drive::drive_auth))
        .route("/api/drive-callback", get(routes::drive::drive_callback))
        .route("/api/drive-check-auth", get(routes::drive::drive_check_auth))
        .route("/api/drive-upload", post(routes::drive::drive_upload))
        // Meta
        .route("/api/client-config", get(routes::meta::client_config))
        .route("/api/health", get(routes::meta::health))
        .fallback(embed::static_handler)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the server on `bind:port`.
pub async fn serve(
    app_state: AppState,
    bind: &str,
    port: u16,
    open_browser: bool,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((bind, port)).await?;
    serve_on(app_state, listener, open_browser).await
}

/// Start the server on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(
    app_state: AppState,
    listener: tokio::net::TcpListener,
    open_browser: bool,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(app_state);

    tracing::info!("specsheet server listening on http://localhost:{actual_port}");

    if open_browser {
        let url = format!("http://localhost:{actual_port}");
        if let Err(e) = open::that(&url) {
            warn!(error = %e, "could not open browser");
        }
    }

    axum::serve(listener, app).await?;
    Ok(())
}
