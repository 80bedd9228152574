use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{chat, config, health, research, sessions, summarize, ui};
use crate::state::AppState;

/// Uploaded PDFs can be large; axum's 2 MB default is too small.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Creates the main application router with all routes and middleware.
///
/// This function sets up:
/// - CORS middleware
/// - The HTML page and health endpoints
/// - API endpoints (chat, research, sessions, summarize, config)
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state);
    Router::new()
        .route("/", get(ui::index))
        .route("/health", get(health::health))
        .route("/api/status", get(health::get_status))
        .route("/api/models", get(chat::list_models))
        .route("/api/chat", post(chat::chat))
        .route("/api/research/index", post(research::build_index))
        .route("/api/research/query", post(research::query))
        .route(
            "/api/sessions",
            get(sessions::list_sessions).post(sessions::create_session),
        )
        .route(
            "/api/sessions/:session_id",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route(
            "/api/sessions/:session_id/messages",
            get(sessions::get_session_messages),
        )
        .route(
            "/api/sessions/:session_id/documents",
            post(sessions::upload_documents).delete(sessions::clear_documents),
        )
        .route("/api/sessions/:session_id/chat", post(sessions::session_chat))
        .route("/api/summarize", post(summarize::summarize))
        .route(
            "/api/config",
            get(config::get_config).patch(config::patch_config),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(state: &Arc<AppState>) -> CorsLayer {
    let configured = match state.config.settings() {
        Ok(settings) => settings.server.cors_allowed_origins,
        Err(err) => {
            tracing::warn!(
                "Failed to load config while building CORS layer: {}; using local defaults",
                err
            );
            Vec::new()
        }
    };

    let allowed_origins = resolve_allowed_origins(&configured)
        .into_iter()
        .filter_map(|origin| HeaderValue::from_str(&origin).ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}

fn resolve_allowed_origins(configured: &[String]) -> Vec<String> {
    let origins = configured
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();

    if origins.is_empty() {
        return default_local_origins();
    }
    origins
}

fn default_local_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:8501".to_string(),
        "http://127.0.0.1".to_string(),
        "http://127.0.0.1:8501".to_string(),
    ]
}
