//! Router assembly

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the control-surface router with tracing and CORS layers.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/api/start-record", post(handlers::start_record))
        .route("/api/stop-record", post(handlers::stop_record))
        .route("/api/status", get(handlers::status))
        .route("/api/recordings", get(handlers::list_recordings))
        .route("/api/logs", get(handlers::stream_logs))
        .route("/api/events", get(handlers::stream_events))
        .route("/api/report", post(handlers::report))
        .route("/api/run", post(handlers::run_scenario))
        .route("/api/scenarios", post(handlers::upload_scenario))
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// Browser UIs poll the API from other origins; mirror the permissive
/// GET/POST policy the endpoints are designed for.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
