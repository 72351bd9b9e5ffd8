//! Centralized API Router
//!
//! Single point of entry for all routes, used by the binary and by the
//! integration tests.

use axum::{Router, http::StatusCode, routing::get};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::AppConfig;
use crate::run_api::{RunApiAppState, run_api_routes};

/// Create centralized API router
pub fn create_api_router(config: &AppConfig) -> Router {
    let run_state = RunApiAppState::new(&config.runner);

    info!(
        script = %config.runner.script_path.display(),
        timeout_secs = ?config.runner.job_timeout_secs,
        strict_arguments = config.runner.strict_arguments,
        "Run API routes initialized"
    );

    Router::new()
        .route("/health", get(|| async { (StatusCode::OK, "ok") }))
        .route_service("/", ServeFile::new(&config.assets.index_path))
        .nest_service("/static", ServeDir::new(&config.assets.static_dir))
        .merge(run_api_routes(run_state))
        .layer(TraceLayer::new_for_http())
}
