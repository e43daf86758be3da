//! Router configuration for the HTTP API.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::error::handle_panic;
use super::handlers;
use super::state::AppState;

/// Allowance for multipart framing on top of the upload size bound.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the main application router with all routes and middleware.
///
/// CORS wraps everything else, so error and panic responses carry the CORS headers too.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state
        .service
        .limits()
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let api = Router::new()
        .route("/", get(handlers::root))
        .route("/parse", post(handlers::parse_upload))
        .route("/current", get(handlers::current_reading))
        .route("/stream", get(handlers::stream_readings));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
