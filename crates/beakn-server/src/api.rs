//! HTTP API routes and handlers.
//!
//! Endpoints are organized by domain:
//! - `regions` - Request, stop, forget and inspect beacon regions
//! - `platform` - Simulated platform state and callback injection
//! - `events` - Notifier event history
//! - `health` - Service health checks
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub mod error;
pub mod events;
pub mod health;
pub mod openapi;
pub mod platform;
pub mod regions;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                - Health check
/// /api
/// ├── /regions           - Request, stop and inspect regions
/// ├── /platform          - Simulated platform state and events
/// ├── /events            - Recent notifier events
/// └── /openapi.json      - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                .route("/openapi.json", get(openapi::get_openapi_spec))
                .nest("/regions", regions::router())
                .nest("/platform", platform::router())
                .nest("/events", events::router()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
