//! Simulated platform endpoints.
//!
//! The service has no radio of its own. These endpoints stand in for the
//! platform beacon engine: they toggle location services and authorization,
//! and inject the callbacks the engine would deliver.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use beakn_core::{AuthorizationStatus, GatewayEvent, PlatformStatus, RegionStatus};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiResult, ErrorResponse};
use crate::state::SharedState;

/// Creates the platform router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_platform).put(update_platform))
        .route("/events", post(inject_event))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for changing platform state. Omitted fields are unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "services_enabled": true,
    "authorization": "denied"
}))]
pub struct UpdatePlatformRequest {
    /// Enable or disable location services.
    #[serde(default)]
    pub services_enabled: Option<bool>,

    /// New authorization level. Also delivered to the tracker as an
    /// authorization change.
    #[serde(default)]
    pub authorization: Option<AuthorizationStatus>,
}

/// Response after injecting a platform event.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "identifier": "lobby",
    "status": { "requested": true, "monitored": true, "reachable": true },
    "monitoring_active": true
}))]
pub struct InjectEventResponse {
    /// Region the event referred to, if any.
    #[schema(nullable)]
    pub identifier: Option<String>,

    /// Table membership of that region after the event.
    #[schema(nullable)]
    pub status: Option<RegionStatus>,

    /// Whether any region is monitored after the event.
    pub monitoring_active: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// Get the simulated platform state.
#[utoipa::path(
    get,
    path = "/api/platform",
    tag = "platform",
    operation_id = "getPlatform",
    summary = "Get platform state",
    responses(
        (status = 200, description = "Platform state", body = PlatformStatus)
    )
)]
pub async fn get_platform(State(state): State<SharedState>) -> Json<PlatformStatus> {
    Json(state.tracker.gateway().status())
}

/// Change location services or authorization.
#[utoipa::path(
    put,
    path = "/api/platform",
    tag = "platform",
    operation_id = "updatePlatform",
    summary = "Update platform state",
    request_body = UpdatePlatformRequest,
    responses(
        (status = 200, description = "Updated platform state", body = PlatformStatus)
    )
)]
pub async fn update_platform(
    State(state): State<SharedState>,
    Json(request): Json<UpdatePlatformRequest>,
) -> ApiResult<Json<PlatformStatus>> {
    let gateway = state.tracker.gateway();

    if let Some(enabled) = request.services_enabled {
        gateway.set_services_enabled(enabled);
        tracing::info!(enabled, "Location services toggled");
    }

    if let Some(status) = request.authorization {
        gateway.set_authorization(status);
        state
            .tracker
            .apply(GatewayEvent::AuthorizationChanged { status })?;
    }

    Ok(Json(gateway.status()))
}

/// Deliver a platform callback to the tracker.
#[utoipa::path(
    post,
    path = "/api/platform/events",
    tag = "platform",
    operation_id = "injectEvent",
    summary = "Inject a platform event",
    description = "Feeds one callback to the tracker as if the platform beacon engine \
        had delivered it. Events for regions the tracker does not know are ignored.",
    request_body = GatewayEvent,
    responses(
        (status = 200, description = "Event applied", body = InjectEventResponse),
        (status = 500, description = "Tables could not be saved", body = ErrorResponse)
    )
)]
pub async fn inject_event(
    State(state): State<SharedState>,
    Json(event): Json<GatewayEvent>,
) -> ApiResult<Json<InjectEventResponse>> {
    let identifier = event.identifier().map(str::to_string);
    tracing::debug!(?event, "Injecting platform event");

    state.tracker.apply(event)?;

    Ok(Json(InjectEventResponse {
        status: identifier.as_deref().map(|id| state.tracker.status(id)),
        identifier,
        monitoring_active: state.tracker.is_monitoring_active(),
    }))
}
