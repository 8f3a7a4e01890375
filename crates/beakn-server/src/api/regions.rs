//! Region API endpoints.
//!
//! The host-app side of the tracker: request monitoring for beacon regions,
//! stop or forget them, and inspect the requested / monitored / reachable
//! tables.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use beakn_core::{BeaconDescriptor, RegionStatus, TrackerSnapshot};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::state::SharedState;

/// Creates the regions router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/",
            get(list_regions)
                .post(request_monitoring)
                .delete(stop_all),
        )
        .route("/stop", post(stop_monitoring))
        .route("/{identifier}", get(get_region).delete(forget_region))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for monitoring a batch of regions.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "beacons": [
        {
            "uuid": "E2C56DB5-DFFB-48D2-B060-D0F5A71096E0",
            "identifier": "lobby",
            "major": 1,
            "minor": null
        }
    ]
}))]
pub struct RequestMonitoringRequest {
    /// Regions to monitor, processed in order.
    pub beacons: Vec<BeaconDescriptor>,
}

/// Outcome for one region in a batch request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RequestOutcomeResponse {
    /// Identifier of the region.
    #[schema(example = "lobby")]
    pub identifier: String,

    /// Whether the region was recorded and handed to the platform.
    pub accepted: bool,

    /// Why the region was rejected.
    #[schema(nullable)]
    pub error: Option<ErrorResponse>,
}

/// Response for a batch monitoring request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "outcomes": [
        { "identifier": "lobby", "accepted": true, "error": null }
    ],
    "accepted": 1,
    "rejected": 0
}))]
pub struct RequestMonitoringResponse {
    /// One entry per requested region, in request order.
    pub outcomes: Vec<RequestOutcomeResponse>,

    /// Number of accepted regions.
    pub accepted: usize,

    /// Number of rejected regions.
    pub rejected: usize,
}

/// Request body for stopping regions.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "identifiers": ["lobby"] }))]
pub struct StopMonitoringRequest {
    /// Identifiers of the regions to stop.
    pub identifiers: Vec<String>,
}

/// Response after stopping regions.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "stopped": ["lobby"],
    "not_stopped": [],
    "monitoring_active": false
}))]
pub struct StopMonitoringResponse {
    /// Regions that were monitored and are now stopped.
    pub stopped: Vec<String>,

    /// Identifiers that were not stopped: not monitored, or unknown to the
    /// platform.
    pub not_stopped: Vec<String>,

    /// Whether any region is still monitored.
    pub monitoring_active: bool,
}

/// One region and its table membership.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegionResponse {
    /// The requested descriptor.
    pub beacon: BeaconDescriptor,

    /// Membership across the tracker's tables.
    pub status: RegionStatus,
}

/// Response after forgetting a region.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ForgetRegionResponse {
    /// Identifier that was forgotten.
    #[schema(example = "lobby")]
    pub identifier: String,

    /// Whether any region is still monitored.
    pub monitoring_active: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// List every region the tracker knows about.
#[utoipa::path(
    get,
    path = "/api/regions",
    tag = "regions",
    operation_id = "listRegions",
    summary = "List requested, monitored and reachable regions",
    responses(
        (status = 200, description = "Current tables", body = TrackerSnapshot)
    )
)]
pub async fn list_regions(State(state): State<SharedState>) -> Json<TrackerSnapshot> {
    Json(state.tracker.snapshot())
}

/// Request monitoring for a batch of regions.
///
/// Each region is validated and recorded independently; a rejected region
/// does not affect the others.
#[utoipa::path(
    post,
    path = "/api/regions",
    tag = "regions",
    operation_id = "requestMonitoring",
    summary = "Start monitoring regions",
    description = "Records each region as requested and asks the platform to \
        monitor it. A region only counts as monitored once the platform confirms. \
        Rejected regions are reported per entry; the call itself succeeds.",
    request_body = RequestMonitoringRequest,
    responses(
        (status = 200, description = "Per-region outcomes", body = RequestMonitoringResponse)
    )
)]
pub async fn request_monitoring(
    State(state): State<SharedState>,
    Json(request): Json<RequestMonitoringRequest>,
) -> Json<RequestMonitoringResponse> {
    let outcomes: Vec<RequestOutcomeResponse> = state
        .tracker
        .request_monitoring(&request.beacons)
        .into_iter()
        .map(|outcome| RequestOutcomeResponse {
            identifier: outcome.identifier,
            accepted: outcome.result.is_ok(),
            error: outcome.result.err().map(|err| ErrorResponse {
                error: err.error_code().to_lowercase(),
                message: err.to_string(),
                details: None,
            }),
        })
        .collect();

    let accepted = outcomes.iter().filter(|o| o.accepted).count();
    let rejected = outcomes.len() - accepted;
    tracing::info!(accepted, rejected, "Processed monitoring request");

    Json(RequestMonitoringResponse {
        outcomes,
        accepted,
        rejected,
    })
}

/// Stop monitoring the given regions.
///
/// Stopped regions stay requested. A region the platform no longer lists is
/// left monitored and reported under `not_stopped`.
#[utoipa::path(
    post,
    path = "/api/regions/stop",
    tag = "regions",
    operation_id = "stopMonitoring",
    summary = "Stop monitoring regions",
    request_body = StopMonitoringRequest,
    responses(
        (status = 200, description = "Regions stopped", body = StopMonitoringResponse),
        (status = 500, description = "Tables could not be saved", body = ErrorResponse)
    )
)]
pub async fn stop_monitoring(
    State(state): State<SharedState>,
    Json(request): Json<StopMonitoringRequest>,
) -> ApiResult<Json<StopMonitoringResponse>> {
    let monitored = state.tracker.snapshot().monitored;
    let beacons: Vec<BeaconDescriptor> = request
        .identifiers
        .iter()
        .filter_map(|id| monitored.get(id).cloned())
        .collect();
    state.tracker.stop_monitoring(&beacons)?;

    let still_monitored = state.tracker.snapshot().monitored;
    let (stopped, not_stopped): (Vec<String>, Vec<String>) = request
        .identifiers
        .into_iter()
        .partition(|id| monitored.contains_key(id) && !still_monitored.contains_key(id));

    Ok(Json(StopMonitoringResponse {
        stopped,
        not_stopped,
        monitoring_active: state.tracker.is_monitoring_active(),
    }))
}

/// Stop monitoring every region.
#[utoipa::path(
    delete,
    path = "/api/regions",
    tag = "regions",
    operation_id = "stopAll",
    summary = "Stop monitoring all regions",
    responses(
        (status = 200, description = "All regions stopped", body = StopMonitoringResponse),
        (status = 500, description = "Tables could not be saved", body = ErrorResponse)
    )
)]
pub async fn stop_all(
    State(state): State<SharedState>,
) -> ApiResult<Json<StopMonitoringResponse>> {
    let monitored = state.tracker.snapshot().monitored;
    state.tracker.stop_all()?;

    let still_monitored = state.tracker.snapshot().monitored;
    let (not_stopped, stopped): (Vec<String>, Vec<String>) = monitored
        .into_keys()
        .partition(|id| still_monitored.contains_key(id));

    Ok(Json(StopMonitoringResponse {
        stopped,
        not_stopped,
        monitoring_active: state.tracker.is_monitoring_active(),
    }))
}

/// Get one region and its table membership.
#[utoipa::path(
    get,
    path = "/api/regions/{identifier}",
    tag = "regions",
    operation_id = "getRegion",
    summary = "Get a region",
    params(("identifier" = String, Path, description = "Region identifier")),
    responses(
        (status = 200, description = "Region found", body = RegionResponse),
        (status = 404, description = "Region was never requested", body = ErrorResponse)
    )
)]
pub async fn get_region(
    State(state): State<SharedState>,
    Path(identifier): Path<String>,
) -> ApiResult<Json<RegionResponse>> {
    let snapshot = state.tracker.snapshot();
    let beacon = snapshot
        .requested
        .get(&identifier)
        .cloned()
        .ok_or_else(|| ApiError::region_not_found(&identifier))?;

    Ok(Json(RegionResponse {
        beacon,
        status: RegionStatus {
            requested: true,
            monitored: snapshot.monitored.contains_key(&identifier),
            reachable: snapshot.reachable.contains_key(&identifier),
        },
    }))
}

/// Forget a region entirely.
#[utoipa::path(
    delete,
    path = "/api/regions/{identifier}",
    tag = "regions",
    operation_id = "forgetRegion",
    summary = "Stop and forget a region",
    description = "Stops monitoring and removes the region from every table. \
        Late platform callbacks for it are ignored.",
    params(("identifier" = String, Path, description = "Region identifier")),
    responses(
        (status = 200, description = "Region forgotten", body = ForgetRegionResponse),
        (status = 404, description = "Region was never requested", body = ErrorResponse)
    )
)]
pub async fn forget_region(
    State(state): State<SharedState>,
    Path(identifier): Path<String>,
) -> ApiResult<Json<ForgetRegionResponse>> {
    if state.tracker.forget([identifier.as_str()])? == 0 {
        return Err(ApiError::region_not_found(&identifier));
    }

    Ok(Json(ForgetRegionResponse {
        identifier,
        monitoring_active: state.tracker.is_monitoring_active(),
    }))
}
