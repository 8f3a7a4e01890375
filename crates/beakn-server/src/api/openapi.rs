//! OpenAPI specification for the beakn API.

use axum::Json;
use utoipa::OpenApi;

use beakn_core::{
    AuthorizationStatus, BeaconDescriptor, GatewayEvent, PlatformStatus, RecordedEvent,
    RegionEvent, RegionStatus, TrackerSnapshot,
};

use super::error::ErrorResponse;
use super::events::EventsResponse;
use super::health::HealthResponse;
use super::platform::{InjectEventResponse, UpdatePlatformRequest};
use super::regions::{
    ForgetRegionResponse, RegionResponse, RequestMonitoringRequest, RequestMonitoringResponse,
    RequestOutcomeResponse, StopMonitoringRequest, StopMonitoringResponse,
};

/// Serve the OpenAPI specification as JSON at `/api/openapi.json`.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Returns the OpenAPI specification as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> serde_json::Result<String> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document structure for beakn.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "beakn API",
        version = "0.1.0",
        description = r#"
# beakn API

beakn tracks iBeacon regions on behalf of a host app.

## Overview

A region moves through three tables:

1. **requested**: the host asked for it
2. **monitored**: the platform confirmed it is watching it
3. **reachable**: the device is currently inside it

Entries and exits are delivered to the notifier exactly once per crossing,
even when the platform repeats itself. The tables survive restarts.

## Simulated platform

This service has no radio. Use the `platform` endpoints to toggle
authorization and to inject the callbacks a real beacon engine would send.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local beakn server")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "regions", description = "Requesting, stopping and inspecting beacon regions"),
        (name = "platform", description = "Simulated platform state and callbacks"),
        (name = "events", description = "Notifier event history")
    ),
    paths(
        super::health::health_check,
        super::regions::list_regions,
        super::regions::request_monitoring,
        super::regions::stop_monitoring,
        super::regions::stop_all,
        super::regions::get_region,
        super::regions::forget_region,
        super::platform::get_platform,
        super::platform::update_platform,
        super::platform::inject_event,
        super::events::recent_events,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            // Region types
            BeaconDescriptor,
            TrackerSnapshot,
            RegionStatus,
            RegionResponse,
            RequestMonitoringRequest,
            RequestMonitoringResponse,
            RequestOutcomeResponse,
            StopMonitoringRequest,
            StopMonitoringResponse,
            ForgetRegionResponse,
            // Platform types
            AuthorizationStatus,
            PlatformStatus,
            UpdatePlatformRequest,
            GatewayEvent,
            InjectEventResponse,
            // Event types
            RegionEvent,
            RecordedEvent,
            EventsResponse,
        )
    )
)]
pub struct ApiDoc;
