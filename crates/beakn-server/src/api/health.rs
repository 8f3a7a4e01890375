//! Liveness probe. Also reports whether the tracker is watching anything, so
//! a supervisor can tell an idle service from a busy one.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::SharedState;

/// Liveness status and tracker activity.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "status": "ok",
    "version": "0.1.0",
    "monitoring_active": true
}))]
pub struct HealthResponse {
    /// Always `"ok"` when the service answers.
    #[schema(example = "ok")]
    pub status: String,

    /// Crate version of the running binary.
    #[schema(example = "0.1.0")]
    pub version: String,

    /// `true` once the platform has confirmed at least one region.
    pub monitoring_active: bool,
}

pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(health_check))
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    operation_id = "healthCheck",
    summary = "Liveness and tracker activity",
    description = "Answers as long as the service is up. `monitoring_active` \
        mirrors the tracker: false until the platform confirms a region, and \
        false again once every region is stopped.",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        monitoring_active: state.tracker.is_monitoring_active(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitoring_flag_is_serialized() {
        let response = HealthResponse {
            status: "ok".into(),
            version: "0.1.0".into(),
            monitoring_active: false,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["monitoring_active"], serde_json::json!(false));
    }
}
