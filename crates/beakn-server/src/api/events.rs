//! Notifier event history.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use beakn_core::RecordedEvent;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::state::SharedState;

/// Number of events returned when no limit is given.
pub const DEFAULT_EVENT_LIMIT: usize = 50;

/// Creates the events router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(recent_events))
}

/// Query parameters for the event history.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventsQuery {
    /// Maximum number of events to return (default 50).
    pub limit: Option<usize>,
}

/// Recent notifier events, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "events": [
        {
            "sequence": 1,
            "recorded_at_utc": "2026-10-16T08:00:00Z",
            "event": {
                "type": "entered",
                "beacon": {
                    "uuid": "E2C56DB5-DFFB-48D2-B060-D0F5A71096E0",
                    "identifier": "lobby",
                    "major": null,
                    "minor": null
                }
            }
        }
    ],
    "total": 1
}))]
pub struct EventsResponse {
    /// The most recent events.
    pub events: Vec<RecordedEvent>,

    /// Events delivered since startup, including ones no longer retained.
    pub total: u64,
}

/// List recent notifier events.
#[utoipa::path(
    get,
    path = "/api/events",
    tag = "events",
    operation_id = "recentEvents",
    summary = "Recent region events",
    description = "Entries, exits and failures delivered to the notifier, oldest first. \
        Only the most recent events are retained.",
    params(EventsQuery),
    responses(
        (status = 200, description = "Recent events", body = EventsResponse)
    )
)]
pub async fn recent_events(
    State(state): State<SharedState>,
    Query(query): Query<EventsQuery>,
) -> Json<EventsResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT);

    Json(EventsResponse {
        events: state.events.recent(limit),
        total: state.events.total(),
    })
}
