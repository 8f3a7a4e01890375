//! Boundary between the tracker and the platform's beacon engine.
//!
//! The tracker issues intents through [`MonitoringGateway`]; the platform
//! answers asynchronously with [`GatewayEvent`]s which the host feeds back
//! into [`RegionTracker::apply`](crate::tracker::RegionTracker::apply).
//! The feed is at-least-once and may duplicate or reorder events.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::descriptor::BeaconRegion;

/// Authorization level the platform granted for location access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    /// Location may be used at any time, including in the background.
    AuthorizedAlways,
    /// Location may only be used while the app is in the foreground.
    AuthorizedWhenInUse,
    /// The user refused access.
    Denied,
    /// Access is blocked by policy.
    Restricted,
    /// The user has not been asked yet.
    #[default]
    NotDetermined,
}

impl AuthorizationStatus {
    /// Returns `true` if region monitoring is permitted.
    #[must_use]
    pub const fn permits_monitoring(self) -> bool {
        matches!(self, Self::AuthorizedAlways)
    }
}

impl std::fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AuthorizedAlways => "authorized_always",
            Self::AuthorizedWhenInUse => "authorized_when_in_use",
            Self::Denied => "denied",
            Self::Restricted => "restricted",
            Self::NotDetermined => "not_determined",
        };
        f.write_str(name)
    }
}

/// Adapter over the platform's region-monitoring engine.
///
/// Start, stop and state requests are fire-and-forget: outcomes arrive later
/// as [`GatewayEvent`]s.
pub trait MonitoringGateway: Send + Sync {
    /// Ask the platform to begin monitoring `region`.
    fn start_monitoring(&self, region: &BeaconRegion);

    /// Ask the platform to stop monitoring `region`.
    fn stop_monitoring(&self, region: &BeaconRegion);

    /// Ask the platform to report whether the device is inside `region`.
    fn request_current_state(&self, region: &BeaconRegion);

    /// The region the platform is monitoring under `identifier`, if any.
    fn active_region(&self, identifier: &str) -> Option<BeaconRegion>;

    /// Whether location services are enabled device-wide.
    fn is_location_service_enabled(&self) -> bool;

    /// Current authorization level.
    fn authorization_status(&self) -> AuthorizationStatus;
}

impl<T: MonitoringGateway + ?Sized> MonitoringGateway for std::sync::Arc<T> {
    fn start_monitoring(&self, region: &BeaconRegion) {
        (**self).start_monitoring(region);
    }

    fn stop_monitoring(&self, region: &BeaconRegion) {
        (**self).stop_monitoring(region);
    }

    fn request_current_state(&self, region: &BeaconRegion) {
        (**self).request_current_state(region);
    }

    fn active_region(&self, identifier: &str) -> Option<BeaconRegion> {
        (**self).active_region(identifier)
    }

    fn is_location_service_enabled(&self) -> bool {
        (**self).is_location_service_enabled()
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        (**self).authorization_status()
    }
}

/// A platform callback, normalized. Regions are referred to by identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
#[schema(example = json!({ "type": "entered", "identifier": "lobby" }))]
pub enum GatewayEvent {
    /// The platform confirmed it is monitoring the region.
    MonitoringStarted {
        /// Region identifier.
        identifier: String,
    },
    /// The platform could not monitor the region.
    MonitoringFailed {
        /// Region identifier.
        identifier: String,
        /// Platform-supplied reason.
        reason: String,
    },
    /// The device crossed into the region.
    Entered {
        /// Region identifier.
        identifier: String,
    },
    /// The device crossed out of the region.
    Exited {
        /// Region identifier.
        identifier: String,
    },
    /// The user or policy changed location authorization.
    AuthorizationChanged {
        /// New authorization level.
        status: AuthorizationStatus,
    },
    /// The platform engine failed to start.
    InitializationFailed {
        /// Platform-supplied reason.
        reason: String,
    },
}

impl GatewayEvent {
    /// Identifier of the region the event refers to, if any.
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::MonitoringStarted { identifier }
            | Self::MonitoringFailed { identifier, .. }
            | Self::Entered { identifier }
            | Self::Exited { identifier } => Some(identifier),
            Self::AuthorizationChanged { .. } | Self::InitializationFailed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_always_permits_monitoring() {
        assert!(AuthorizationStatus::AuthorizedAlways.permits_monitoring());
        assert!(!AuthorizationStatus::AuthorizedWhenInUse.permits_monitoring());
        assert!(!AuthorizationStatus::Denied.permits_monitoring());
        assert!(!AuthorizationStatus::Restricted.permits_monitoring());
        assert!(!AuthorizationStatus::NotDetermined.permits_monitoring());
    }

    #[test]
    fn test_event_wire_format() {
        let json = r#"{"type": "monitoring_failed", "identifier": "lobby", "reason": "busy"}"#;
        let event: GatewayEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            GatewayEvent::MonitoringFailed {
                identifier: "lobby".into(),
                reason: "busy".into()
            }
        );
        assert_eq!(event.identifier(), Some("lobby"));

        let json = r#"{"type": "authorization_changed", "status": "authorized_when_in_use"}"#;
        let event: GatewayEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.identifier(), None);
    }
}
