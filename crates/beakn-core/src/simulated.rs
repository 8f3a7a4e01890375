//! In-process stand-in for the platform beacon engine.
//!
//! [`SimulatedGateway`] accepts start/stop/state requests, remembers which
//! regions it is "monitoring", and records every call. It never produces
//! events on its own: whoever drives the simulation feeds
//! [`GatewayEvent`](crate::gateway::GatewayEvent)s to the tracker.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::descriptor::BeaconRegion;
use crate::gateway::{AuthorizationStatus, MonitoringGateway};

/// A request the tracker made of the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "call", content = "identifier", rename_all = "snake_case")]
pub enum GatewayCall {
    /// `start_monitoring` was called for this identifier.
    Start(String),
    /// `stop_monitoring` was called for this identifier.
    Stop(String),
    /// `request_current_state` was called for this identifier.
    RequestState(String),
}

/// Observable state of the simulated platform.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlatformStatus {
    /// Whether location services are enabled.
    pub services_enabled: bool,
    /// Current authorization level.
    pub authorization: AuthorizationStatus,
    /// Identifiers the platform is monitoring.
    pub active_regions: Vec<String>,
}

#[derive(Debug)]
struct SimulatedState {
    services_enabled: bool,
    authorization: AuthorizationStatus,
    active: BTreeMap<String, BeaconRegion>,
    calls: Vec<GatewayCall>,
}

/// Simulated platform gateway.
#[derive(Debug)]
pub struct SimulatedGateway {
    state: Mutex<SimulatedState>,
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(true, AuthorizationStatus::AuthorizedAlways)
    }
}

impl SimulatedGateway {
    /// Create a gateway with the given service and authorization state.
    #[must_use]
    pub fn new(services_enabled: bool, authorization: AuthorizationStatus) -> Self {
        Self {
            state: Mutex::new(SimulatedState {
                services_enabled,
                authorization,
                active: BTreeMap::new(),
                calls: Vec::new(),
            }),
        }
    }

    /// Enable or disable location services.
    pub fn set_services_enabled(&self, enabled: bool) {
        self.state.lock().services_enabled = enabled;
    }

    /// Change the authorization level.
    pub fn set_authorization(&self, status: AuthorizationStatus) {
        self.state.lock().authorization = status;
    }

    /// Every call made so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().calls.clone()
    }

    /// Number of `start_monitoring` calls made so far.
    #[must_use]
    pub fn start_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, GatewayCall::Start(_)))
            .count()
    }

    /// Forget every monitored region, as a platform reset would.
    pub fn reset_regions(&self) {
        self.state.lock().active.clear();
    }

    /// Snapshot for display.
    #[must_use]
    pub fn status(&self) -> PlatformStatus {
        let state = self.state.lock();
        PlatformStatus {
            services_enabled: state.services_enabled,
            authorization: state.authorization,
            active_regions: state.active.keys().cloned().collect(),
        }
    }
}

impl MonitoringGateway for SimulatedGateway {
    fn start_monitoring(&self, region: &BeaconRegion) {
        let mut state = self.state.lock();
        state
            .calls
            .push(GatewayCall::Start(region.identifier.clone()));
        state
            .active
            .insert(region.identifier.clone(), region.clone());
    }

    fn stop_monitoring(&self, region: &BeaconRegion) {
        let mut state = self.state.lock();
        state.calls.push(GatewayCall::Stop(region.identifier.clone()));
        state.active.remove(&region.identifier);
    }

    fn request_current_state(&self, region: &BeaconRegion) {
        self.state
            .lock()
            .calls
            .push(GatewayCall::RequestState(region.identifier.clone()));
    }

    fn active_region(&self, identifier: &str) -> Option<BeaconRegion> {
        self.state.lock().active.get(identifier).cloned()
    }

    fn is_location_service_enabled(&self) -> bool {
        self.state.lock().services_enabled
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        self.state.lock().authorization
    }
}
