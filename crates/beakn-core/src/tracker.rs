//! The region-tracking state machine.
//!
//! [`RegionTracker`] owns three tables keyed by descriptor identifier:
//!
//! - `requested` - everything the host asked to monitor
//! - `monitored` - the subset the platform confirmed it is monitoring
//! - `reachable` - the subset the device is currently inside
//!
//! `reachable ⊆ monitored ⊆ requested` holds after every operation. The
//! tables are loaded once on [`RegionTracker::open`], kept in memory, and
//! written through to the [`TableStore`] after each mutation.
//!
//! All table access goes through one lock. Gateway calls are made with the
//! lock held, so a [`MonitoringGateway`] must deliver its events
//! asynchronously. Notifier callbacks are made after the lock is released,
//! one at a time and in the order the tables changed.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use crate::descriptor::{BeaconDescriptor, BeaconRegion};
use crate::error::{AuthorizationFailure, BeaknError, Result};
use crate::gateway::{AuthorizationStatus, GatewayEvent, MonitoringGateway};
use crate::notifier::Notifier;
use crate::store::{RegionTable, TableStore, MONITORED_TABLE, REACHABLE_TABLE, REQUESTED_TABLE};

#[derive(Debug, Clone, Copy)]
enum Table {
    Requested,
    Monitored,
    Reachable,
}

impl Table {
    const ALL: [Self; 3] = [Self::Requested, Self::Monitored, Self::Reachable];

    const fn name(self) -> &'static str {
        match self {
            Self::Requested => REQUESTED_TABLE,
            Self::Monitored => MONITORED_TABLE,
            Self::Reachable => REACHABLE_TABLE,
        }
    }
}

#[derive(Debug, Default)]
struct RegionTables {
    requested: RegionTable,
    monitored: RegionTable,
    reachable: RegionTable,
}

impl RegionTables {
    const fn get(&self, table: Table) -> &RegionTable {
        match table {
            Table::Requested => &self.requested,
            Table::Monitored => &self.monitored,
            Table::Reachable => &self.reachable,
        }
    }

    fn is_monitoring_active(&self) -> bool {
        !self.monitored.is_empty()
    }

    /// Drop entries violating the subset chain. Returns how many were dropped.
    fn repair(&mut self) -> usize {
        let before = self.monitored.len() + self.reachable.len();

        let requested = &self.requested;
        self.monitored.retain(|key, _| requested.contains_key(key));
        let monitored = &self.monitored;
        self.reachable.retain(|key, _| monitored.contains_key(key));

        before - (self.monitored.len() + self.reachable.len())
    }
}

enum Delivery {
    Entered(BeaconDescriptor),
    Exited(BeaconDescriptor),
    MonitoringFailed(BeaconDescriptor, String),
    InitializationFailed(String),
}

struct Pending {
    notifier: Arc<dyn Notifier>,
    delivery: Delivery,
}

/// Notifier calls queued in state-change order. Only one thread drains at a
/// time; calls queued from inside a callback go out after it returns.
#[derive(Default)]
struct Outbox {
    queue: VecDeque<Pending>,
    draining: bool,
}

/// Point-in-time copy of the tracker's tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TrackerSnapshot {
    /// Every requested descriptor, by identifier.
    pub requested: RegionTable,

    /// Platform-confirmed descriptors, by identifier.
    pub monitored: RegionTable,

    /// Descriptors the device is inside, by identifier.
    pub reachable: RegionTable,

    /// `true` iff `monitored` is non-empty.
    pub monitoring_active: bool,
}

impl TrackerSnapshot {
    /// Returns `true` if `reachable ⊆ monitored ⊆ requested` by key.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.monitored
            .keys()
            .all(|key| self.requested.contains_key(key))
            && self
                .reachable
                .keys()
                .all(|key| self.monitored.contains_key(key))
    }
}

/// Membership of one identifier across the three tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RegionStatus {
    /// Present in `requested`.
    pub requested: bool,
    /// Present in `monitored`.
    pub monitored: bool,
    /// Present in `reachable`.
    pub reachable: bool,
}

/// Result of requesting monitoring for one descriptor in a batch.
#[derive(Debug)]
pub struct RequestOutcome {
    /// Identifier of the descriptor.
    pub identifier: String,

    /// `Ok` if the request was recorded and handed to the platform.
    pub result: Result<()>,
}

impl RequestOutcome {
    /// Returns `true` if the descriptor was accepted.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        self.result.is_ok()
    }
}

/// Deduplicating state machine between a platform gateway and a notifier.
pub struct RegionTracker<G, S> {
    gateway: G,
    store: S,
    tables: Mutex<RegionTables>,
    notifier: RwLock<Option<Weak<dyn Notifier>>>,
    outbox: Mutex<Outbox>,
}

impl<G, S> std::fmt::Debug for RegionTracker<G, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.lock();
        f.debug_struct("RegionTracker")
            .field("requested", &tables.requested.len())
            .field("monitored", &tables.monitored.len())
            .field("reachable", &tables.reachable.len())
            .finish_non_exhaustive()
    }
}

impl<G: MonitoringGateway, S: TableStore> RegionTracker<G, S> {
    /// Create a tracker, loading whatever tables `store` holds.
    ///
    /// Persisted tables that violate `reachable ⊆ monitored ⊆ requested`
    /// (for example after an interrupted write) are repaired and saved back.
    ///
    /// # Errors
    ///
    /// Returns an error if a table exists but cannot be loaded, or if a
    /// repaired table cannot be saved.
    pub fn open(gateway: G, store: S) -> Result<Self> {
        let mut tables = RegionTables {
            requested: store.load(REQUESTED_TABLE)?,
            monitored: store.load(MONITORED_TABLE)?,
            reachable: store.load(REACHABLE_TABLE)?,
        };

        let dropped = tables.repair();
        let tracker = Self {
            gateway,
            store,
            tables: Mutex::new(RegionTables::default()),
            notifier: RwLock::new(None),
            outbox: Mutex::new(Outbox::default()),
        };

        if dropped > 0 {
            warn!(dropped, "Persisted region tables were inconsistent; repaired");
            tracker.persist(&tables, &Table::ALL)?;
        }

        info!(
            requested = tables.requested.len(),
            monitored = tables.monitored.len(),
            reachable = tables.reachable.len(),
            "Loaded region tables"
        );

        *tracker.tables.lock() = tables;
        Ok(tracker)
    }

    /// The gateway this tracker drives.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// The store this tracker writes through to.
    pub fn store(&self) -> &S {
        &self.store
    }

    // =========================================================================
    // NOTIFIER REGISTRATION
    // =========================================================================

    /// Register the listener for region events.
    ///
    /// Only a weak handle is kept: the caller owns `notifier` and should call
    /// [`clear_notifier`](Self::clear_notifier) before dropping it.
    pub fn set_notifier<N: Notifier + 'static>(&self, notifier: &Arc<N>) {
        let handle: Weak<dyn Notifier> = Arc::<N>::downgrade(notifier);
        *self.notifier.write() = Some(handle);
    }

    /// Remove the registered listener.
    pub fn clear_notifier(&self) {
        *self.notifier.write() = None;
    }

    /// Returns `true` if a live listener is registered.
    pub fn has_notifier(&self) -> bool {
        self.notifier().is_some()
    }

    fn notifier(&self) -> Option<Arc<dyn Notifier>> {
        self.notifier.read().as_ref().and_then(Weak::upgrade)
    }

    // =========================================================================
    // HOST OPERATIONS
    // =========================================================================

    /// Request monitoring for each descriptor, in order.
    ///
    /// Every descriptor is processed independently; a failure for one never
    /// prevents the others from being processed.
    pub fn request_monitoring(&self, beacons: &[BeaconDescriptor]) -> Vec<RequestOutcome> {
        beacons
            .iter()
            .map(|beacon| RequestOutcome {
                identifier: beacon.identifier.clone(),
                result: self.request_monitoring_one(beacon),
            })
            .collect()
    }

    /// Request monitoring for a single descriptor.
    ///
    /// On success the descriptor is recorded as requested (replacing any
    /// previous descriptor with the same identifier) and the platform is asked
    /// to start monitoring. It only counts as monitored once the platform
    /// confirms with [`GatewayEvent::MonitoringStarted`].
    ///
    /// # Errors
    ///
    /// Checked in this order:
    /// - [`BeaknError::Authorization`] if location services are off or
    ///   authorization is not "always"
    /// - [`BeaknError::InvalidUuidString`] if the UUID does not parse
    /// - [`BeaknError::InvalidBeaknInfo`] if `minor` is set without `major`
    /// - [`BeaknError::Persistence`] if the request could not be saved; the
    ///   request is rolled back and the platform is not asked to start
    pub fn request_monitoring_one(&self, beacon: &BeaconDescriptor) -> Result<()> {
        self.check_authorization()?;
        let region = beacon.region()?;

        let mut tables = self.tables.lock();
        let previous = tables
            .requested
            .insert(beacon.identifier.clone(), beacon.clone());
        if let Some(previous) = &previous {
            if previous.major != beacon.major || previous.minor != beacon.minor {
                debug!(identifier = %beacon.identifier, "Replacing previously requested scope");
            }
        }

        if let Err(err) = self.persist(&tables, &[Table::Requested]) {
            match previous {
                Some(previous) => tables.requested.insert(beacon.identifier.clone(), previous),
                None => tables.requested.remove(&beacon.identifier),
            };
            return Err(err);
        }

        debug!(identifier = %beacon.identifier, "Starting monitoring for region");
        self.gateway.start_monitoring(&region);
        Ok(())
    }

    /// Returns `true` if the platform confirmed monitoring for `beacon`.
    pub fn is_monitoring(&self, beacon: &BeaconDescriptor) -> bool {
        let tables = self.tables.lock();
        tables.is_monitoring_active() && tables.monitored.contains_key(&beacon.identifier)
    }

    /// Returns `true` if any region is being monitored.
    pub fn is_monitoring_active(&self) -> bool {
        self.tables.lock().is_monitoring_active()
    }

    /// Stop monitoring each descriptor that is currently monitored.
    ///
    /// The platform region is looked up by identifier. If the platform has
    /// one, it is stopped and the region leaves `monitored` and `reachable`;
    /// it always stays in `requested`. Descriptors that are not monitored, or
    /// that the platform has no region for, are left as they are.
    ///
    /// # Errors
    ///
    /// Returns the first persistence error; all descriptors are still
    /// processed and the in-memory state reflects every stop.
    pub fn stop_monitoring(&self, beacons: &[BeaconDescriptor]) -> Result<()> {
        let mut tables = self.tables.lock();
        if !tables.is_monitoring_active() {
            return Ok(());
        }

        let mut first_error = None;
        for beacon in beacons {
            let identifier = beacon.identifier.as_str();
            if !tables.monitored.contains_key(identifier) {
                debug!(%identifier, "Not monitoring region; nothing to stop");
                continue;
            }

            if !self.stop_platform_region(identifier) {
                continue;
            }
            tables.monitored.remove(identifier);
            tables.reachable.remove(identifier);

            if let Err(err) = self.persist(&tables, &[Table::Monitored, Table::Reachable]) {
                first_error.get_or_insert(err);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Stop monitoring a single descriptor.
    ///
    /// # Errors
    ///
    /// See [`stop_monitoring`](Self::stop_monitoring).
    pub fn stop_monitoring_one(&self, beacon: &BeaconDescriptor) -> Result<()> {
        self.stop_monitoring(std::slice::from_ref(beacon))
    }

    /// Stop monitoring every monitored region.
    ///
    /// # Errors
    ///
    /// See [`stop_monitoring`](Self::stop_monitoring).
    pub fn stop_all(&self) -> Result<()> {
        let monitored: Vec<BeaconDescriptor> = {
            let tables = self.tables.lock();
            if !tables.is_monitoring_active() {
                return Ok(());
            }
            tables.monitored.values().cloned().collect()
        };

        self.stop_monitoring(&monitored)
    }

    /// Stop and drop regions entirely, including from `requested`.
    ///
    /// Late platform confirmations or failures for a forgotten region are
    /// ignored. Returns how many identifiers were forgotten.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the tables could not be saved.
    pub fn forget<I, K>(&self, identifiers: I) -> Result<usize>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut tables = self.tables.lock();
        let mut forgotten = 0;

        for identifier in identifiers {
            let identifier = identifier.as_ref();
            if tables.requested.remove(identifier).is_none() {
                continue;
            }
            self.stop_platform_region(identifier);
            tables.monitored.remove(identifier);
            tables.reachable.remove(identifier);
            forgotten += 1;
        }

        if forgotten > 0 {
            self.persist(&tables, &Table::ALL)?;
        }
        Ok(forgotten)
    }

    /// Copy of the current tables.
    pub fn snapshot(&self) -> TrackerSnapshot {
        let tables = self.tables.lock();
        TrackerSnapshot {
            requested: tables.requested.clone(),
            monitored: tables.monitored.clone(),
            reachable: tables.reachable.clone(),
            monitoring_active: tables.is_monitoring_active(),
        }
    }

    /// Table membership of `identifier`.
    pub fn status(&self, identifier: &str) -> RegionStatus {
        let tables = self.tables.lock();
        RegionStatus {
            requested: tables.requested.contains_key(identifier),
            monitored: tables.monitored.contains_key(identifier),
            reachable: tables.reachable.contains_key(identifier),
        }
    }

    // =========================================================================
    // PLATFORM EVENTS
    // =========================================================================

    /// Apply one platform event.
    ///
    /// Events for unknown identifiers are dropped: they are expected when a
    /// stop races an in-flight platform callback.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the resulting state could not be saved.
    /// The in-memory state and notifier delivery are unaffected.
    pub fn apply(&self, event: GatewayEvent) -> Result<()> {
        match event {
            GatewayEvent::MonitoringStarted { identifier } => {
                self.on_monitoring_started(&identifier)
            }
            GatewayEvent::MonitoringFailed { identifier, reason } => {
                self.on_monitoring_failed(&identifier, &reason)
            }
            GatewayEvent::Entered { identifier } => self.on_entered(&identifier),
            GatewayEvent::Exited { identifier } => self.on_exited(&identifier),
            GatewayEvent::AuthorizationChanged { status } => {
                self.on_authorization_changed(status);
                Ok(())
            }
            GatewayEvent::InitializationFailed { reason } => {
                self.on_initialization_failed(&reason);
                Ok(())
            }
        }
    }

    /// The platform confirmed monitoring for `identifier`.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if `monitored` could not be saved.
    pub fn on_monitoring_started(&self, identifier: &str) -> Result<()> {
        let mut tables = self.tables.lock();
        let Some(beacon) = tables.requested.get(identifier).cloned() else {
            debug!(%identifier, "Ignoring monitoring start for unrequested region");
            return Ok(());
        };

        tables.monitored.insert(identifier.to_string(), beacon.clone());
        let persisted = self.persist(&tables, &[Table::Monitored]);

        match self.platform_region(&beacon) {
            Some(region) => self.gateway.request_current_state(&region),
            None => warn!(%identifier, "Cannot derive region to request its state"),
        }

        persisted
    }

    /// The platform could not monitor `identifier`.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the tables could not be saved.
    pub fn on_monitoring_failed(&self, identifier: &str, reason: &str) -> Result<()> {
        let persisted = {
            let mut tables = self.tables.lock();
            let Some(beacon) = tables.requested.get(identifier).cloned() else {
                debug!(%identifier, "Ignoring monitoring failure for unrequested region");
                return Ok(());
            };

            let was_monitored = tables.monitored.remove(identifier).is_some();
            tables.reachable.remove(identifier);
            let persisted = if was_monitored {
                self.persist(&tables, &[Table::Monitored, Table::Reachable])
            } else {
                Ok(())
            };

            warn!(beacon = %beacon, %reason, "Monitoring failed for region");
            match self.notifier() {
                Some(notifier) => self.enqueue(
                    notifier,
                    Delivery::MonitoringFailed(beacon, reason.to_string()),
                ),
                None => debug!(%identifier, "No notifier registered to report monitoring failure"),
            }
            persisted
        };

        self.flush();
        persisted
    }

    /// The device crossed into `identifier`.
    ///
    /// Dropped if the region is not monitored, if no notifier is registered,
    /// or if the region is already reachable.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if `reachable` could not be saved.
    pub fn on_entered(&self, identifier: &str) -> Result<()> {
        let persisted = {
            let mut tables = self.tables.lock();
            let Some(beacon) = tables.monitored.get(identifier).cloned() else {
                debug!(%identifier, "Entry event for region that is not monitored");
                return Ok(());
            };
            let Some(notifier) = self.notifier() else {
                debug!(%identifier, "No notifier registered; dropping entry event");
                return Ok(());
            };
            if tables.reachable.contains_key(identifier) {
                debug!(%identifier, "Duplicate entry event");
                return Ok(());
            }

            tables
                .reachable
                .insert(identifier.to_string(), beacon.clone());
            let persisted = self.persist(&tables, &[Table::Reachable]);
            self.enqueue(notifier, Delivery::Entered(beacon));
            persisted
        };

        self.flush();
        persisted
    }

    /// The device crossed out of `identifier`.
    ///
    /// Dropped if the region is not monitored, if no notifier is registered,
    /// or if no entry was recorded for it. A missed entry followed by a real
    /// exit is therefore never reported.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if `reachable` could not be saved.
    pub fn on_exited(&self, identifier: &str) -> Result<()> {
        let persisted = {
            let mut tables = self.tables.lock();
            let Some(beacon) = tables.monitored.get(identifier).cloned() else {
                debug!(%identifier, "Exit event for region that is not monitored");
                return Ok(());
            };
            let Some(notifier) = self.notifier() else {
                debug!(%identifier, "No notifier registered; dropping exit event");
                return Ok(());
            };
            if tables.reachable.remove(identifier).is_none() {
                debug!(%identifier, "Exit event without a recorded entry");
                return Ok(());
            }

            let persisted = self.persist(&tables, &[Table::Reachable]);
            self.enqueue(notifier, Delivery::Exited(beacon));
            persisted
        };

        self.flush();
        persisted
    }

    /// Authorization changed. Informational only: monitoring is never stopped
    /// here.
    pub fn on_authorization_changed(&self, status: AuthorizationStatus) {
        match status {
            AuthorizationStatus::AuthorizedAlways => {
                debug!(%status, "Location authorization changed");
            }
            AuthorizationStatus::AuthorizedWhenInUse => {
                warn!(%status, "User granted only when-in-use authorization");
            }
            AuthorizationStatus::Denied | AuthorizationStatus::Restricted => {
                warn!(%status, "Location access revoked");
            }
            AuthorizationStatus::NotDetermined => {
                info!(%status, "Location authorization not determined");
            }
        }
    }

    /// The platform engine failed to start.
    pub fn on_initialization_failed(&self, reason: &str) {
        error!(%reason, "Unable to start platform beacon engine");
        match self.notifier() {
            Some(notifier) => {
                self.enqueue(notifier, Delivery::InitializationFailed(reason.to_string()));
                self.flush();
            }
            None => warn!(%reason, "No notifier registered to report initialization failure"),
        }
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn check_authorization(&self) -> Result<()> {
        if !self.gateway.is_location_service_enabled() {
            warn!("Location services not enabled");
            return Err(BeaknError::Authorization(
                AuthorizationFailure::ServicesDisabled,
            ));
        }

        let status = self.gateway.authorization_status();
        if status.permits_monitoring() {
            return Ok(());
        }

        let failure = match status {
            AuthorizationStatus::Denied => AuthorizationFailure::Denied,
            AuthorizationStatus::Restricted => AuthorizationFailure::Restricted,
            AuthorizationStatus::AuthorizedAlways
            | AuthorizationStatus::AuthorizedWhenInUse
            | AuthorizationStatus::NotDetermined => AuthorizationFailure::NotAuthorized,
        };
        warn!(reason = %failure, "Region monitoring not authorized");
        Err(BeaknError::Authorization(failure))
    }

    /// The platform's own region for `beacon`, else one derived from it.
    fn platform_region(&self, beacon: &BeaconDescriptor) -> Option<BeaconRegion> {
        self.gateway
            .active_region(&beacon.identifier)
            .or_else(|| beacon.region().ok())
    }

    /// Returns `false` if the platform has no active region for `identifier`.
    fn stop_platform_region(&self, identifier: &str) -> bool {
        match self.gateway.active_region(identifier) {
            Some(region) => {
                debug!(%identifier, "Stopping monitoring for region");
                self.gateway.stop_monitoring(&region);
                true
            }
            None => {
                debug!(%identifier, "Platform has no active region to stop");
                false
            }
        }
    }

    /// Queue a notifier call. Called with the tables lock held so the queue
    /// order matches the order of state changes.
    fn enqueue(&self, notifier: Arc<dyn Notifier>, delivery: Delivery) {
        self.outbox.lock().queue.push_back(Pending { notifier, delivery });
    }

    /// Deliver queued notifier calls, unless another caller already is.
    fn flush(&self) {
        {
            let mut outbox = self.outbox.lock();
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }

        loop {
            let next = {
                let mut outbox = self.outbox.lock();
                let next = outbox.queue.pop_front();
                if next.is_none() {
                    outbox.draining = false;
                }
                next
            };
            let Some(Pending { notifier, delivery }) = next else {
                return;
            };

            match delivery {
                Delivery::Entered(beacon) => notifier.entered(&beacon),
                Delivery::Exited(beacon) => notifier.exited(&beacon),
                Delivery::MonitoringFailed(beacon, reason) => {
                    notifier.monitoring_failed(&beacon, &reason);
                }
                Delivery::InitializationFailed(reason) => notifier.initialization_failed(&reason),
            }
        }
    }

    fn persist(&self, tables: &RegionTables, which: &[Table]) -> Result<()> {
        let mut first_error = None;
        for &table in which {
            if let Err(err) = self.store.save(table.name(), tables.get(table)) {
                error!(table = table.name(), error = %err, "Failed to persist region table");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use super::*;
    use crate::notifier::{EventLog, RegionEvent};
    use crate::simulated::{GatewayCall, SimulatedGateway};
    use crate::store::MemoryStore;

    const UUID: &str = "E2C56DB5-DFFB-48D2-B060-D0F5A71096E0";

    type Tracker = RegionTracker<SimulatedGateway, Arc<MemoryStore>>;

    fn beacon(id: &str) -> BeaconDescriptor {
        BeaconDescriptor::new(UUID, id, Some(1), None)
    }

    fn tracker() -> (Tracker, Arc<MemoryStore>, Arc<EventLog>) {
        let store = Arc::new(MemoryStore::new());
        let tracker = RegionTracker::open(SimulatedGateway::default(), Arc::clone(&store)).unwrap();
        let log = Arc::new(EventLog::new(64));
        tracker.set_notifier(&log);
        (tracker, store, log)
    }

    fn monitored(tracker: &Tracker, id: &str) {
        tracker.request_monitoring_one(&beacon(id)).unwrap();
        tracker.on_monitoring_started(id).unwrap();
    }

    #[test]
    fn test_request_does_not_mark_monitored() {
        let (tracker, store, _log) = tracker();
        tracker.request_monitoring_one(&beacon("lobby")).unwrap();

        assert!(!tracker.is_monitoring(&beacon("lobby")));
        assert!(!tracker.is_monitoring_active());
        assert!(tracker.status("lobby").requested);
        assert!(store.table(REQUESTED_TABLE).contains_key("lobby"));
        assert_eq!(
            tracker.gateway().calls(),
            vec![GatewayCall::Start("lobby".into())]
        );
    }

    #[test]
    fn test_started_marks_monitored_and_requests_state() {
        let (tracker, store, _log) = tracker();
        monitored(&tracker, "lobby");

        assert!(tracker.is_monitoring(&beacon("lobby")));
        assert!(tracker.is_monitoring_active());
        assert!(store.table(MONITORED_TABLE).contains_key("lobby"));
        assert_eq!(
            tracker.gateway().calls().last(),
            Some(&GatewayCall::RequestState("lobby".into()))
        );
    }

    #[test]
    fn test_started_for_unrequested_region_is_ignored() {
        let (tracker, _store, _log) = tracker();
        tracker.on_monitoring_started("ghost").unwrap();

        assert!(!tracker.is_monitoring_active());
        assert!(tracker.gateway().calls().is_empty());
    }

    #[test]
    fn test_duplicate_entry_is_delivered_once() {
        let (tracker, _store, log) = tracker();
        monitored(&tracker, "lobby");

        tracker.on_entered("lobby").unwrap();
        tracker.on_entered("lobby").unwrap();

        assert_eq!(log.total(), 1);
        assert!(tracker.status("lobby").reachable);
    }

    #[test]
    fn test_exit_without_entry_is_dropped() {
        let (tracker, _store, log) = tracker();
        monitored(&tracker, "lobby");

        tracker.on_exited("lobby").unwrap();

        assert_eq!(log.total(), 0);
        assert!(!tracker.status("lobby").reachable);
    }

    #[test]
    fn test_entry_without_notifier_is_dropped_not_queued() {
        let (tracker, _store, log) = tracker();
        monitored(&tracker, "lobby");
        tracker.clear_notifier();

        tracker.on_entered("lobby").unwrap();
        assert!(!tracker.status("lobby").reachable);

        tracker.set_notifier(&log);
        assert_eq!(log.total(), 0);
        tracker.on_entered("lobby").unwrap();
        assert_eq!(log.total(), 1);
    }

    #[test]
    fn test_notifier_is_not_kept_alive() {
        let (tracker, _store, log) = tracker();
        assert!(tracker.has_notifier());
        drop(log);
        assert!(!tracker.has_notifier());
    }

    #[test]
    fn test_monitoring_failed_keeps_request() {
        let (tracker, _store, log) = tracker();
        tracker.request_monitoring_one(&beacon("lobby")).unwrap();

        tracker
            .on_monitoring_failed("lobby", "region class unsupported")
            .unwrap();

        let status = tracker.status("lobby");
        assert!(status.requested);
        assert!(!status.monitored);
        let events = log.recent(1);
        assert!(matches!(
            &events[0].event,
            RegionEvent::MonitoringFailed { beacon, reason }
                if beacon.identifier == "lobby" && reason == "region class unsupported"
        ));
    }

    #[test]
    fn test_monitoring_failed_after_start_drops_monitored() {
        let (tracker, _store, _log) = tracker();
        monitored(&tracker, "lobby");
        tracker.on_entered("lobby").unwrap();

        tracker.on_monitoring_failed("lobby", "lost").unwrap();

        let status = tracker.status("lobby");
        assert!(status.requested);
        assert!(!status.monitored);
        assert!(!status.reachable);
        assert!(tracker.snapshot().is_consistent());
    }

    #[test]
    fn test_stop_keeps_requested() {
        let (tracker, _store, log) = tracker();
        monitored(&tracker, "lobby");
        tracker.on_entered("lobby").unwrap();

        tracker.stop_monitoring_one(&beacon("lobby")).unwrap();

        let status = tracker.status("lobby");
        assert!(status.requested);
        assert!(!status.monitored);
        assert!(!status.reachable);
        assert!(tracker
            .gateway()
            .calls()
            .contains(&GatewayCall::Stop("lobby".into())));

        tracker.on_entered("lobby").unwrap();
        assert_eq!(log.total(), 1);
    }

    #[test]
    fn test_stop_when_inactive_is_noop() {
        let (tracker, _store, _log) = tracker();
        tracker.request_monitoring_one(&beacon("lobby")).unwrap();

        tracker.stop_monitoring_one(&beacon("lobby")).unwrap();

        assert!(!tracker
            .gateway()
            .calls()
            .contains(&GatewayCall::Stop("lobby".into())));
    }

    #[test]
    fn test_stop_all() {
        let (tracker, store, _log) = tracker();
        monitored(&tracker, "a");
        monitored(&tracker, "b");
        tracker.on_entered("b").unwrap();

        tracker.stop_all().unwrap();

        assert!(!tracker.is_monitoring_active());
        let snapshot = tracker.snapshot();
        assert!(snapshot.monitored.is_empty());
        assert!(snapshot.reachable.is_empty());
        assert_eq!(snapshot.requested.len(), 2);
        assert!(store.table(MONITORED_TABLE).is_empty());
    }

    #[test]
    fn test_forget_cancels_pending_confirmation() {
        let (tracker, _store, _log) = tracker();
        tracker.request_monitoring_one(&beacon("lobby")).unwrap();

        assert_eq!(tracker.forget(["lobby", "unknown"]).unwrap(), 1);
        tracker.on_monitoring_started("lobby").unwrap();

        assert_eq!(
            tracker.status("lobby"),
            RegionStatus {
                requested: false,
                monitored: false,
                reachable: false
            }
        );
        assert!(tracker
            .gateway()
            .calls()
            .contains(&GatewayCall::Stop("lobby".into())));
    }

    #[test]
    fn test_last_write_wins_for_same_identifier() {
        let (tracker, _store, _log) = tracker();
        tracker
            .request_monitoring_one(&BeaconDescriptor::new(UUID, "lobby", Some(1), Some(2)))
            .unwrap();
        tracker
            .request_monitoring_one(&BeaconDescriptor::new(UUID, "lobby", Some(5), None))
            .unwrap();

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.requested.len(), 1);
        assert_eq!(snapshot.requested["lobby"].major, Some(5));
        assert_eq!(snapshot.requested["lobby"].minor, None);
    }

    #[test]
    fn test_persistence_failure_rolls_back_request() {
        let (tracker, store, _log) = tracker();
        store.fail_saves(true);

        let err = tracker.request_monitoring_one(&beacon("lobby")).unwrap_err();

        assert!(matches!(err, BeaknError::Persistence(_)));
        assert!(!tracker.status("lobby").requested);
        assert_eq!(tracker.gateway().start_count(), 0);

        // A later successful save must not carry the rejected region
        store.fail_saves(false);
        tracker.request_monitoring_one(&beacon("hall")).unwrap();
        assert!(!store.table(REQUESTED_TABLE).contains_key("lobby"));
    }

    #[test]
    fn test_persistence_failure_restores_previous_request() {
        let (tracker, store, _log) = tracker();
        tracker
            .request_monitoring_one(&BeaconDescriptor::new(UUID, "lobby", Some(1), Some(2)))
            .unwrap();

        store.fail_saves(true);
        tracker
            .request_monitoring_one(&BeaconDescriptor::new(UUID, "lobby", Some(9), None))
            .unwrap_err();

        let requested = &tracker.snapshot().requested["lobby"];
        assert_eq!(requested.major, Some(1));
        assert_eq!(requested.minor, Some(2));
        assert_eq!(tracker.gateway().start_count(), 1);
    }

    #[test]
    fn test_stop_without_platform_region_keeps_monitored() {
        let (tracker, _store, _log) = tracker();
        monitored(&tracker, "lobby");
        tracker.on_entered("lobby").unwrap();
        tracker.gateway().reset_regions();

        tracker.stop_monitoring_one(&beacon("lobby")).unwrap();

        let status = tracker.status("lobby");
        assert!(status.monitored);
        assert!(status.reachable);
        assert!(tracker.is_monitoring_active());
        assert!(!tracker
            .gateway()
            .calls()
            .contains(&GatewayCall::Stop("lobby".into())));
    }

    /// Calls back into the tracker from `entered`, then records.
    #[derive(Default)]
    struct ReentrantNotifier {
        tracker: OnceLock<Weak<Tracker>>,
        seen: Mutex<Vec<String>>,
    }

    impl Notifier for ReentrantNotifier {
        fn initialization_failed(&self, _reason: &str) {}

        fn entered(&self, beacon: &BeaconDescriptor) {
            if let Some(tracker) = self.tracker.get().and_then(Weak::upgrade) {
                tracker.on_exited(&beacon.identifier).unwrap();
            }
            self.seen.lock().push(format!("entered {}", beacon.identifier));
        }

        fn exited(&self, beacon: &BeaconDescriptor) {
            self.seen.lock().push(format!("exited {}", beacon.identifier));
        }

        fn monitoring_failed(&self, _beacon: &BeaconDescriptor, _reason: &str) {}
    }

    #[test]
    fn test_notifications_follow_state_order() {
        let tracker = Arc::new(
            RegionTracker::open(SimulatedGateway::default(), Arc::new(MemoryStore::new()))
                .unwrap(),
        );
        let notifier = Arc::new(ReentrantNotifier::default());
        assert!(notifier.tracker.set(Arc::downgrade(&tracker)).is_ok());
        tracker.set_notifier(&notifier);
        monitored(&tracker, "lobby");

        tracker.on_entered("lobby").unwrap();

        assert_eq!(*notifier.seen.lock(), vec!["entered lobby", "exited lobby"]);
        assert!(!tracker.status("lobby").reachable);
    }

    #[test]
    fn test_initialization_failure_is_forwarded() {
        let (tracker, _store, log) = tracker();
        tracker
            .apply(GatewayEvent::InitializationFailed {
                reason: "radio off".into(),
            })
            .unwrap();

        assert!(matches!(
            &log.recent(1)[0].event,
            RegionEvent::InitializationFailed { reason } if reason == "radio off"
        ));
    }

    #[test]
    fn test_authorization_downgrade_keeps_monitoring() {
        let (tracker, _store, _log) = tracker();
        monitored(&tracker, "lobby");

        tracker
            .apply(GatewayEvent::AuthorizationChanged {
                status: AuthorizationStatus::AuthorizedWhenInUse,
            })
            .unwrap();

        assert!(tracker.is_monitoring(&beacon("lobby")));
    }

    #[test]
    fn test_open_repairs_inconsistent_tables() {
        let store = Arc::new(MemoryStore::new());
        let mut requested = RegionTable::new();
        requested.insert("a".into(), beacon("a"));
        let mut monitored = RegionTable::new();
        monitored.insert("a".into(), beacon("a"));
        monitored.insert("orphan".into(), beacon("orphan"));
        let mut reachable = RegionTable::new();
        reachable.insert("orphan".into(), beacon("orphan"));
        store.save(REQUESTED_TABLE, &requested).unwrap();
        store.save(MONITORED_TABLE, &monitored).unwrap();
        store.save(REACHABLE_TABLE, &reachable).unwrap();

        let tracker = RegionTracker::open(SimulatedGateway::default(), Arc::clone(&store)).unwrap();

        let snapshot = tracker.snapshot();
        assert!(snapshot.is_consistent());
        assert_eq!(snapshot.monitored.len(), 1);
        assert!(snapshot.reachable.is_empty());
        assert!(!store.table(MONITORED_TABLE).contains_key("orphan"));
    }
}
