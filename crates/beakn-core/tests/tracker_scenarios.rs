//! End-to-end tracker scenarios against the simulated gateway.

use std::sync::Arc;

use beakn_core::{
    AuthorizationFailure, AuthorizationStatus, BeaconDescriptor, BeaknError, EventLog,
    GatewayCall, GatewayEvent, JsonFileStore, MemoryStore, RegionEvent, RegionTracker,
    SimulatedGateway, TableStore, REQUESTED_TABLE,
};

const UUID: &str = "E2C56DB5-DFFB-48D2-B060-D0F5A71096E0";

fn lobby() -> BeaconDescriptor {
    BeaconDescriptor::new(UUID, "lobby", Some(100), Some(1))
}

fn started(identifier: &str) -> GatewayEvent {
    GatewayEvent::MonitoringStarted {
        identifier: identifier.into(),
    }
}

fn entered(identifier: &str) -> GatewayEvent {
    GatewayEvent::Entered {
        identifier: identifier.into(),
    }
}

fn exited(identifier: &str) -> GatewayEvent {
    GatewayEvent::Exited {
        identifier: identifier.into(),
    }
}

#[test]
fn batch_request_reports_each_descriptor() {
    let tracker = RegionTracker::open(SimulatedGateway::default(), MemoryStore::new()).unwrap();
    let valid = lobby();
    let minor_only = BeaconDescriptor::new(UUID, "desk", None, Some(7));
    let bad_uuid = BeaconDescriptor::new("lobby-uuid", "hall", None, None);

    let outcomes = tracker.request_monitoring(&[valid, minor_only, bad_uuid]);

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_accepted());
    assert!(matches!(
        outcomes[1].result,
        Err(BeaknError::InvalidBeaknInfo { .. })
    ));
    assert!(matches!(
        outcomes[2].result,
        Err(BeaknError::InvalidUuidString(_))
    ));

    let snapshot = tracker.snapshot();
    assert!(snapshot.requested.contains_key("lobby"));
    assert!(!snapshot.requested.contains_key("desk"));
    assert!(!snapshot.requested.contains_key("hall"));
    assert_eq!(tracker.gateway().start_count(), 1);
}

#[test]
fn denied_authorization_rejects_without_starting() {
    let gateway = SimulatedGateway::new(true, AuthorizationStatus::Denied);
    let tracker = RegionTracker::open(gateway, MemoryStore::new()).unwrap();

    let outcomes = tracker.request_monitoring(&[lobby()]);

    assert!(matches!(
        outcomes[0].result,
        Err(BeaknError::Authorization(AuthorizationFailure::Denied))
    ));
    assert!(tracker.snapshot().requested.is_empty());
    assert!(tracker.gateway().calls().is_empty());
}

#[test]
fn authorization_checks_run_in_order() {
    let gateway = SimulatedGateway::new(false, AuthorizationStatus::Restricted);
    let tracker = RegionTracker::open(gateway, MemoryStore::new()).unwrap();
    let invalid = BeaconDescriptor::new("nope", "x", None, Some(1));

    let err = tracker.request_monitoring_one(&invalid).unwrap_err();
    assert!(matches!(
        err,
        BeaknError::Authorization(AuthorizationFailure::ServicesDisabled)
    ));

    tracker.gateway().set_services_enabled(true);
    let err = tracker.request_monitoring_one(&invalid).unwrap_err();
    assert!(matches!(
        err,
        BeaknError::Authorization(AuthorizationFailure::Restricted)
    ));

    tracker
        .gateway()
        .set_authorization(AuthorizationStatus::AuthorizedWhenInUse);
    let err = tracker.request_monitoring_one(&invalid).unwrap_err();
    assert!(matches!(
        err,
        BeaknError::Authorization(AuthorizationFailure::NotAuthorized)
    ));

    tracker
        .gateway()
        .set_authorization(AuthorizationStatus::AuthorizedAlways);
    let err = tracker.request_monitoring_one(&invalid).unwrap_err();
    assert!(matches!(err, BeaknError::InvalidUuidString(_)));
}

#[test]
fn full_lifecycle_delivers_one_entry_and_one_exit() {
    let tracker = RegionTracker::open(SimulatedGateway::default(), MemoryStore::new()).unwrap();
    let events = Arc::new(EventLog::new(16));
    tracker.set_notifier(&events);

    tracker.request_monitoring_one(&lobby()).unwrap();
    assert!(!tracker.is_monitoring(&lobby()));

    tracker.apply(started("lobby")).unwrap();
    assert!(tracker.is_monitoring(&lobby()));

    tracker.apply(entered("lobby")).unwrap();
    tracker.apply(entered("lobby")).unwrap();
    tracker.apply(exited("lobby")).unwrap();
    tracker.apply(exited("lobby")).unwrap();

    let recorded: Vec<RegionEvent> = events.recent(16).into_iter().map(|r| r.event).collect();
    assert_eq!(
        recorded,
        vec![
            RegionEvent::Entered { beacon: lobby() },
            RegionEvent::Exited { beacon: lobby() },
        ]
    );
    assert!(!tracker.snapshot().reachable.contains_key("lobby"));
}

#[test]
fn stop_while_reachable_ignores_late_entry() {
    let tracker = RegionTracker::open(SimulatedGateway::default(), MemoryStore::new()).unwrap();
    let events = Arc::new(EventLog::new(16));
    tracker.set_notifier(&events);

    tracker.request_monitoring_one(&lobby()).unwrap();
    tracker.apply(started("lobby")).unwrap();
    tracker.apply(entered("lobby")).unwrap();

    tracker.stop_monitoring(&[lobby()]).unwrap();

    let snapshot = tracker.snapshot();
    assert!(snapshot.requested.contains_key("lobby"));
    assert!(!snapshot.monitored.contains_key("lobby"));
    assert!(!snapshot.reachable.contains_key("lobby"));
    assert!(!snapshot.monitoring_active);

    tracker.apply(entered("lobby")).unwrap();
    assert_eq!(events.total(), 1);
    assert!(tracker
        .gateway()
        .calls()
        .contains(&GatewayCall::Stop("lobby".into())));
}

#[test]
fn unknown_identifiers_are_dropped_silently() {
    let tracker = RegionTracker::open(SimulatedGateway::default(), MemoryStore::new()).unwrap();
    let events = Arc::new(EventLog::new(16));
    tracker.set_notifier(&events);

    for event in [
        started("ghost"),
        entered("ghost"),
        exited("ghost"),
        GatewayEvent::MonitoringFailed {
            identifier: "ghost".into(),
            reason: "n/a".into(),
        },
    ] {
        tracker.apply(event).unwrap();
    }

    assert_eq!(events.total(), 0);
    assert!(tracker.snapshot().requested.is_empty());
}

#[test]
fn state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let tracker =
            RegionTracker::open(SimulatedGateway::default(), JsonFileStore::new(dir.path()))
                .unwrap();
        let events = Arc::new(EventLog::new(16));
        tracker.set_notifier(&events);

        tracker
            .request_monitoring(&[lobby(), BeaconDescriptor::new(UUID, "hall", None, None)])
            .into_iter()
            .for_each(|outcome| assert!(outcome.is_accepted()));
        tracker.apply(started("lobby")).unwrap();
        tracker.apply(entered("lobby")).unwrap();
    }

    let tracker =
        RegionTracker::open(SimulatedGateway::default(), JsonFileStore::new(dir.path())).unwrap();
    let events = Arc::new(EventLog::new(16));
    tracker.set_notifier(&events);

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.requested.len(), 2);
    assert_eq!(snapshot.requested["hall"].major, None);
    assert_eq!(snapshot.requested["lobby"].minor, Some(1));
    assert!(snapshot.monitoring_active);
    assert!(tracker.is_monitoring(&lobby()));

    // The entry recorded before the restart still deduplicates.
    tracker.apply(entered("lobby")).unwrap();
    assert_eq!(events.total(), 0);
    tracker.apply(exited("lobby")).unwrap();
    assert_eq!(events.total(), 1);
}

#[test]
fn stopping_last_region_is_durable() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path());

    {
        let tracker = RegionTracker::open(SimulatedGateway::default(), store.clone()).unwrap();
        tracker.request_monitoring_one(&lobby()).unwrap();
        tracker.apply(started("lobby")).unwrap();
        tracker.stop_all().unwrap();
    }

    let tracker = RegionTracker::open(SimulatedGateway::default(), store.clone()).unwrap();
    assert!(!tracker.is_monitoring_active());
    assert_eq!(store.load(REQUESTED_TABLE).unwrap().len(), 1);
}

#[test]
fn concurrent_callers_keep_tables_consistent() {
    let tracker = Arc::new(
        RegionTracker::open(SimulatedGateway::default(), MemoryStore::new()).unwrap(),
    );
    let events = Arc::new(EventLog::new(1024));
    tracker.set_notifier(&events);

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let tracker = Arc::clone(&tracker);
            std::thread::spawn(move || {
                for round in 0..50 {
                    let id = format!("region-{}", (worker + round) % 6);
                    let beacon = BeaconDescriptor::new(UUID, id.clone(), Some(1), None);
                    let _ = tracker.request_monitoring_one(&beacon);
                    let _ = tracker.apply(started(&id));
                    let _ = tracker.apply(entered(&id));
                    if round % 3 == 0 {
                        let _ = tracker.stop_monitoring_one(&beacon);
                    }
                    let _ = tracker.apply(exited(&id));
                    assert!(tracker.snapshot().is_consistent());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(tracker.snapshot().is_consistent());
}
