//! Application state shared across handlers.

use std::sync::Arc;

use beakn_core::{BeaknConfig, EventLog, JsonFileStore, RegionTracker, SimulatedGateway};

/// The tracker as embedded by this service.
pub type Tracker = RegionTracker<SimulatedGateway, JsonFileStore>;

/// Shared application state handle.
pub type SharedState = Arc<AppState>;

/// Everything handlers need.
///
/// The tracker serializes its own mutations, so no outer lock is needed.
#[derive(Debug)]
pub struct AppState {
    /// The one tracker this process owns.
    pub tracker: Tracker,

    /// Notifier registered with the tracker. The tracker only holds a weak
    /// handle, so this keeps it alive.
    pub events: Arc<EventLog>,

    /// Loaded configuration.
    pub config: BeaknConfig,
}

impl AppState {
    /// Open the tracker over the configured data directory and register the
    /// event log as its notifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be resolved or the
    /// persisted tables cannot be loaded.
    pub fn new(config: BeaknConfig) -> anyhow::Result<SharedState> {
        let store = JsonFileStore::new(config.data_dir()?);
        tracing::info!(data_dir = %store.data_dir().display(), "Opening region tables");

        let tracker = RegionTracker::open(SimulatedGateway::default(), store)?;
        let events = Arc::new(EventLog::new(config.events.history_capacity));
        tracker.set_notifier(&events);

        Ok(Arc::new(Self {
            tracker,
            events,
            config,
        }))
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        self.tracker.clear_notifier();
    }
}
