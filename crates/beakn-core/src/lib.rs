//! # beakn-core
//!
//! Region tracking for Bluetooth beacon monitoring.
//!
//! The platform's beacon engine reports region callbacks that may be
//! duplicated or reordered. This crate turns them into a clean stream of
//! entered / exited / failed events and keeps track of which regions were
//! requested, which the platform confirmed, and which the device is inside,
//! across process restarts.
//!
//! ## Architecture
//!
//! - [`descriptor`] - Beacon descriptors and validated platform regions
//! - [`tracker`] - The region-tracking state machine
//! - [`gateway`] - Contract with the platform engine and its event feed
//! - [`simulated`] - In-process platform engine for hosts and tests
//! - [`notifier`] - Listener contract and a recording event log
//! - [`store`] - Persistence of region tables
//! - [`config`] - Configuration loading, saving, and validation
//! - [`error`] - Unified error types for the crate
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use beakn_core::{
//!     BeaconDescriptor, EventLog, GatewayEvent, MemoryStore, RegionTracker, SimulatedGateway,
//! };
//!
//! let tracker = RegionTracker::open(SimulatedGateway::default(), MemoryStore::new())?;
//! let events = Arc::new(EventLog::new(16));
//! tracker.set_notifier(&events);
//!
//! let lobby = BeaconDescriptor::new("E2C56DB5-DFFB-48D2-B060-D0F5A71096E0", "lobby", Some(1), None);
//! tracker.request_monitoring_one(&lobby)?;
//! tracker.apply(GatewayEvent::MonitoringStarted { identifier: "lobby".into() })?;
//! tracker.apply(GatewayEvent::Entered { identifier: "lobby".into() })?;
//!
//! assert!(tracker.is_monitoring(&lobby));
//! assert_eq!(events.total(), 1);
//! # Ok::<(), beakn_core::BeaknError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod config;
pub mod descriptor;
pub mod error;
pub mod gateway;
pub mod notifier;
pub mod simulated;
pub mod store;
pub mod tracker;

// Re-export primary types for convenience
pub use config::{
    default_config_path, BeaknConfig, ConfigError, ConfigResult, EventsConfig, LoggingConfig,
    ServerConfig, StorageConfig,
};
pub use descriptor::{BeaconDescriptor, BeaconRegion, RegionScope};
pub use error::{AuthorizationFailure, BeaknError, Result};
pub use gateway::{AuthorizationStatus, GatewayEvent, MonitoringGateway};
pub use notifier::{EventLog, Notifier, RecordedEvent, RegionEvent};
pub use simulated::{GatewayCall, PlatformStatus, SimulatedGateway};
pub use store::{
    default_data_dir, JsonFileStore, MemoryStore, RegionTable, TableStore, MONITORED_TABLE,
    REACHABLE_TABLE, REQUESTED_TABLE,
};
pub use tracker::{RegionStatus, RegionTracker, RequestOutcome, TrackerSnapshot};
