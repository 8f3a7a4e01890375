//! Listener contract for normalized region events.
//!
//! The tracker holds its [`Notifier`] through a non-owning handle: the host
//! keeps the listener alive and clears it before tearing it down.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::descriptor::BeaconDescriptor;

/// Receives deduplicated region events from the tracker.
///
/// Methods are called outside the tracker's lock, so implementations may call
/// back into the tracker. Calls arrive one at a time, in the order the
/// tracker's tables changed; a call triggered from inside a callback is made
/// after that callback returns.
pub trait Notifier: Send + Sync {
    /// The platform beacon engine failed to start.
    fn initialization_failed(&self, reason: &str);

    /// The device entered a monitored region.
    fn entered(&self, beacon: &BeaconDescriptor);

    /// The device left a monitored region.
    fn exited(&self, beacon: &BeaconDescriptor);

    /// The platform could not monitor a requested region.
    fn monitoring_failed(&self, beacon: &BeaconDescriptor, reason: &str);
}

/// A notifier callback as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegionEvent {
    /// See [`Notifier::initialization_failed`].
    InitializationFailed {
        /// Platform-supplied reason.
        reason: String,
    },
    /// See [`Notifier::entered`].
    Entered {
        /// Region entered.
        beacon: BeaconDescriptor,
    },
    /// See [`Notifier::exited`].
    Exited {
        /// Region exited.
        beacon: BeaconDescriptor,
    },
    /// See [`Notifier::monitoring_failed`].
    MonitoringFailed {
        /// Region that could not be monitored.
        beacon: BeaconDescriptor,
        /// Platform-supplied reason.
        reason: String,
    },
}

/// A region event with its arrival metadata.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecordedEvent {
    /// Monotonic sequence number, starting at 1.
    pub sequence: u64,

    /// When the event was delivered (UTC).
    pub recorded_at_utc: DateTime<Utc>,

    /// The event itself.
    pub event: RegionEvent,
}

/// Notifier that logs every event and keeps the most recent ones.
#[derive(Debug)]
pub struct EventLog {
    capacity: usize,
    inner: Mutex<EventLogInner>,
}

#[derive(Debug, Default)]
struct EventLogInner {
    next_sequence: u64,
    events: VecDeque<RecordedEvent>,
}

impl EventLog {
    /// Create a log keeping at most `capacity` events (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(EventLogInner {
                next_sequence: 1,
                events: VecDeque::with_capacity(capacity),
            }),
        }
    }

    /// The most recent `limit` events, oldest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<RecordedEvent> {
        let inner = self.inner.lock();
        let skip = inner.events.len().saturating_sub(limit);
        inner.events.iter().skip(skip).cloned().collect()
    }

    /// Total number of events ever recorded.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.inner.lock().next_sequence - 1
    }

    fn record(&self, event: RegionEvent) {
        let mut inner = self.inner.lock();
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        if inner.events.len() == self.capacity {
            inner.events.pop_front();
        }
        inner.events.push_back(RecordedEvent {
            sequence,
            recorded_at_utc: Utc::now(),
            event,
        });
    }
}

impl Notifier for EventLog {
    fn initialization_failed(&self, reason: &str) {
        tracing::error!(%reason, "Unable to initialize beacon monitoring");
        self.record(RegionEvent::InitializationFailed {
            reason: reason.to_string(),
        });
    }

    fn entered(&self, beacon: &BeaconDescriptor) {
        tracing::info!(identifier = %beacon.identifier, "Device entered region");
        self.record(RegionEvent::Entered {
            beacon: beacon.clone(),
        });
    }

    fn exited(&self, beacon: &BeaconDescriptor) {
        tracing::info!(identifier = %beacon.identifier, "Device exited region");
        self.record(RegionEvent::Exited {
            beacon: beacon.clone(),
        });
    }

    fn monitoring_failed(&self, beacon: &BeaconDescriptor, reason: &str) {
        tracing::warn!(identifier = %beacon.identifier, %reason, "Monitoring failed for region");
        self.record(RegionEvent::MonitoringFailed {
            beacon: beacon.clone(),
            reason: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beacon(id: &str) -> BeaconDescriptor {
        BeaconDescriptor::new("E2C56DB5-DFFB-48D2-B060-D0F5A71096E0", id, None, None)
    }

    #[test]
    fn test_event_log_keeps_most_recent() {
        let log = EventLog::new(2);
        log.entered(&beacon("a"));
        log.exited(&beacon("a"));
        log.entered(&beacon("b"));

        let recent = log.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].sequence, 2);
        assert_eq!(recent[1].sequence, 3);
        assert_eq!(log.total(), 3);
        assert!(matches!(&recent[1].event, RegionEvent::Entered { beacon } if beacon.identifier == "b"));
    }

    #[test]
    fn test_recent_limit() {
        let log = EventLog::new(8);
        log.initialization_failed("radio off");
        log.monitoring_failed(&beacon("a"), "unsupported");

        let last = log.recent(1);
        assert_eq!(last.len(), 1);
        assert!(matches!(&last[0].event, RegionEvent::MonitoringFailed { reason, .. } if reason == "unsupported"));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let log = EventLog::new(0);
        log.entered(&beacon("a"));
        log.entered(&beacon("b"));
        assert_eq!(log.recent(5).len(), 1);
    }
}
