//! Boundaries to the sensor and consumer sides.
//!
//! The engine never talks to an operating system directly. It asks a
//! [`RangingControl`] to start or stop ranging subscriptions and hands
//! confirmed events to a [`ConsumerSink`]. In-memory implementations of both
//! are provided for services and tests.

use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use crate::types::{ConsumerEvent, Region};

/// Sensor-side control of ranging subscriptions.
pub trait RangingControl {
    /// Ask the sensor to start delivering ranging samples for `region`.
    fn start_ranging(&mut self, region: &Region);

    /// Ask the sensor to stop delivering ranging samples for `region`.
    fn stop_ranging(&mut self, region: &Region);
}

/// Receiver of classification and failure events.
pub trait ConsumerSink {
    /// Deliver one event.
    fn deliver(&mut self, event: ConsumerEvent);
}

impl<T: RangingControl + ?Sized> RangingControl for &mut T {
    fn start_ranging(&mut self, region: &Region) {
        (**self).start_ranging(region);
    }

    fn stop_ranging(&mut self, region: &Region) {
        (**self).stop_ranging(region);
    }
}

impl<T: ConsumerSink + ?Sized> ConsumerSink for &mut T {
    fn deliver(&mut self, event: ConsumerEvent) {
        (**self).deliver(event);
    }
}

// ============================================================================
// In-memory implementations
// ============================================================================

/// Default number of events retained by an [`EventLog`].
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 256;

/// Bounded in-memory [`ConsumerSink`]. The oldest event is evicted when full.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<ConsumerEvent>,
    capacity: usize,
    total_delivered: u64,
}

impl EventLog {
    /// Create a log retaining at most `capacity` events (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            total_delivered: 0,
        }
    }

    /// The most recent events, newest last, at most `limit` of them.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<&ConsumerEvent> {
        let skip = self.events.len().saturating_sub(limit);
        self.events.iter().skip(skip).collect()
    }

    /// Remove and return every retained event.
    pub fn drain(&mut self) -> Vec<ConsumerEvent> {
        self.events.drain(..).collect()
    }

    /// Number of retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events delivered since creation, including evicted ones.
    #[must_use]
    pub const fn total_delivered(&self) -> u64 {
        self.total_delivered
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_LOG_CAPACITY)
    }
}

impl ConsumerSink for EventLog {
    fn deliver(&mut self, event: ConsumerEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
        self.total_delivered += 1;
    }
}

/// [`RangingControl`] that records which regions the sensor should be ranging.
#[derive(Debug, Clone, Default)]
pub struct RangingLog {
    active: BTreeMap<String, Region>,
    start_requests: u64,
    stop_requests: u64,
}

impl RangingLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether ranging is currently requested for `region_id`.
    #[must_use]
    pub fn is_active(&self, region_id: &str) -> bool {
        self.active.contains_key(region_id)
    }

    /// Regions with an active ranging request, ordered by identifier.
    pub fn active(&self) -> impl Iterator<Item = &Region> {
        self.active.values()
    }

    /// Number of start requests received.
    #[must_use]
    pub const fn start_requests(&self) -> u64 {
        self.start_requests
    }

    /// Number of stop requests received.
    #[must_use]
    pub const fn stop_requests(&self) -> u64 {
        self.stop_requests
    }
}

impl RangingControl for RangingLog {
    fn start_ranging(&mut self, region: &Region) {
        debug!(region_id = %region.identifier, "Ranging start requested");
        self.start_requests += 1;
        self.active
            .insert(region.identifier.clone(), region.clone());
    }

    fn stop_ranging(&mut self, region: &Region) {
        debug!(region_id = %region.identifier, "Ranging stop requested");
        self.stop_requests += 1;
        self.active.remove(&region.identifier);
    }
}
