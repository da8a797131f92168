//! Classification publishing.
//!
//! The only place the engine talks to its consumer. Publishing the same tier
//! twice in a row for a region is suppressed.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{info, warn};

use crate::collaborators::ConsumerSink;
use crate::types::{ClassificationEvent, ConsumerEvent, ErrorKind, ProximityTier};

/// Delivers confirmed classifications and failures to a [`ConsumerSink`].
#[derive(Debug)]
pub struct Publisher<S> {
    sink: S,
    last_published: HashMap<String, ProximityTier>,
}

impl<S: ConsumerSink> Publisher<S> {
    /// Create a publisher delivering to `sink`.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            last_published: HashMap::new(),
        }
    }

    /// Publish a classification.
    ///
    /// Returns `false` (and delivers nothing) when the tier equals the last
    /// one published for the region.
    pub fn publish(&mut self, event: ClassificationEvent) -> bool {
        let tier = event.classification.tier();
        if self.last_published.get(&event.region_id) == Some(&tier) {
            return false;
        }

        info!(
            region_id = %event.region_id,
            tier = %tier,
            distance_m = ?event.classification.estimated_distance(),
            "Classification published"
        );
        self.last_published.insert(event.region_id.clone(), tier);
        self.sink.deliver(ConsumerEvent::Classification(event));
        true
    }

    /// Surface a monitoring failure to the consumer.
    pub fn report_failure(&mut self, region_id: &str, reason: &str) {
        warn!(region_id = %region_id, reason = %reason, "Reporting monitoring failure");
        self.sink.deliver(ConsumerEvent::MonitoringFailed {
            kind: ErrorKind::MonitoringFailed,
            region_id: region_id.to_string(),
            reason: reason.to_string(),
            failed_at: Utc::now(),
        });
    }

    /// Tier most recently published for a region.
    #[must_use]
    pub fn last_published(&self, region_id: &str) -> Option<ProximityTier> {
        self.last_published.get(region_id).copied()
    }

    /// Forget what was published for a region.
    pub fn forget(&mut self, region_id: &str) {
        self.last_published.remove(region_id);
    }

    /// The consumer sink.
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutable access to the consumer sink.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}
