//! Per-region tracking state machine.
//!
//! ```text
//! Unmonitored --start_monitoring--------> Entered
//! Entered     --region_entry_detected---> Ranging   (start ranging)
//! Ranging     --region_exit_detected----> Exited    (stop ranging)
//! Exited      --region_entry_detected---> Ranging   (start ranging)
//! *           --stop_monitoring---------> Unmonitored
//! *           --monitoring_did_fail-----> Unmonitored
//! ```
//!
//! Any other event is a no-op. The tracker only decides; ranging side effects
//! are returned as [`RangingCommand`]s for the caller to carry out.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::types::{Region, RegionTrackingState};

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangingCommand {
    /// Start the ranging subscription for the region.
    Start(Region),
    /// Stop the ranging subscription for the region.
    Stop(Region),
}

/// Outcome of feeding an event to the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Region the event concerned.
    pub region_id: String,
    /// State before the event.
    pub from: RegionTrackingState,
    /// State after the event.
    pub to: RegionTrackingState,
    /// Ranging side effect to perform, if any.
    pub command: Option<RangingCommand>,
}

impl Transition {
    fn unchanged(region_id: &str, state: RegionTrackingState) -> Self {
        Self {
            region_id: region_id.to_string(),
            from: state,
            to: state,
            command: None,
        }
    }

    /// Whether the state changed.
    #[must_use]
    pub fn is_change(&self) -> bool {
        self.from != self.to
    }
}

/// A tracked region and its state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionSnapshot {
    /// The region.
    pub region: Region,
    /// Current state. Never `Unmonitored`.
    pub state: RegionTrackingState,
    /// When the region entered its current state.
    pub since: DateTime<Utc>,
}

/// Owns the tracking state of every monitored region.
#[derive(Debug, Clone, Default)]
pub struct RegionTracker {
    regions: BTreeMap<String, RegionSnapshot>,
}

impl RegionTracker {
    /// Create a tracker with no monitored regions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a region. Untracked regions are `Unmonitored`.
    #[must_use]
    pub fn state(&self, region_id: &str) -> RegionTrackingState {
        self.regions
            .get(region_id)
            .map_or(RegionTrackingState::Unmonitored, |r| r.state)
    }

    /// The tracked region, if monitored.
    #[must_use]
    pub fn region(&self, region_id: &str) -> Option<&Region> {
        self.regions.get(region_id).map(|r| &r.region)
    }

    /// The region, only if it is currently ranging.
    #[must_use]
    pub fn ranging_region(&self, region_id: &str) -> Option<&Region> {
        self.regions
            .get(region_id)
            .filter(|r| r.state == RegionTrackingState::Ranging)
            .map(|r| &r.region)
    }

    /// Snapshot of a tracked region.
    #[must_use]
    pub fn snapshot(&self, region_id: &str) -> Option<&RegionSnapshot> {
        self.regions.get(region_id)
    }

    /// All tracked regions, ordered by identifier.
    pub fn regions(&self) -> impl Iterator<Item = &RegionSnapshot> {
        self.regions.values()
    }

    /// Begin monitoring `region`. Monitored regions are left untouched.
    pub fn start_monitoring(&mut self, region: Region) -> Transition {
        let region_id = region.identifier.clone();
        if let Some(existing) = self.regions.get(&region_id) {
            if existing.region != region {
                warn!(
                    region_id = %region_id,
                    "Region already monitored with a different identity, ignoring"
                );
            }
            return Transition::unchanged(&region_id, existing.state);
        }

        info!(region_id = %region_id, "Monitoring started");
        self.regions.insert(
            region_id.clone(),
            RegionSnapshot {
                region,
                state: RegionTrackingState::Entered,
                since: Utc::now(),
            },
        );
        Transition {
            region_id,
            from: RegionTrackingState::Unmonitored,
            to: RegionTrackingState::Entered,
            command: None,
        }
    }

    /// The sensor detected the beacon region.
    pub fn region_entry_detected(&mut self, region_id: &str) -> Transition {
        let Some(tracked) = self.regions.get_mut(region_id) else {
            return Transition::unchanged(region_id, RegionTrackingState::Unmonitored);
        };

        let from = tracked.state;
        match from {
            RegionTrackingState::Entered | RegionTrackingState::Exited => {
                tracked.state = RegionTrackingState::Ranging;
                tracked.since = Utc::now();
                info!(region_id = %region_id, from = %from, "Region entered, ranging");
                Transition {
                    region_id: region_id.to_string(),
                    from,
                    to: RegionTrackingState::Ranging,
                    command: Some(RangingCommand::Start(tracked.region.clone())),
                }
            }
            RegionTrackingState::Ranging | RegionTrackingState::Unmonitored => {
                Transition::unchanged(region_id, from)
            }
        }
    }

    /// The sensor lost the beacon region.
    pub fn region_exit_detected(&mut self, region_id: &str) -> Transition {
        let Some(tracked) = self.regions.get_mut(region_id) else {
            warn!(region_id = %region_id, "Exit for unmonitored region ignored");
            return Transition::unchanged(region_id, RegionTrackingState::Unmonitored);
        };

        let from = tracked.state;
        match from {
            RegionTrackingState::Ranging => {
                tracked.state = RegionTrackingState::Exited;
                tracked.since = Utc::now();
                info!(region_id = %region_id, "Region exited, ranging stopped");
                Transition {
                    region_id: region_id.to_string(),
                    from,
                    to: RegionTrackingState::Exited,
                    command: Some(RangingCommand::Stop(tracked.region.clone())),
                }
            }
            RegionTrackingState::Entered => {
                warn!(region_id = %region_id, "Exit before entry ignored");
                Transition::unchanged(region_id, from)
            }
            RegionTrackingState::Exited | RegionTrackingState::Unmonitored => {
                Transition::unchanged(region_id, from)
            }
        }
    }

    /// Stop monitoring a region and destroy its state.
    pub fn stop_monitoring(&mut self, region_id: &str) -> Transition {
        let transition = self.remove(region_id);
        if transition.is_change() {
            info!(region_id = %region_id, from = %transition.from, "Monitoring stopped");
        }
        transition
    }

    /// The sensor reported that monitoring failed. The region is reset.
    pub fn monitoring_did_fail(&mut self, region_id: &str, reason: &str) -> Transition {
        let transition = self.remove(region_id);
        warn!(
            region_id = %region_id,
            from = %transition.from,
            reason = %reason,
            "Monitoring failed, region reset"
        );
        transition
    }

    fn remove(&mut self, region_id: &str) -> Transition {
        let Some(tracked) = self.regions.remove(region_id) else {
            return Transition::unchanged(region_id, RegionTrackingState::Unmonitored);
        };

        let command = (tracked.state == RegionTrackingState::Ranging)
            .then(|| RangingCommand::Stop(tracked.region));
        Transition {
            region_id: region_id.to_string(),
            from: tracked.state,
            to: RegionTrackingState::Unmonitored,
            command,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RegionIdentity;
    use uuid::Uuid;

    fn region(id: &str) -> Region {
        Region::new(RegionIdentity::any(Uuid::nil()), id).unwrap()
    }

    #[test]
    fn test_start_monitoring_enters() {
        let mut tracker = RegionTracker::new();
        assert_eq!(tracker.state("lobby"), RegionTrackingState::Unmonitored);

        let transition = tracker.start_monitoring(region("lobby"));
        assert_eq!(transition.from, RegionTrackingState::Unmonitored);
        assert_eq!(transition.to, RegionTrackingState::Entered);
        assert!(transition.command.is_none());
        assert_eq!(tracker.state("lobby"), RegionTrackingState::Entered);
    }

    #[test]
    fn test_start_monitoring_twice_is_noop() {
        let mut tracker = RegionTracker::new();
        tracker.start_monitoring(region("lobby"));
        tracker.region_entry_detected("lobby");

        let transition = tracker.start_monitoring(region("lobby"));
        assert!(!transition.is_change());
        assert_eq!(tracker.state("lobby"), RegionTrackingState::Ranging);
    }

    #[test]
    fn test_entry_starts_ranging() {
        let mut tracker = RegionTracker::new();
        tracker.start_monitoring(region("lobby"));

        let transition = tracker.region_entry_detected("lobby");
        assert_eq!(transition.to, RegionTrackingState::Ranging);
        assert_eq!(transition.command, Some(RangingCommand::Start(region("lobby"))));
        assert!(tracker.ranging_region("lobby").is_some());
    }

    #[test]
    fn test_repeated_entry_is_noop() {
        let mut tracker = RegionTracker::new();
        tracker.start_monitoring(region("lobby"));
        tracker.region_entry_detected("lobby");

        let transition = tracker.region_entry_detected("lobby");
        assert!(!transition.is_change());
        assert!(transition.command.is_none());
    }

    #[test]
    fn test_exit_stops_ranging_and_reentry_resumes() {
        let mut tracker = RegionTracker::new();
        tracker.start_monitoring(region("lobby"));
        tracker.region_entry_detected("lobby");

        let exit = tracker.region_exit_detected("lobby");
        assert_eq!(exit.to, RegionTrackingState::Exited);
        assert_eq!(exit.command, Some(RangingCommand::Stop(region("lobby"))));
        assert!(tracker.ranging_region("lobby").is_none());

        let reentry = tracker.region_entry_detected("lobby");
        assert_eq!(reentry.from, RegionTrackingState::Exited);
        assert_eq!(reentry.to, RegionTrackingState::Ranging);
    }

    #[test]
    fn test_unexpected_exit_is_ignored() {
        let mut tracker = RegionTracker::new();
        assert!(!tracker.region_exit_detected("lobby").is_change());

        tracker.start_monitoring(region("lobby"));
        let transition = tracker.region_exit_detected("lobby");
        assert!(!transition.is_change());
        assert_eq!(tracker.state("lobby"), RegionTrackingState::Entered);
    }

    #[test]
    fn test_entry_for_unmonitored_region_is_noop() {
        let mut tracker = RegionTracker::new();
        let transition = tracker.region_entry_detected("lobby");
        assert_eq!(transition.to, RegionTrackingState::Unmonitored);
        assert_eq!(tracker.regions().count(), 0);
    }

    #[test]
    fn test_stop_monitoring_from_every_state() {
        for entries in 0..3 {
            let mut tracker = RegionTracker::new();
            tracker.start_monitoring(region("lobby"));
            if entries >= 1 {
                tracker.region_entry_detected("lobby");
            }
            if entries >= 2 {
                tracker.region_exit_detected("lobby");
            }

            let transition = tracker.stop_monitoring("lobby");
            assert_eq!(transition.to, RegionTrackingState::Unmonitored);
            assert_eq!(tracker.state("lobby"), RegionTrackingState::Unmonitored);
            assert!(tracker.region("lobby").is_none());
            assert_eq!(
                transition.command.is_some(),
                entries == 1,
                "only a ranging region needs ranging stopped"
            );
        }
    }

    #[test]
    fn test_monitoring_failure_resets_region() {
        let mut tracker = RegionTracker::new();
        tracker.start_monitoring(region("lobby"));
        tracker.region_entry_detected("lobby");

        let transition = tracker.monitoring_did_fail("lobby", "bluetooth-off");
        assert_eq!(transition.from, RegionTrackingState::Ranging);
        assert_eq!(transition.to, RegionTrackingState::Unmonitored);
        assert_eq!(tracker.state("lobby"), RegionTrackingState::Unmonitored);

        // The caller may start again
        tracker.start_monitoring(region("lobby"));
        assert_eq!(tracker.state("lobby"), RegionTrackingState::Entered);
    }

    #[test]
    fn test_regions_are_ordered() {
        let mut tracker = RegionTracker::new();
        tracker.start_monitoring(region("b"));
        tracker.start_monitoring(region("a"));

        let ids: Vec<&str> = tracker
            .regions()
            .map(|r| r.region.identifier.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
