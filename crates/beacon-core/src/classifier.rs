//! RSSI smoothing, tier classification and hysteresis.
//!
//! Each region keeps a small rolling window of recent RSSI values. The median
//! of the window is mapped to a [`ProximityTier`] using fixed thresholds, and a
//! log-distance path-loss model turns it into a distance estimate:
//!
//! ```text
//! distance_m = 10 ^ ((measured_power - rssi) / (10 * n))
//! ```
//!
//! A single formula is used across all tiers, so the estimate is continuous at
//! the thresholds and strictly decreasing in RSSI.
//!
//! Tier changes are debounced by a [`HysteresisGate`]: a new tier must be seen
//! on `confirmations_required` consecutive classifications before it replaces
//! the published one.

use std::collections::{HashMap, VecDeque};

use crate::config::ClassifierConfig;
use crate::types::{BeaconIdentity, ProximityClassification, ProximityTier};

// ============================================================================
// Window
// ============================================================================

/// Bounded window of recent RSSI values, oldest first.
#[derive(Debug, Clone)]
pub struct RssiWindow {
    samples: VecDeque<i16>,
    capacity: usize,
}

impl RssiWindow {
    /// Create an empty window holding at most `capacity` values (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a value, evicting the oldest when full.
    pub fn push(&mut self, rssi: i16) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(rssi);
    }

    /// Median of the window. Even counts average the two middle values.
    #[must_use]
    pub fn median(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<i16> = self.samples.iter().copied().collect();
        sorted.sort_unstable();

        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (f64::from(sorted[mid - 1]) + f64::from(sorted[mid])) / 2.0
        } else {
            f64::from(sorted[mid])
        };
        Some(median)
    }

    /// Number of values held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the window holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ============================================================================
// Mapping
// ============================================================================

/// Fixed RSSI thresholds separating the tiers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierThresholds {
    /// At or above: `Immediate`.
    pub immediate_dbm: f64,
    /// At or above (and below immediate): `Near`. Below: `Far`.
    pub near_dbm: f64,
}

impl TierThresholds {
    /// Map a smoothed RSSI to a tier. Never returns `Unknown`.
    #[must_use]
    pub fn tier(&self, rssi: f64) -> ProximityTier {
        if rssi >= self.immediate_dbm {
            ProximityTier::Immediate
        } else if rssi >= self.near_dbm {
            ProximityTier::Near
        } else {
            ProximityTier::Far
        }
    }
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            immediate_dbm: -50.0,
            near_dbm: -75.0,
        }
    }
}

/// Log-distance path-loss model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathLossModel {
    /// Expected RSSI at one meter.
    pub measured_power_dbm: f64,
    /// Path-loss exponent.
    pub exponent: f64,
}

impl PathLossModel {
    /// Estimated distance in meters for a smoothed RSSI.
    #[must_use]
    pub fn distance_m(&self, rssi: f64) -> f64 {
        10f64.powf((self.measured_power_dbm - rssi) / (10.0 * self.exponent))
    }
}

impl Default for PathLossModel {
    fn default() -> Self {
        Self {
            measured_power_dbm: -59.0,
            exponent: 2.0,
        }
    }
}

// ============================================================================
// Hysteresis
// ============================================================================

/// Debounces tier changes for one region.
#[derive(Debug, Clone)]
pub struct HysteresisGate {
    confirmations_required: u8,
    published: Option<ProximityTier>,
    candidate: Option<(ProximityTier, u8)>,
}

impl HysteresisGate {
    /// Create a gate requiring `confirmations_required` agreeing observations.
    #[must_use]
    pub fn new(confirmations_required: u8) -> Self {
        Self {
            confirmations_required: confirmations_required.max(1),
            published: None,
            candidate: None,
        }
    }

    /// Offer a freshly classified tier.
    ///
    /// Returns `true` when `tier` becomes the published tier: on the first
    /// observation, or once a different tier has been seen enough times in a
    /// row. Seeing the published tier again cancels any pending change.
    pub fn offer(&mut self, tier: ProximityTier) -> bool {
        let Some(published) = self.published else {
            self.published = Some(tier);
            self.candidate = None;
            return true;
        };

        if tier == published {
            self.candidate = None;
            return false;
        }

        let count = match self.candidate {
            Some((candidate, count)) if candidate == tier => count.saturating_add(1),
            _ => 1,
        };

        if count >= self.confirmations_required {
            self.published = Some(tier);
            self.candidate = None;
            true
        } else {
            self.candidate = Some((tier, count));
            false
        }
    }

    /// The currently published tier.
    #[must_use]
    pub const fn published(&self) -> Option<ProximityTier> {
        self.published
    }
}

// ============================================================================
// Classifier
// ============================================================================

#[derive(Debug, Clone)]
struct RegionWindow {
    window: RssiWindow,
    gate: HysteresisGate,
    last_beacon: Option<BeaconIdentity>,
}

/// Per-region proximity classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    window_capacity: usize,
    confirmations_required: u8,
    thresholds: TierThresholds,
    model: PathLossModel,
    regions: HashMap<String, RegionWindow>,
}

impl Classifier {
    /// Create a classifier from configuration.
    #[must_use]
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            window_capacity: config.window_capacity,
            confirmations_required: config.confirmations_required,
            thresholds: TierThresholds {
                immediate_dbm: f64::from(config.immediate_threshold_dbm),
                near_dbm: f64::from(config.near_threshold_dbm),
            },
            model: PathLossModel {
                measured_power_dbm: f64::from(config.measured_power_dbm),
                exponent: config.path_loss_exponent,
            },
            regions: HashMap::new(),
        }
    }

    /// Record an accepted sample in the region's window.
    pub fn record(&mut self, region_id: &str, beacon: BeaconIdentity, rssi: i16) {
        let capacity = self.window_capacity;
        let confirmations = self.confirmations_required;
        let entry = self
            .regions
            .entry(region_id.to_string())
            .or_insert_with(|| RegionWindow {
                window: RssiWindow::new(capacity),
                gate: HysteresisGate::new(confirmations),
                last_beacon: None,
            });
        entry.window.push(rssi);
        entry.last_beacon = Some(beacon);
    }

    /// Classify the region from its current window. Empty windows are `Unknown`.
    #[must_use]
    pub fn classify(&self, region_id: &str) -> ProximityClassification {
        self.smoothed_rssi(region_id)
            .map_or(ProximityClassification::Unknown, |rssi| {
                self.classify_rssi(rssi)
            })
    }

    /// Classify a smoothed RSSI value.
    #[must_use]
    pub fn classify_rssi(&self, rssi: f64) -> ProximityClassification {
        ProximityClassification::from_tier(self.thresholds.tier(rssi), self.model.distance_m(rssi))
    }

    /// Classify the region and pass the tier through its hysteresis gate.
    ///
    /// Returns the classification when it should be published.
    pub fn observe(&mut self, region_id: &str) -> Option<ProximityClassification> {
        let classification = self.classify(region_id);
        let entry = self.regions.get_mut(region_id)?;
        entry
            .gate
            .offer(classification.tier())
            .then_some(classification)
    }

    /// Median RSSI of the region's window.
    #[must_use]
    pub fn smoothed_rssi(&self, region_id: &str) -> Option<f64> {
        self.regions.get(region_id)?.window.median()
    }

    /// Most recently recorded beacon in the region.
    #[must_use]
    pub fn last_beacon(&self, region_id: &str) -> Option<BeaconIdentity> {
        self.regions.get(region_id)?.last_beacon
    }

    /// Number of samples in the region's window.
    #[must_use]
    pub fn window_len(&self, region_id: &str) -> usize {
        self.regions.get(region_id).map_or(0, |r| r.window.len())
    }

    /// Drop the window and hysteresis state for a region.
    pub fn discard(&mut self, region_id: &str) {
        self.regions.remove(region_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn beacon() -> BeaconIdentity {
        BeaconIdentity::new(Uuid::nil(), 6, 9)
    }

    fn classifier_with(capacity: usize, confirmations: u8) -> Classifier {
        Classifier::new(&ClassifierConfig {
            window_capacity: capacity,
            confirmations_required: confirmations,
            ..ClassifierConfig::default()
        })
    }

    #[test]
    fn test_window_median_odd_and_even() {
        let mut window = RssiWindow::new(5);
        assert_eq!(window.median(), None);

        for rssi in [-45, -48, -47] {
            window.push(rssi);
        }
        assert_eq!(window.median(), Some(-47.0));

        window.push(-90);
        assert_eq!(window.median(), Some(-47.5));
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut window = RssiWindow::new(2);
        window.push(-40);
        window.push(-60);
        window.push(-80);
        assert_eq!(window.len(), 2);
        assert_eq!(window.median(), Some(-70.0));
    }

    #[test]
    fn test_median_resists_single_outlier() {
        let mut window = RssiWindow::new(5);
        for rssi in [-60, -61, -20, -62, -60] {
            window.push(rssi);
        }
        assert_eq!(window.median(), Some(-60.0));
    }

    #[test]
    fn test_tier_thresholds() {
        let thresholds = TierThresholds::default();
        assert_eq!(thresholds.tier(-30.0), ProximityTier::Immediate);
        assert_eq!(thresholds.tier(-50.0), ProximityTier::Immediate);
        assert_eq!(thresholds.tier(-50.5), ProximityTier::Near);
        assert_eq!(thresholds.tier(-75.0), ProximityTier::Near);
        assert_eq!(thresholds.tier(-75.5), ProximityTier::Far);
    }

    #[test]
    fn test_distance_is_one_meter_at_measured_power() {
        let model = PathLossModel::default();
        assert!((model.distance_m(-59.0) - 1.0).abs() < 1e-9);
        assert!((model.distance_m(-79.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_is_monotonic() {
        let classifier = classifier_with(5, 2);
        let mut previous = 0.0;
        for rssi in (-110..=-20).rev() {
            let distance = classifier
                .classify_rssi(f64::from(rssi))
                .estimated_distance()
                .unwrap();
            assert!(distance > previous, "distance must grow as rssi weakens");
            previous = distance;
        }
    }

    #[test]
    fn test_distance_continuous_across_thresholds() {
        let classifier = classifier_with(5, 2);
        for boundary in [-50.0, -75.0] {
            let above = classifier.classify_rssi(boundary).estimated_distance().unwrap();
            let below = classifier
                .classify_rssi(boundary - 1e-6)
                .estimated_distance()
                .unwrap();
            assert!((above - below).abs() < 1e-4);
        }
    }

    #[test]
    fn test_empty_region_is_unknown() {
        let classifier = classifier_with(5, 2);
        assert_eq!(classifier.classify("lobby"), ProximityClassification::Unknown);
    }

    #[test]
    fn test_gate_publishes_first_observation() {
        let mut gate = HysteresisGate::new(2);
        assert!(gate.offer(ProximityTier::Far));
        assert!(!gate.offer(ProximityTier::Far));
        assert_eq!(gate.published(), Some(ProximityTier::Far));
    }

    #[test]
    fn test_gate_requires_consecutive_confirmations() {
        let mut gate = HysteresisGate::new(2);
        gate.offer(ProximityTier::Far);

        assert!(!gate.offer(ProximityTier::Near));
        assert!(gate.offer(ProximityTier::Near));
        assert_eq!(gate.published(), Some(ProximityTier::Near));
    }

    #[test]
    fn test_gate_ignores_transient_flip() {
        let mut gate = HysteresisGate::new(2);
        gate.offer(ProximityTier::Far);

        assert!(!gate.offer(ProximityTier::Near));
        assert!(!gate.offer(ProximityTier::Far));
        assert!(!gate.offer(ProximityTier::Near));
        assert_eq!(gate.published(), Some(ProximityTier::Far));
    }

    #[test]
    fn test_gate_interrupted_candidate_restarts_count() {
        let mut gate = HysteresisGate::new(3);
        gate.offer(ProximityTier::Far);

        assert!(!gate.offer(ProximityTier::Near));
        assert!(!gate.offer(ProximityTier::Immediate));
        assert!(!gate.offer(ProximityTier::Near));
        assert!(!gate.offer(ProximityTier::Near));
        assert!(gate.offer(ProximityTier::Near));
    }

    #[test]
    fn test_observe_publishes_on_confirmed_change() {
        let mut classifier = classifier_with(1, 2);

        classifier.record("lobby", beacon(), -90);
        assert!(matches!(
            classifier.observe("lobby"),
            Some(ProximityClassification::Far { .. })
        ));

        classifier.record("lobby", beacon(), -60);
        assert_eq!(classifier.observe("lobby"), None);

        classifier.record("lobby", beacon(), -61);
        assert!(matches!(
            classifier.observe("lobby"),
            Some(ProximityClassification::Near { .. })
        ));
    }

    #[test]
    fn test_observe_unknown_region() {
        let mut classifier = classifier_with(5, 2);
        assert_eq!(classifier.observe("nowhere"), None);
    }

    #[test]
    fn test_discard_resets_region() {
        let mut classifier = classifier_with(5, 2);
        classifier.record("lobby", beacon(), -40);
        assert_eq!(classifier.window_len("lobby"), 1);
        assert_eq!(classifier.last_beacon("lobby"), Some(beacon()));

        classifier.discard("lobby");
        assert_eq!(classifier.window_len("lobby"), 0);
        assert_eq!(classifier.smoothed_rssi("lobby"), None);
        assert_eq!(classifier.classify("lobby"), ProximityClassification::Unknown);
    }
}
