//! Sample ingestion.
//!
//! Validates raw ranging samples before they reach the classifier window.
//! Rejections are expected under normal callback races (a sample arriving just
//! after a region exit, for instance) and are never fatal.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use tracing::debug;

use crate::classifier::Classifier;
use crate::config::IngestConfig;
use crate::tracker::RegionTracker;
use crate::types::{BeaconIdentity, RangingSample};

/// Reasons a ranging sample is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// The sample is older than the last accepted one beyond the skew tolerance.
    #[error("Stale sample for region '{region_id}': observed at {observed_at}, last accepted {last_accepted_at}")]
    StaleSample {
        /// Region the sample belongs to.
        region_id: String,
        /// When the rejected sample was observed.
        observed_at: DateTime<Utc>,
        /// When the last accepted sample was observed.
        last_accepted_at: DateTime<Utc>,
    },

    /// The region is not currently ranging.
    #[error("Region '{region_id}' is not ranging")]
    UnknownRegion {
        /// Region the sample claimed to belong to.
        region_id: String,
    },

    /// The beacon does not belong to the region.
    #[error("Beacon {beacon} does not match region '{region_id}'")]
    IdentityMismatch {
        /// Region the sample claimed to belong to.
        region_id: String,
        /// The observed beacon.
        beacon: BeaconIdentity,
    },

    /// The RSSI is outside the plausible range.
    #[error("Implausible RSSI {rssi} dBm for region '{region_id}'")]
    InvalidRssi {
        /// Region the sample belongs to.
        region_id: String,
        /// The rejected value.
        rssi: i16,
    },
}

impl IngestError {
    /// Region the rejected sample belonged to.
    #[must_use]
    pub fn region_id(&self) -> &str {
        match self {
            Self::StaleSample { region_id, .. }
            | Self::UnknownRegion { region_id }
            | Self::IdentityMismatch { region_id, .. }
            | Self::InvalidRssi { region_id, .. } => region_id,
        }
    }
}

/// Validates samples and forwards accepted ones to the classifier.
#[derive(Debug, Clone)]
pub struct Ingestor {
    tolerance: TimeDelta,
    min_rssi: i16,
    max_rssi: i16,
    last_accepted: HashMap<String, DateTime<Utc>>,
}

impl Ingestor {
    /// Create an ingestor from configuration.
    #[must_use]
    pub fn new(config: &IngestConfig) -> Self {
        let tolerance = i64::try_from(config.clock_skew_tolerance_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .unwrap_or_else(TimeDelta::zero);
        Self {
            tolerance,
            min_rssi: config.min_rssi,
            max_rssi: config.max_rssi,
            last_accepted: HashMap::new(),
        }
    }

    /// Validate `sample` against the tracker and, if accepted, record it.
    ///
    /// # Errors
    ///
    /// Returns an [`IngestError`] describing why the sample was dropped. No
    /// state changes on rejection.
    pub fn ingest(
        &mut self,
        sample: &RangingSample,
        tracker: &RegionTracker,
        classifier: &mut Classifier,
    ) -> Result<(), IngestError> {
        let region_id = sample.region_id.as_str();

        let Some(region) = tracker.ranging_region(region_id) else {
            return Err(IngestError::UnknownRegion {
                region_id: region_id.to_string(),
            });
        };

        if !(self.min_rssi..=self.max_rssi).contains(&sample.rssi) {
            return Err(IngestError::InvalidRssi {
                region_id: region_id.to_string(),
                rssi: sample.rssi,
            });
        }

        if !region.identity.matches(&sample.beacon) {
            return Err(IngestError::IdentityMismatch {
                region_id: region_id.to_string(),
                beacon: sample.beacon,
            });
        }

        if let Some(&last) = self.last_accepted.get(region_id) {
            if last.signed_duration_since(sample.observed_at) > self.tolerance {
                return Err(IngestError::StaleSample {
                    region_id: region_id.to_string(),
                    observed_at: sample.observed_at,
                    last_accepted_at: last,
                });
            }
        }

        let latest = self
            .last_accepted
            .entry(region_id.to_string())
            .or_insert(sample.observed_at);
        if sample.observed_at > *latest {
            *latest = sample.observed_at;
        }

        classifier.record(region_id, sample.beacon, sample.rssi);
        debug!(
            region_id = %region_id,
            beacon = %sample.beacon,
            rssi = sample.rssi,
            "Sample accepted"
        );
        Ok(())
    }

    /// Timestamp of the newest accepted sample for a region.
    #[must_use]
    pub fn last_accepted(&self, region_id: &str) -> Option<DateTime<Utc>> {
        self.last_accepted.get(region_id).copied()
    }

    /// Forget the clock reference for a region.
    pub fn forget(&mut self, region_id: &str) {
        self.last_accepted.remove(region_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use crate::types::{Region, RegionIdentity};
    use uuid::Uuid;

    const UUID: Uuid = uuid::uuid!("0CF052C2-97CA-407C-84F8-B62AAC4E9020");

    fn ranging_tracker() -> RegionTracker {
        let mut tracker = RegionTracker::new();
        tracker.start_monitoring(Region::new(RegionIdentity::any(UUID), "lobby").unwrap());
        tracker.region_entry_detected("lobby");
        tracker
    }

    fn sample(rssi: i16, observed_at: DateTime<Utc>) -> RangingSample {
        RangingSample {
            region_id: "lobby".to_string(),
            beacon: BeaconIdentity::new(UUID, 6, 9),
            rssi,
            observed_at,
        }
    }

    fn setup() -> (Ingestor, RegionTracker, Classifier) {
        (
            Ingestor::new(&IngestConfig::default()),
            ranging_tracker(),
            Classifier::new(&ClassifierConfig::default()),
        )
    }

    #[test]
    fn test_accepts_sample_for_ranging_region() {
        let (mut ingestor, tracker, mut classifier) = setup();
        let now = Utc::now();

        ingestor
            .ingest(&sample(-60, now), &tracker, &mut classifier)
            .unwrap();
        assert_eq!(classifier.window_len("lobby"), 1);
        assert_eq!(ingestor.last_accepted("lobby"), Some(now));
    }

    #[test]
    fn test_rejects_region_not_ranging() {
        let (mut ingestor, _, mut classifier) = setup();
        let tracker = RegionTracker::new();

        let err = ingestor
            .ingest(&sample(-60, Utc::now()), &tracker, &mut classifier)
            .unwrap_err();
        assert!(matches!(err, IngestError::UnknownRegion { .. }));
        assert_eq!(err.region_id(), "lobby");
        assert_eq!(classifier.window_len("lobby"), 0);
    }

    #[test]
    fn test_rejects_implausible_rssi() {
        let (mut ingestor, tracker, mut classifier) = setup();

        for rssi in [0, 5, -128] {
            let err = ingestor
                .ingest(&sample(rssi, Utc::now()), &tracker, &mut classifier)
                .unwrap_err();
            assert!(matches!(err, IngestError::InvalidRssi { .. }));
        }
        assert_eq!(classifier.window_len("lobby"), 0);
    }

    #[test]
    fn test_rejects_foreign_beacon() {
        let (mut ingestor, tracker, mut classifier) = setup();
        let mut foreign = sample(-60, Utc::now());
        foreign.beacon.proximity_uuid = Uuid::nil();

        let err = ingestor
            .ingest(&foreign, &tracker, &mut classifier)
            .unwrap_err();
        assert!(matches!(err, IngestError::IdentityMismatch { .. }));
    }

    #[test]
    fn test_stale_sample_rejected_beyond_tolerance() {
        let (mut ingestor, tracker, mut classifier) = setup();
        let now = Utc::now();

        ingestor
            .ingest(&sample(-60, now), &tracker, &mut classifier)
            .unwrap();

        let err = ingestor
            .ingest(
                &sample(-60, now - TimeDelta::milliseconds(501)),
                &tracker,
                &mut classifier,
            )
            .unwrap_err();
        assert!(matches!(err, IngestError::StaleSample { .. }));
        assert_eq!(classifier.window_len("lobby"), 1);
    }

    #[test]
    fn test_small_skew_is_tolerated_without_moving_reference() {
        let (mut ingestor, tracker, mut classifier) = setup();
        let now = Utc::now();

        ingestor
            .ingest(&sample(-60, now), &tracker, &mut classifier)
            .unwrap();
        ingestor
            .ingest(
                &sample(-61, now - TimeDelta::milliseconds(400)),
                &tracker,
                &mut classifier,
            )
            .unwrap();

        assert_eq!(ingestor.last_accepted("lobby"), Some(now));
        assert_eq!(classifier.window_len("lobby"), 2);
    }

    #[test]
    fn test_forget_clears_reference() {
        let (mut ingestor, tracker, mut classifier) = setup();
        let now = Utc::now();

        ingestor
            .ingest(&sample(-60, now), &tracker, &mut classifier)
            .unwrap();
        ingestor.forget("lobby");

        ingestor
            .ingest(
                &sample(-60, now - TimeDelta::seconds(10)),
                &tracker,
                &mut classifier,
            )
            .unwrap();
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let (mut ingestor, tracker, mut classifier) = setup();

        ingestor
            .ingest(
                &sample(-60, DateTime::<Utc>::MIN_UTC),
                &tracker,
                &mut classifier,
            )
            .unwrap();
        ingestor
            .ingest(
                &sample(-60, DateTime::<Utc>::MIN_UTC),
                &tracker,
                &mut classifier,
            )
            .unwrap();

        let now = Utc::now();
        ingestor
            .ingest(&sample(-61, now), &tracker, &mut classifier)
            .unwrap();
        assert_eq!(ingestor.last_accepted("lobby"), Some(now));
        assert_eq!(classifier.window_len("lobby"), 3);
    }

    #[test]
    fn test_far_future_reference_rejects_without_overflow() {
        let (mut ingestor, tracker, mut classifier) = setup();

        ingestor
            .ingest(
                &sample(-60, DateTime::<Utc>::MAX_UTC),
                &tracker,
                &mut classifier,
            )
            .unwrap();

        let err = ingestor
            .ingest(
                &sample(-60, DateTime::<Utc>::MIN_UTC),
                &tracker,
                &mut classifier,
            )
            .unwrap_err();
        assert!(matches!(err, IngestError::StaleSample { .. }));
        assert_eq!(classifier.window_len("lobby"), 1);
    }
}
