//! The detection pipeline.
//!
//! `sensor -> Ingestor -> Classifier -> RegionTracker -> Publisher -> consumer`
//!
//! [`ProximityEngine`] exposes one entry point per sensor event. Every call is
//! a fast in-memory update; nothing blocks. Callers delivering events from
//! several threads must serialize access (for example behind a lock), which
//! keeps each classification reading a consistent window.

use chrono::Utc;
use tracing::debug;

use crate::classifier::Classifier;
use crate::collaborators::{ConsumerSink, RangingControl};
use crate::config::Config;
use crate::ingest::{IngestError, Ingestor};
use crate::publisher::Publisher;
use crate::tracker::{RangingCommand, RegionSnapshot, RegionTracker, Transition};
use crate::types::{
    ClassificationEvent, ProximityClassification, ProximityTier, RangingSample, Region,
    RegionTrackingState,
};

/// Beacon proximity correlation engine.
#[derive(Debug)]
pub struct ProximityEngine<R, S> {
    tracker: RegionTracker,
    ingestor: Ingestor,
    classifier: Classifier,
    publisher: Publisher<S>,
    ranging: R,
}

impl<R: RangingControl, S: ConsumerSink> ProximityEngine<R, S> {
    /// Create an engine from configuration and its two collaborators.
    pub fn new(config: &Config, ranging: R, sink: S) -> Self {
        Self {
            tracker: RegionTracker::new(),
            ingestor: Ingestor::new(&config.ingest),
            classifier: Classifier::new(&config.classifier),
            publisher: Publisher::new(sink),
            ranging,
        }
    }

    /// The sensor started monitoring `region`.
    pub fn start_monitoring(&mut self, region: Region) -> Transition {
        let transition = self.tracker.start_monitoring(region);
        self.apply(&transition);
        transition
    }

    /// The sensor detected the region's beacons.
    pub fn region_entry_detected(&mut self, region_id: &str) -> Transition {
        let transition = self.tracker.region_entry_detected(region_id);
        self.apply(&transition);
        transition
    }

    /// The sensor lost the region's beacons.
    ///
    /// The classifier window and the sample clock reference are discarded and
    /// `Unknown` is published.
    pub fn region_exit_detected(&mut self, region_id: &str) -> Transition {
        let transition = self.tracker.region_exit_detected(region_id);
        if transition.is_change() {
            self.classifier.discard(region_id);
            self.ingestor.forget(region_id);
            self.publisher.publish(ClassificationEvent {
                region_id: region_id.to_string(),
                classification: ProximityClassification::Unknown,
                beacon: None,
                smoothed_rssi: None,
                published_at: Utc::now(),
            });
        }
        self.apply(&transition);
        transition
    }

    /// Stop monitoring a region. All of its state is destroyed before this
    /// returns, so samples still in flight are rejected.
    pub fn stop_monitoring(&mut self, region_id: &str) -> Transition {
        let transition = self.tracker.stop_monitoring(region_id);
        self.teardown(region_id);
        self.apply(&transition);
        transition
    }

    /// The sensor reported a monitoring failure.
    ///
    /// The region is reset to `Unmonitored` and the consumer is told. The
    /// caller may start monitoring again.
    pub fn monitoring_did_fail(&mut self, region_id: &str, reason: &str) -> Transition {
        let transition = self.tracker.monitoring_did_fail(region_id, reason);
        self.teardown(region_id);
        self.apply(&transition);
        self.publisher.report_failure(region_id, reason);
        transition
    }

    /// Ingest a ranging sample and publish any confirmed classification change.
    ///
    /// Returns the published event, if the sample caused one.
    ///
    /// # Errors
    ///
    /// Returns an [`IngestError`] when the sample is dropped. Rejections leave
    /// all state untouched.
    pub fn ingest(
        &mut self,
        sample: &RangingSample,
    ) -> Result<Option<ClassificationEvent>, IngestError> {
        if let Err(err) = self
            .ingestor
            .ingest(sample, &self.tracker, &mut self.classifier)
        {
            debug!(region_id = %sample.region_id, error = %err, "Sample dropped");
            return Err(err);
        }

        let region_id = sample.region_id.as_str();
        let Some(classification) = self.classifier.observe(region_id) else {
            return Ok(None);
        };

        let event = ClassificationEvent {
            region_id: region_id.to_string(),
            classification,
            beacon: self.classifier.last_beacon(region_id),
            smoothed_rssi: self.classifier.smoothed_rssi(region_id),
            published_at: Utc::now(),
        };
        Ok(self.publisher.publish(event.clone()).then_some(event))
    }

    /// Current (unconfirmed) classification of a region.
    #[must_use]
    pub fn classify(&self, region_id: &str) -> ProximityClassification {
        self.classifier.classify(region_id)
    }

    /// Median RSSI currently held for a region.
    #[must_use]
    pub fn smoothed_rssi(&self, region_id: &str) -> Option<f64> {
        self.classifier.smoothed_rssi(region_id)
    }

    /// Tracking state of a region.
    #[must_use]
    pub fn state(&self, region_id: &str) -> RegionTrackingState {
        self.tracker.state(region_id)
    }

    /// Snapshot of a tracked region.
    #[must_use]
    pub fn region(&self, region_id: &str) -> Option<&RegionSnapshot> {
        self.tracker.snapshot(region_id)
    }

    /// All tracked regions.
    pub fn regions(&self) -> impl Iterator<Item = &RegionSnapshot> {
        self.tracker.regions()
    }

    /// The last published classification tier for a region.
    #[must_use]
    pub fn published_tier(&self, region_id: &str) -> Option<ProximityTier> {
        self.publisher.last_published(region_id)
    }

    /// The consumer sink.
    pub const fn sink(&self) -> &S {
        self.publisher.sink()
    }

    /// Mutable access to the consumer sink.
    pub fn sink_mut(&mut self) -> &mut S {
        self.publisher.sink_mut()
    }

    /// The ranging collaborator.
    pub const fn ranging(&self) -> &R {
        &self.ranging
    }

    fn teardown(&mut self, region_id: &str) {
        self.classifier.discard(region_id);
        self.ingestor.forget(region_id);
        self.publisher.forget(region_id);
    }

    fn apply(&mut self, transition: &Transition) {
        match &transition.command {
            Some(RangingCommand::Start(region)) => self.ranging.start_ranging(region),
            Some(RangingCommand::Stop(region)) => self.ranging.stop_ranging(region),
            None => {}
        }
    }
}
