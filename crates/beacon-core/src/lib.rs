//! # beacon-core
//!
//! Core engine for the beacon proximity correlation system.
//!
//! This crate provides:
//! - Validation of raw ranging samples from an external beacon sensor
//! - Median-smoothed RSSI classification into proximity tiers with distance estimates
//! - Hysteresis so single noisy samples never flip a published tier
//! - A per-region monitoring state machine driving ranging subscriptions
//! - An iBeacon advertising pass-through for the transmit side
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`engine`] - The detection pipeline tying everything together
//! - [`ingest`] - Sample validation (stale, unknown region, foreign beacon, bad RSSI)
//! - [`classifier`] - Rolling windows, tier thresholds, path-loss model, hysteresis
//! - [`tracker`] - Region tracking state machine
//! - [`publisher`] - De-duplicated delivery to the consumer
//! - [`advertiser`] - iBeacon payloads and radio power handling
//! - [`collaborators`] - Sensor/consumer boundaries and in-memory implementations
//! - [`config`] - Configuration loading, saving, and validation
//! - [`error`] - Unified error types for the crate
//! - [`types`] - Shared domain types

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod advertiser;
pub mod classifier;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod publisher;
pub mod tracker;
pub mod types;

// Re-export primary types for convenience
pub use advertiser::{
    AdvertiseError, Advertiser, AdvertisingController, AdvertisingStatus, IBeaconPayload,
    PayloadEncoder, TransmissionLog,
};
pub use classifier::{Classifier, HysteresisGate, PathLossModel, RssiWindow, TierThresholds};
pub use collaborators::{ConsumerSink, EventLog, RangingControl, RangingLog};
pub use config::{
    default_config_path, AdvertisingConfig, ClassifierConfig, Config, ConfigError, ConfigResult,
    IngestConfig, MonitoringConfig, PublisherConfig,
};
pub use engine::ProximityEngine;
pub use error::{BeaconError, Result};
pub use ingest::{IngestError, Ingestor};
pub use publisher::Publisher;
pub use tracker::{RangingCommand, RegionSnapshot, RegionTracker, Transition};
pub use types::{
    is_valid_region_identifier, BeaconIdentity, ClassificationEvent, ConsumerEvent, ErrorKind,
    PowerState, ProximityClassification, ProximityTier, RangingSample, Region, RegionError,
    RegionIdentity, RegionTrackingState,
};
