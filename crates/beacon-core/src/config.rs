//! Engine configuration management.
//!
//! Handles loading, saving, and validating beacon configuration including:
//! - Sample ingestion limits (clock skew tolerance, plausible RSSI range)
//! - Classification thresholds, path-loss constants and hysteresis depth
//! - Consumer event buffering
//! - The beacon identity to advertise and the region to monitor
//!
//! Files are TOML. Any value can be overridden from the environment with the
//! `BEACON__` prefix, e.g. `BEACON__CLASSIFIER__WINDOW_CAPACITY=7`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::{uuid, Uuid};

use crate::types::{is_valid_region_identifier, BeaconIdentity, Region, RegionIdentity};

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "BEACON";

/// Proximity UUID used by the demo beacon.
pub const DEFAULT_PROXIMITY_UUID: Uuid = uuid!("0CF052C2-97CA-407C-84F8-B62AAC4E9020");

/// Region identifier used by the demo beacon.
pub const DEFAULT_REGION_IDENTIFIER: &str = "com.pubnub.test";

/// Largest accepted clock skew tolerance.
pub const MAX_CLOCK_SKEW_TOLERANCE_MS: u64 = 60_000;

/// Errors raised while loading, saving or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// The configuration file could not be written.
    #[error("Failed to write {path}: {source}")]
    WriteError {
        /// File path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration sources could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// The configuration could not be serialized.
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A single value is invalid.
    #[error("Invalid value for '{field}': {message}")]
    ValidationError {
        /// Dotted field path.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Several values are invalid.
    #[error("{} configuration values are invalid", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Sample ingestion settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct IngestConfig {
    /// How far (ms) a sample may precede the last accepted one before it is stale.
    pub clock_skew_tolerance_ms: u64,

    /// Weakest plausible RSSI in dBm.
    pub min_rssi: i16,

    /// Strongest plausible RSSI in dBm. Zero means "no reading" on most platforms.
    pub max_rssi: i16,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            clock_skew_tolerance_ms: 500,
            min_rssi: -127,
            max_rssi: -1,
        }
    }
}

/// Classification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Number of recent RSSI values kept per region.
    pub window_capacity: usize,

    /// Smoothed RSSI at or above this is `Immediate`.
    pub immediate_threshold_dbm: i16,

    /// Smoothed RSSI at or above this (and below immediate) is `Near`.
    pub near_threshold_dbm: i16,

    /// Expected RSSI at one meter.
    pub measured_power_dbm: i16,

    /// Path-loss exponent (2.0 in free space).
    pub path_loss_exponent: f64,

    /// Consecutive classifications needed before a tier change is published.
    pub confirmations_required: u8,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            window_capacity: 5,
            immediate_threshold_dbm: -50,
            near_threshold_dbm: -75,
            measured_power_dbm: -59,
            path_loss_exponent: 2.0,
            confirmations_required: 2,
        }
    }
}

/// Consumer event settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct PublisherConfig {
    /// Events retained for consumers that poll.
    pub event_buffer_capacity: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            event_buffer_capacity: crate::collaborators::DEFAULT_EVENT_LOG_CAPACITY,
        }
    }
}

/// The beacon this device advertises as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct AdvertisingConfig {
    /// Proximity UUID to advertise.
    pub proximity_uuid: Uuid,

    /// Major value to advertise.
    pub major: u16,

    /// Minor value to advertise.
    pub minor: u16,

    /// Region identifier of the advertised beacon.
    pub identifier: String,

    /// Calibrated RSSI at one meter, embedded in the payload.
    pub measured_power_dbm: i8,
}

impl Default for AdvertisingConfig {
    fn default() -> Self {
        Self {
            proximity_uuid: DEFAULT_PROXIMITY_UUID,
            major: 6,
            minor: 9,
            identifier: DEFAULT_REGION_IDENTIFIER.to_string(),
            measured_power_dbm: -59,
        }
    }
}

impl AdvertisingConfig {
    /// The advertised beacon identity.
    #[must_use]
    pub const fn beacon(&self) -> BeaconIdentity {
        BeaconIdentity::new(self.proximity_uuid, self.major, self.minor)
    }

    /// The advertised region.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is invalid.
    pub fn region(&self) -> ConfigResult<Region> {
        Region::new(RegionIdentity::exact(self.beacon()), self.identifier.clone())
            .map_err(|e| invalid("advertising.identifier", e.to_string()))
    }
}

/// The region monitored at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Proximity UUID to monitor.
    pub proximity_uuid: Uuid,

    /// Major value to match, or any.
    pub major: Option<u16>,

    /// Minor value to match, or any.
    pub minor: Option<u16>,

    /// Region identifier.
    pub identifier: String,

    /// Whether to start monitoring this region at startup.
    pub auto_start: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            proximity_uuid: DEFAULT_PROXIMITY_UUID,
            major: None,
            minor: None,
            identifier: DEFAULT_REGION_IDENTIFIER.to_string(),
            auto_start: true,
        }
    }
}

impl MonitoringConfig {
    /// The monitored region.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity or identifier is invalid.
    pub fn region(&self) -> ConfigResult<Region> {
        let identity = RegionIdentity::partial(self.proximity_uuid, self.major, self.minor)
            .map_err(|e| invalid("monitoring.minor", e.to_string()))?;
        Region::new(identity, self.identifier.clone())
            .map_err(|e| invalid("monitoring.identifier", e.to_string()))
    }
}

// ============================================================================
// Root
// ============================================================================

/// Main engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Config {
    /// Sample ingestion settings.
    pub ingest: IngestConfig,

    /// Classification settings.
    pub classifier: ClassifierConfig,

    /// Consumer event settings.
    pub publisher: PublisherConfig,

    /// Advertised beacon.
    pub advertising: AdvertisingConfig,

    /// Region monitored at startup.
    pub monitoring: MonitoringConfig,
}

impl Config {
    /// Load configuration from `path`, layered with `BEACON__*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file is missing, a parse error
    /// if the sources are malformed, or validation errors.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed or validated.
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        match Self::load(path) {
            Err(ConfigError::NotFound(path)) => {
                tracing::info!(path = %path, "No configuration file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Save configuration to `path` as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized or written.
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::WriteError {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::WriteError {
            path: path.display().to_string(),
            source,
        })
    }

    /// Validate every section, collecting all problems.
    ///
    /// # Errors
    ///
    /// Returns the single validation error, or
    /// [`ConfigError::MultipleValidationErrors`] when there are several.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        let ingest = &self.ingest;
        if ingest.clock_skew_tolerance_ms > MAX_CLOCK_SKEW_TOLERANCE_MS {
            errors.push(invalid(
                "ingest.clock_skew_tolerance_ms",
                format!("must be at most {MAX_CLOCK_SKEW_TOLERANCE_MS}"),
            ));
        }
        if ingest.min_rssi > ingest.max_rssi {
            errors.push(invalid("ingest.min_rssi", "must not exceed ingest.max_rssi"));
        }

        let classifier = &self.classifier;
        if classifier.window_capacity == 0 {
            errors.push(invalid("classifier.window_capacity", "must be at least 1"));
        }
        if classifier.immediate_threshold_dbm <= classifier.near_threshold_dbm {
            errors.push(invalid(
                "classifier.immediate_threshold_dbm",
                "must be greater than classifier.near_threshold_dbm",
            ));
        }
        if !(classifier.path_loss_exponent.is_finite() && classifier.path_loss_exponent > 0.0) {
            errors.push(invalid(
                "classifier.path_loss_exponent",
                "must be a positive number",
            ));
        }
        if classifier.confirmations_required == 0 {
            errors.push(invalid(
                "classifier.confirmations_required",
                "must be at least 1",
            ));
        }

        if self.publisher.event_buffer_capacity == 0 {
            errors.push(invalid("publisher.event_buffer_capacity", "must be at least 1"));
        }

        if !is_valid_region_identifier(&self.advertising.identifier) {
            errors.push(invalid(
                "advertising.identifier",
                format!("'{}' is not a valid region identifier", self.advertising.identifier),
            ));
        }
        if let Err(e) = self.monitoring.region() {
            errors.push(e);
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }
}

/// Returns the default configuration file path.
///
/// On Linux: `/etc/beacon/config.toml`.
/// Elsewhere: the platform config directory, e.g. `~/.config/beacon/config.toml`.
#[must_use]
pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/etc/beacon/config.toml")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "beacon").map_or_else(
            || PathBuf::from("./config.toml"),
            |dirs| dirs.config_dir().join("config.toml"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.classifier.window_capacity, 5);
        assert_eq!(config.advertising.identifier, "com.pubnub.test");
        assert_eq!(config.advertising.major, 6);
        assert_eq!(config.advertising.minor, 9);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.classifier.window_capacity = 7;
        config.monitoring.major = Some(6);
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.classifier.window_capacity, 7);
        assert_eq!(loaded.monitoring.major, Some(6));
        assert_eq!(loaded.advertising.proximity_uuid, DEFAULT_PROXIMITY_UUID);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[classifier]\nconfirmations_required = 3\n").unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.classifier.confirmations_required, 3);
        assert_eq!(loaded.classifier.immediate_threshold_dbm, -50);
        assert_eq!(loaded.ingest, IngestConfig::default());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        assert!(matches!(Config::load(&path), Err(ConfigError::NotFound(_))));
        assert_eq!(Config::load_or_default(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[classifier]\nwindow_capacity = 0\n").unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::ValidationError { field, .. }) if field == "classifier.window_capacity"
        ));
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = Config::default();
        config.classifier.immediate_threshold_dbm = -80;
        config.classifier.path_loss_exponent = 0.0;
        config.monitoring.minor = Some(9);

        match config.validate() {
            Err(ConfigError::MultipleValidationErrors(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected multiple errors, got {other:?}"),
        }
    }

    #[test]
    fn test_regions_from_config() {
        let config = Config::default();
        let advertised = config.advertising.region().unwrap();
        assert_eq!(advertised.identity.as_beacon(), Some(config.advertising.beacon()));

        let monitored = config.monitoring.region().unwrap();
        assert_eq!(monitored.identity.major, None);
        assert!(monitored.identity.matches(&config.advertising.beacon()));
    }

    #[test]
    fn test_default_config_path_is_toml() {
        let path = default_config_path();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("toml"));
    }
}
