//! Unified error types for the beacon core library.
//!
//! This module provides a unified error type [`BeaconError`] that covers all
//! failure modes of the engine. Each module also has its own specific error
//! type ([`IngestError`](crate::ingest::IngestError),
//! [`RegionError`](crate::types::RegionError),
//! [`ConfigError`](crate::config::ConfigError),
//! [`AdvertiseError`](crate::advertiser::AdvertiseError)) for internal use.
//!
//! None of these errors is fatal. Sample rejections are expected whenever the
//! sensor races a region exit; callers drop the sample and carry on.
//!
//! # Example
//!
//! ```rust
//! use beacon_core::error::{BeaconError, Result};
//!
//! fn require_ranging(ranging: bool, region_id: &str) -> Result<()> {
//!     if !ranging {
//!         return Err(BeaconError::UnknownRegion(region_id.to_string()));
//!     }
//!     Ok(())
//! }
//!
//! assert!(require_ranging(false, "com.pubnub.test").is_err());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// The unified error type for all beacon operations.
#[derive(Debug, Error)]
pub enum BeaconError {
    // =========================================================================
    // INGEST ERRORS
    // =========================================================================
    /// A sample arrived out of order beyond the clock skew tolerance.
    #[error("Stale sample: {0}")]
    StaleSample(String),

    /// A sample arrived for a region that is not ranging.
    #[error("Region '{0}' is not ranging. Start monitoring and wait for region entry.")]
    UnknownRegion(String),

    /// A sample carried a beacon outside its region.
    #[error("Beacon does not belong to region: {0}")]
    IdentityMismatch(String),

    /// A sample carried an implausible RSSI.
    #[error("Implausible RSSI {0} dBm")]
    InvalidRssi(i16),

    // =========================================================================
    // REGION ERRORS
    // =========================================================================
    /// A region definition was rejected.
    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    /// A region cannot be advertised.
    #[error("Cannot advertise: {0}")]
    AdvertisingUnavailable(String),

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration file exists but could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // PERSISTENCE ERRORS
    // =========================================================================
    /// The configuration could not be written back to disk.
    #[error("Persistence error: {0}")]
    PersistenceError(String),
}

/// A specialized [`Result`] type for beacon operations.
pub type Result<T> = std::result::Result<T, BeaconError>;

impl BeaconError {
    /// Returns `true` if this error is a sample rejection.
    #[inline]
    #[must_use]
    pub const fn is_ingest_error(&self) -> bool {
        matches!(
            self,
            Self::StaleSample(_)
                | Self::UnknownRegion(_)
                | Self::IdentityMismatch(_)
                | Self::InvalidRssi(_)
        )
    }

    /// Returns `true` if this error is related to region definitions.
    #[inline]
    #[must_use]
    pub const fn is_region_error(&self) -> bool {
        matches!(self, Self::InvalidRegion(_) | Self::AdvertisingUnavailable(_))
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_) | Self::ConfigParseError(_) | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if the caller can simply carry on.
    ///
    /// Sample rejections are expected under normal sensor callback races.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        self.is_ingest_error()
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input
            Self::InvalidRegion(_) => 400,

            // 404 Not Found
            Self::ConfigNotFound(_) => 404,

            // 409 Conflict - valid input that the current state refuses
            Self::UnknownRegion(_) | Self::StaleSample(_) | Self::AdvertisingUnavailable(_) => 409,

            // 422 Unprocessable Entity - semantic errors
            Self::IdentityMismatch(_)
            | Self::InvalidRssi(_)
            | Self::ConfigParseError(_)
            | Self::ConfigValidationError(_) => 422,

            // 500 Internal Server Error
            Self::PersistenceError(_) => 500,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::StaleSample(_) => "STALE_SAMPLE",
            Self::UnknownRegion(_) => "UNKNOWN_REGION",
            Self::IdentityMismatch(_) => "IDENTITY_MISMATCH",
            Self::InvalidRssi(_) => "INVALID_RSSI",
            Self::InvalidRegion(_) => "INVALID_REGION",
            Self::AdvertisingUnavailable(_) => "ADVERTISING_UNAVAILABLE",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::PersistenceError(_) => "PERSISTENCE_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::ingest::IngestError> for BeaconError {
    fn from(err: crate::ingest::IngestError) -> Self {
        use crate::ingest::IngestError;
        match err {
            IngestError::StaleSample { .. } => Self::StaleSample(err.to_string()),
            IngestError::UnknownRegion { region_id } => Self::UnknownRegion(region_id),
            IngestError::IdentityMismatch { .. } => Self::IdentityMismatch(err.to_string()),
            IngestError::InvalidRssi { rssi, .. } => Self::InvalidRssi(rssi),
        }
    }
}

impl From<crate::types::RegionError> for BeaconError {
    fn from(err: crate::types::RegionError) -> Self {
        Self::InvalidRegion(err.to_string())
    }
}

impl From<crate::advertiser::AdvertiseError> for BeaconError {
    fn from(err: crate::advertiser::AdvertiseError) -> Self {
        Self::AdvertisingUnavailable(err.to_string())
    }
}

impl From<crate::config::ConfigError> for BeaconError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::NotFound(path) => Self::ConfigNotFound(path.into()),
            ConfigError::WriteError { path, source } => {
                Self::PersistenceError(format!("Failed to write {path}: {source}"))
            }
            ConfigError::ParseError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::SerializeError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::ValidationError { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::ingest::IngestError;

    #[test]
    fn test_ingest_error_classification() {
        assert!(BeaconError::StaleSample("late".into()).is_ingest_error());
        assert!(BeaconError::UnknownRegion("lobby".into()).is_ingest_error());
        assert!(BeaconError::IdentityMismatch("x".into()).is_ingest_error());
        assert!(BeaconError::InvalidRssi(0).is_ingest_error());

        assert!(!BeaconError::InvalidRegion("x".into()).is_ingest_error());
    }

    #[test]
    fn test_config_error_classification() {
        assert!(BeaconError::ConfigNotFound(PathBuf::from("/test")).is_config_error());
        assert!(BeaconError::ConfigParseError("syntax error".into()).is_config_error());
        assert!(BeaconError::ConfigValidationError("invalid value".into()).is_config_error());

        assert!(!BeaconError::UnknownRegion("lobby".into()).is_config_error());
    }

    #[test]
    fn test_region_error_classification() {
        assert!(BeaconError::InvalidRegion("empty".into()).is_region_error());
        assert!(BeaconError::AdvertisingUnavailable("partial".into()).is_region_error());
        assert!(!BeaconError::PersistenceError("disk full".into()).is_region_error());
        assert!(!BeaconError::PersistenceError("disk full".into()).is_config_error());
    }

    #[test]
    fn test_from_config_write_error() {
        let err: BeaconError = ConfigError::WriteError {
            path: "/etc/beacon".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        }
        .into();
        assert!(matches!(&err, BeaconError::PersistenceError(msg) if msg.contains("/etc/beacon")));
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "PERSISTENCE_ERROR");
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(BeaconError::UnknownRegion("lobby".into()).is_recoverable());
        assert!(BeaconError::StaleSample("late".into()).is_recoverable());
        assert!(!BeaconError::ConfigParseError("bad".into()).is_recoverable());
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(BeaconError::InvalidRegion("x".into()).http_status_code(), 400);
        assert_eq!(
            BeaconError::ConfigNotFound(PathBuf::new()).http_status_code(),
            404
        );
        assert_eq!(BeaconError::UnknownRegion("x".into()).http_status_code(), 409);
        assert_eq!(BeaconError::InvalidRssi(0).http_status_code(), 422);
        assert_eq!(
            BeaconError::PersistenceError("error".into()).http_status_code(),
            500
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(BeaconError::StaleSample("x".into()).error_code(), "STALE_SAMPLE");
        assert_eq!(BeaconError::UnknownRegion("x".into()).error_code(), "UNKNOWN_REGION");
        assert_eq!(
            BeaconError::ConfigNotFound(PathBuf::new()).error_code(),
            "CONFIG_NOT_FOUND"
        );
    }

    #[test]
    fn test_from_ingest_error() {
        let err: BeaconError = IngestError::UnknownRegion {
            region_id: "lobby".into(),
        }
        .into();
        assert!(matches!(&err, BeaconError::UnknownRegion(id) if id == "lobby"));

        let err: BeaconError = IngestError::InvalidRssi {
            region_id: "lobby".into(),
            rssi: 0,
        }
        .into();
        assert!(matches!(err, BeaconError::InvalidRssi(0)));
    }

    #[test]
    fn test_from_config_error() {
        let err: BeaconError = ConfigError::MultipleValidationErrors(vec![
            ConfigError::ValidationError {
                field: "a".into(),
                message: "bad".into(),
            },
            ConfigError::ValidationError {
                field: "b".into(),
                message: "worse".into(),
            },
        ])
        .into();
        assert!(err.to_string().contains("a"));
        assert!(err.to_string().contains("; "));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_error_display_messages() {
        let err = BeaconError::UnknownRegion("com.pubnub.test".into());
        assert!(format!("{err}").contains("com.pubnub.test"));

        let err = BeaconError::InvalidRssi(0);
        assert!(format!("{err}").contains("0 dBm"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<BeaconError>();
        assert_sync::<BeaconError>();
    }
}
