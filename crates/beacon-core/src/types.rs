//! Shared domain types.
//!
//! Beacon identities, regions, ranging samples and the classification values
//! that flow from the sensor side of the engine to its consumers.

use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Maximum length of a region identifier.
pub const MAX_REGION_IDENTIFIER_LENGTH: usize = 128;

static REGION_IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    // Reverse-DNS style identifiers such as "com.pubnub.test"
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("region identifier regex is valid")
});

/// Errors raised while constructing regions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegionError {
    /// The region identifier was empty.
    #[error("Region identifier cannot be empty")]
    EmptyIdentifier,

    /// The region identifier is longer than allowed.
    #[error("Region identifier exceeds maximum length of {max} characters (got {actual})")]
    IdentifierTooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length provided.
        actual: usize,
    },

    /// The region identifier contains unsupported characters.
    #[error("Invalid region identifier: '{0}'. Use letters, digits, '.', '_' or '-'.")]
    InvalidIdentifier(String),

    /// A minor value was given without a major value.
    #[error("A minor value requires a major value")]
    MinorWithoutMajor,
}

/// Returns `true` if `identifier` is usable as a region identifier.
#[must_use]
pub fn is_valid_region_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier.len() <= MAX_REGION_IDENTIFIER_LENGTH
        && REGION_IDENTIFIER_RE.is_match(identifier)
}

// ============================================================================
// Identities and regions
// ============================================================================

/// A specific beacon instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "proximity_uuid": "0cf052c2-97ca-407c-84f8-b62aac4e9020",
    "major": 6,
    "minor": 9
}))]
pub struct BeaconIdentity {
    /// 128-bit proximity UUID shared by a fleet of beacons.
    pub proximity_uuid: Uuid,

    /// Major group value.
    pub major: u16,

    /// Minor value within the major group.
    pub minor: u16,
}

impl BeaconIdentity {
    /// Create a beacon identity.
    #[must_use]
    pub const fn new(proximity_uuid: Uuid, major: u16, minor: u16) -> Self {
        Self {
            proximity_uuid,
            major,
            minor,
        }
    }
}

impl fmt::Display for BeaconIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.proximity_uuid.hyphenated().to_string().to_uppercase(),
            self.major,
            self.minor
        )
    }
}

/// The identity part of a region. Absent major/minor values match any beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct RegionIdentity {
    /// Proximity UUID every matching beacon must carry.
    pub proximity_uuid: Uuid,

    /// Major value, or `None` to match any.
    #[serde(default)]
    pub major: Option<u16>,

    /// Minor value, or `None` to match any.
    #[serde(default)]
    pub minor: Option<u16>,
}

impl RegionIdentity {
    /// Identity matching every beacon with the given UUID.
    #[must_use]
    pub const fn any(proximity_uuid: Uuid) -> Self {
        Self {
            proximity_uuid,
            major: None,
            minor: None,
        }
    }

    /// Identity matching exactly one beacon.
    #[must_use]
    pub const fn exact(beacon: BeaconIdentity) -> Self {
        Self {
            proximity_uuid: beacon.proximity_uuid,
            major: Some(beacon.major),
            minor: Some(beacon.minor),
        }
    }

    /// Build a partial identity.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::MinorWithoutMajor`] if `minor` is set but `major` is not.
    pub fn partial(
        proximity_uuid: Uuid,
        major: Option<u16>,
        minor: Option<u16>,
    ) -> Result<Self, RegionError> {
        if major.is_none() && minor.is_some() {
            return Err(RegionError::MinorWithoutMajor);
        }
        Ok(Self {
            proximity_uuid,
            major,
            minor,
        })
    }

    /// Returns `true` if `beacon` falls inside this identity.
    #[must_use]
    pub fn matches(&self, beacon: &BeaconIdentity) -> bool {
        self.proximity_uuid == beacon.proximity_uuid
            && self.major.map_or(true, |major| major == beacon.major)
            && self.minor.map_or(true, |minor| minor == beacon.minor)
    }

    /// The fully-specified beacon identity, if both major and minor are set.
    #[must_use]
    pub const fn as_beacon(&self) -> Option<BeaconIdentity> {
        match (self.major, self.minor) {
            (Some(major), Some(minor)) => Some(BeaconIdentity::new(self.proximity_uuid, major, minor)),
            _ => None,
        }
    }
}

/// A monitored or advertised region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "identifier": "com.pubnub.test",
    "identity": {
        "proximity_uuid": "0cf052c2-97ca-407c-84f8-b62aac4e9020",
        "major": null,
        "minor": null
    }
}))]
pub struct Region {
    /// Beacon identity constraint.
    pub identity: RegionIdentity,

    /// Caller-chosen identifier, unique per tracked region.
    pub identifier: String,
}

impl Region {
    /// Create a region after validating its identifier.
    ///
    /// # Errors
    ///
    /// Returns a [`RegionError`] if the identifier is empty, too long or malformed.
    pub fn new(identity: RegionIdentity, identifier: impl Into<String>) -> Result<Self, RegionError> {
        let identifier = identifier.into();
        validate_identifier(&identifier)?;
        Ok(Self {
            identity,
            identifier,
        })
    }
}

fn validate_identifier(identifier: &str) -> Result<(), RegionError> {
    if identifier.is_empty() {
        return Err(RegionError::EmptyIdentifier);
    }
    if identifier.len() > MAX_REGION_IDENTIFIER_LENGTH {
        return Err(RegionError::IdentifierTooLong {
            max: MAX_REGION_IDENTIFIER_LENGTH,
            actual: identifier.len(),
        });
    }
    if !REGION_IDENTIFIER_RE.is_match(identifier) {
        return Err(RegionError::InvalidIdentifier(identifier.to_string()));
    }
    Ok(())
}

// ============================================================================
// Samples and classifications
// ============================================================================

/// A raw ranging observation delivered by the sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RangingSample {
    /// Identifier of the region the sample was ranged in.
    pub region_id: String,

    /// The beacon that was observed.
    pub beacon: BeaconIdentity,

    /// Received signal strength in dBm.
    pub rssi: i16,

    /// When the sensor observed the beacon.
    pub observed_at: DateTime<Utc>,
}

/// Proximity tier without a distance estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProximityTier {
    /// No usable signal.
    Unknown,
    /// Within arm's reach.
    Immediate,
    /// A few meters away.
    Near,
    /// Detectable but distant.
    Far,
}

impl fmt::Display for ProximityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unknown => "unknown",
            Self::Immediate => "immediate",
            Self::Near => "near",
            Self::Far => "far",
        };
        f.write_str(label)
    }
}

/// A proximity classification. `Unknown` never carries a distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum ProximityClassification {
    /// No usable signal.
    Unknown,
    /// Within arm's reach.
    Immediate {
        /// Estimated distance in meters.
        distance_m: f64,
    },
    /// A few meters away.
    Near {
        /// Estimated distance in meters.
        distance_m: f64,
    },
    /// Detectable but distant.
    Far {
        /// Estimated distance in meters.
        distance_m: f64,
    },
}

impl ProximityClassification {
    /// The tier of this classification.
    #[must_use]
    pub const fn tier(&self) -> ProximityTier {
        match self {
            Self::Unknown => ProximityTier::Unknown,
            Self::Immediate { .. } => ProximityTier::Immediate,
            Self::Near { .. } => ProximityTier::Near,
            Self::Far { .. } => ProximityTier::Far,
        }
    }

    /// Estimated distance in meters, absent for `Unknown`.
    #[must_use]
    pub fn estimated_distance(&self) -> Option<f64> {
        match self {
            Self::Unknown => None,
            Self::Immediate { distance_m } | Self::Near { distance_m } | Self::Far { distance_m } => {
                Some(*distance_m)
            }
        }
    }

    /// Build a classification from a tier and a distance.
    ///
    /// The distance is dropped for [`ProximityTier::Unknown`].
    #[must_use]
    pub fn from_tier(tier: ProximityTier, distance_m: f64) -> Self {
        match tier {
            ProximityTier::Unknown => Self::Unknown,
            ProximityTier::Immediate => Self::Immediate { distance_m },
            ProximityTier::Near => Self::Near { distance_m },
            ProximityTier::Far => Self::Far { distance_m },
        }
    }
}

/// Per-region tracking state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RegionTrackingState {
    /// Not tracked.
    Unmonitored,
    /// Monitoring started, beacon not yet detected.
    Entered,
    /// Inside the region, samples accepted.
    Ranging,
    /// Left the region, monitoring still active.
    Exited,
}

impl fmt::Display for RegionTrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unmonitored => "unmonitored",
            Self::Entered => "entered",
            Self::Ranging => "ranging",
            Self::Exited => "exited",
        };
        f.write_str(label)
    }
}

// ============================================================================
// Consumer events
// ============================================================================

/// Consumer-facing error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The sensor reported that monitoring a region failed.
    MonitoringFailed,
}

/// A confirmed classification for a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClassificationEvent {
    /// Region the classification belongs to.
    pub region_id: String,

    /// The confirmed classification.
    pub classification: ProximityClassification,

    /// Most recently observed beacon in the region, if any.
    pub beacon: Option<BeaconIdentity>,

    /// Smoothed signal strength the classification was derived from.
    pub smoothed_rssi: Option<f64>,

    /// When the event was published.
    pub published_at: DateTime<Utc>,
}

/// Everything the engine delivers to its consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsumerEvent {
    /// A classification change.
    Classification(ClassificationEvent),

    /// Monitoring failed and the region was reset.
    MonitoringFailed {
        /// Always [`ErrorKind::MonitoringFailed`].
        kind: ErrorKind,
        /// Region that failed.
        region_id: String,
        /// Reason reported by the sensor.
        reason: String,
        /// When the failure was reported.
        failed_at: DateTime<Utc>,
    },
}

impl ConsumerEvent {
    /// Region this event concerns.
    #[must_use]
    pub fn region_id(&self) -> &str {
        match self {
            Self::Classification(event) => &event.region_id,
            Self::MonitoringFailed { region_id, .. } => region_id,
        }
    }
}

/// Radio power state on the transmit side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    /// Advertising.
    On,
    /// Silent.
    Off,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_uuid() -> Uuid {
        Uuid::parse_str("0CF052C2-97CA-407C-84F8-B62AAC4E9020").unwrap()
    }

    #[test]
    fn test_partial_identity_matches_any_major_minor() {
        let identity = RegionIdentity::any(test_uuid());
        assert!(identity.matches(&BeaconIdentity::new(test_uuid(), 6, 9)));
        assert!(identity.matches(&BeaconIdentity::new(test_uuid(), 1, 2)));
        assert!(!identity.matches(&BeaconIdentity::new(Uuid::nil(), 6, 9)));
    }

    #[test]
    fn test_exact_identity_matches_only_itself() {
        let beacon = BeaconIdentity::new(test_uuid(), 6, 9);
        let identity = RegionIdentity::exact(beacon);
        assert!(identity.matches(&beacon));
        assert!(!identity.matches(&BeaconIdentity::new(test_uuid(), 6, 10)));
        assert_eq!(identity.as_beacon(), Some(beacon));
    }

    #[test]
    fn test_minor_without_major_rejected() {
        assert_eq!(
            RegionIdentity::partial(test_uuid(), None, Some(9)),
            Err(RegionError::MinorWithoutMajor)
        );
        let identity = RegionIdentity::partial(test_uuid(), Some(6), None).unwrap();
        assert!(identity.matches(&BeaconIdentity::new(test_uuid(), 6, 100)));
        assert!(identity.as_beacon().is_none());
    }

    #[test]
    fn test_region_identifier_validation() {
        let identity = RegionIdentity::any(test_uuid());
        assert!(Region::new(identity, "com.pubnub.test").is_ok());
        assert_eq!(Region::new(identity, ""), Err(RegionError::EmptyIdentifier));
        assert!(matches!(
            Region::new(identity, "has spaces"),
            Err(RegionError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            Region::new(identity, "a".repeat(MAX_REGION_IDENTIFIER_LENGTH + 1)),
            Err(RegionError::IdentifierTooLong { .. })
        ));
        assert!(is_valid_region_identifier("lobby-1"));
        assert!(!is_valid_region_identifier(".hidden"));
    }

    #[test]
    fn test_unknown_carries_no_distance() {
        let unknown = ProximityClassification::from_tier(ProximityTier::Unknown, 3.0);
        assert_eq!(unknown, ProximityClassification::Unknown);
        assert_eq!(unknown.estimated_distance(), None);

        let near = ProximityClassification::from_tier(ProximityTier::Near, 3.0);
        assert_eq!(near.tier(), ProximityTier::Near);
        assert_eq!(near.estimated_distance(), Some(3.0));
    }

    #[test]
    fn test_beacon_identity_display() {
        let beacon = BeaconIdentity::new(test_uuid(), 6, 9);
        assert_eq!(
            beacon.to_string(),
            "0CF052C2-97CA-407C-84F8-B62AAC4E9020/6/9"
        );
    }

    #[test]
    fn test_classification_serialization() {
        let json = serde_json::to_string(&ProximityClassification::Near { distance_m: 2.5 }).unwrap();
        assert!(json.contains("\"tier\":\"near\""));
        assert!(json.contains("\"distance_m\":2.5"));

        let json = serde_json::to_string(&ProximityClassification::Unknown).unwrap();
        assert_eq!(json, r#"{"tier":"unknown"}"#);
    }
}
