//! Transmit side: iBeacon advertising pass-through.
//!
//! The controller holds nothing beyond the pending payload and whether the
//! radio is on. Advertising starts once a transmit has been requested and the
//! radio reports it is powered on, and stops when the radio powers off.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::types::{BeaconIdentity, PowerState, Region};

/// Bluetooth SIG company identifier for Apple, little-endian on the air.
pub const APPLE_COMPANY_ID: u16 = 0x004C;

/// iBeacon advertisement type.
pub const IBEACON_TYPE: u8 = 0x02;

/// Length of the iBeacon body following the type byte.
pub const IBEACON_BODY_LENGTH: u8 = 0x15;

/// Total manufacturer data length of an iBeacon payload.
pub const IBEACON_PAYLOAD_LENGTH: usize = 25;

/// Measured power used when none is configured.
pub const DEFAULT_MEASURED_POWER_DBM: i8 = -59;

/// External advertiser.
pub trait Advertiser {
    /// Hand `payload` to the radio in the given power state.
    fn transmit(&mut self, payload: &[u8], power: PowerState);
}

impl<T: Advertiser + ?Sized> Advertiser for &mut T {
    fn transmit(&mut self, payload: &[u8], power: PowerState) {
        (**self).transmit(payload, power);
    }
}

/// Builds advertisement payload bytes for a beacon identity.
pub trait PayloadEncoder {
    /// Encode `beacon` with its calibrated one-meter RSSI.
    fn encode(&self, beacon: &BeaconIdentity, measured_power_dbm: i8) -> Vec<u8>;
}

/// Apple iBeacon manufacturer-specific data.
///
/// ```text
/// 4C 00 | 02 | 15 | proximity UUID (16) | major (BE 2) | minor (BE 2) | power (1)
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct IBeaconPayload;

impl PayloadEncoder for IBeaconPayload {
    fn encode(&self, beacon: &BeaconIdentity, measured_power_dbm: i8) -> Vec<u8> {
        let mut payload = Vec::with_capacity(IBEACON_PAYLOAD_LENGTH);
        payload.extend_from_slice(&APPLE_COMPANY_ID.to_le_bytes());
        payload.push(IBEACON_TYPE);
        payload.push(IBEACON_BODY_LENGTH);
        payload.extend_from_slice(beacon.proximity_uuid.as_bytes());
        payload.extend_from_slice(&beacon.major.to_be_bytes());
        payload.extend_from_slice(&beacon.minor.to_be_bytes());
        payload.extend_from_slice(&measured_power_dbm.to_be_bytes());
        payload
    }
}

/// Errors raised by the advertising controller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdvertiseError {
    /// Advertising needs an exact major and minor.
    #[error("Region '{identifier}' has no exact major/minor to advertise")]
    IncompleteIdentity {
        /// Region identifier.
        identifier: String,
    },
}

/// Observable state of the advertising controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvertisingStatus {
    /// Beacon requested for transmission.
    pub beacon: Option<BeaconIdentity>,
    /// Region identifier of that beacon.
    pub identifier: Option<String>,
    /// Last reported radio state.
    pub radio: PowerState,
    /// Whether the radio is currently advertising the payload.
    pub advertising: bool,
    /// Encoded payload awaiting or being transmitted.
    pub payload: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
struct PendingAdvertisement {
    region: Region,
    beacon: BeaconIdentity,
    payload: Vec<u8>,
}

/// Drives an [`Advertiser`] from transmit requests and radio state changes.
#[derive(Debug)]
pub struct AdvertisingController<A, E = IBeaconPayload> {
    advertiser: A,
    encoder: E,
    pending: Option<PendingAdvertisement>,
    radio: PowerState,
    advertising: bool,
}

impl<A: Advertiser> AdvertisingController<A, IBeaconPayload> {
    /// Create a controller producing iBeacon payloads.
    pub const fn new(advertiser: A) -> Self {
        Self::with_encoder(advertiser, IBeaconPayload)
    }
}

impl<A: Advertiser, E: PayloadEncoder> AdvertisingController<A, E> {
    /// Create a controller with a custom payload encoder.
    pub const fn with_encoder(advertiser: A, encoder: E) -> Self {
        Self {
            advertiser,
            encoder,
            pending: None,
            radio: PowerState::Off,
            advertising: false,
        }
    }

    /// Request that `region` be advertised.
    ///
    /// The payload is sent immediately if the radio is on, otherwise as soon
    /// as it reports power on.
    ///
    /// # Errors
    ///
    /// Returns [`AdvertiseError::IncompleteIdentity`] if the region lacks an
    /// exact major/minor.
    pub fn request_transmit(
        &mut self,
        region: &Region,
        measured_power_dbm: Option<i8>,
    ) -> Result<AdvertisingStatus, AdvertiseError> {
        let beacon = region
            .identity
            .as_beacon()
            .ok_or_else(|| AdvertiseError::IncompleteIdentity {
                identifier: region.identifier.clone(),
            })?;
        let power = measured_power_dbm.unwrap_or(DEFAULT_MEASURED_POWER_DBM);
        let payload = self.encoder.encode(&beacon, power);

        info!(region_id = %region.identifier, beacon = %beacon, "Transmit requested");
        self.pending = Some(PendingAdvertisement {
            region: region.clone(),
            beacon,
            payload,
        });
        // A new payload replaces whatever is on the air
        self.advertising = false;
        self.sync();
        Ok(self.status())
    }

    /// The radio reported a power state change.
    pub fn radio_state_changed(&mut self, power: PowerState) -> AdvertisingStatus {
        debug!(power = ?power, "Radio state changed");
        self.radio = power;
        self.sync();
        self.status()
    }

    /// Stop advertising and drop the pending payload.
    pub fn stop(&mut self) -> AdvertisingStatus {
        if let Some(pending) = self.pending.take() {
            if self.advertising {
                info!(region_id = %pending.region.identifier, "Advertising stopped");
                self.advertiser.transmit(&pending.payload, PowerState::Off);
            }
        }
        self.advertising = false;
        self.status()
    }

    /// Current controller state.
    #[must_use]
    pub fn status(&self) -> AdvertisingStatus {
        AdvertisingStatus {
            beacon: self.pending.as_ref().map(|p| p.beacon),
            identifier: self.pending.as_ref().map(|p| p.region.identifier.clone()),
            radio: self.radio,
            advertising: self.advertising,
            payload: self.pending.as_ref().map(|p| p.payload.clone()),
        }
    }

    /// The external advertiser.
    pub const fn advertiser(&self) -> &A {
        &self.advertiser
    }

    fn sync(&mut self) {
        let Some(pending) = &self.pending else {
            return;
        };
        match (self.radio, self.advertising) {
            (PowerState::On, false) => {
                info!(region_id = %pending.region.identifier, "Advertising started");
                self.advertiser.transmit(&pending.payload, PowerState::On);
                self.advertising = true;
            }
            (PowerState::Off, true) => {
                info!(region_id = %pending.region.identifier, "Radio powered off, advertising stopped");
                self.advertiser.transmit(&pending.payload, PowerState::Off);
                self.advertising = false;
            }
            _ => {}
        }
    }
}

/// [`Advertiser`] that remembers what it was asked to transmit.
#[derive(Debug, Clone, Default)]
pub struct TransmissionLog {
    last: Option<(Vec<u8>, PowerState)>,
    transmissions: u64,
}

impl TransmissionLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The last payload and power state handed over.
    #[must_use]
    pub fn last(&self) -> Option<(&[u8], PowerState)> {
        self.last.as_ref().map(|(payload, power)| (payload.as_slice(), *power))
    }

    /// Number of transmissions.
    #[must_use]
    pub const fn transmissions(&self) -> u64 {
        self.transmissions
    }
}

impl Advertiser for TransmissionLog {
    fn transmit(&mut self, payload: &[u8], power: PowerState) {
        self.last = Some((payload.to_vec(), power));
        self.transmissions += 1;
    }
}
