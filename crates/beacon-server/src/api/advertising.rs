//! Advertising pass-through endpoints.
//!
//! Turns this host into an iBeacon. A transmit request stores the payload;
//! it is put on the air whenever the radio reports power on and taken off
//! again on power off.

use std::fmt::Write as _;

use axum::extract::State;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use beacon_core::{AdvertisingStatus, BeaconIdentity, PowerState, Region, RegionIdentity};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::{ApiResult, ErrorResponse};
use crate::state::{AppState, SharedState};

/// Creates the advertising router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_advertising))
        .route("/transmit", post(transmit))
        .route("/radio", put(set_radio_state))
        .route("/stop", post(stop_advertising))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Advertising state.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "beacon": {
        "proximity_uuid": "0cf052c2-97ca-407c-84f8-b62aac4e9020",
        "major": 6,
        "minor": 9
    },
    "identifier": "com.pubnub.test",
    "radio": "on",
    "advertising": true,
    "payload_hex": "4C0002150CF052C297CA407C84F8B62AAC4E902000060009C5",
    "transmissions": 1
}))]
pub struct AdvertisingResponse {
    /// Beacon requested for transmission.
    #[schema(nullable)]
    pub beacon: Option<BeaconIdentity>,

    /// Region identifier of that beacon.
    #[schema(nullable, example = "com.pubnub.test")]
    pub identifier: Option<String>,

    /// Last reported radio power state.
    pub radio: PowerState,

    /// Whether the payload is currently on the air.
    pub advertising: bool,

    /// Manufacturer-specific advertisement data, uppercase hex.
    #[schema(nullable)]
    pub payload_hex: Option<String>,

    /// Payload hand-overs to the radio since startup.
    #[schema(example = 1)]
    pub transmissions: u64,
}

impl AdvertisingResponse {
    fn new(status: AdvertisingStatus, transmissions: u64) -> Self {
        Self {
            beacon: status.beacon,
            identifier: status.identifier,
            radio: status.radio,
            advertising: status.advertising,
            payload_hex: status.payload.as_deref().map(to_hex),
            transmissions,
        }
    }
}

/// Request body for transmitting a beacon. Omitted fields use the configured beacon.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[schema(example = json!({
    "proximity_uuid": "0cf052c2-97ca-407c-84f8-b62aac4e9020",
    "major": 6,
    "minor": 9,
    "identifier": "com.pubnub.test",
    "measured_power_dbm": -59
}))]
#[serde(default)]
pub struct TransmitRequest {
    /// Proximity UUID to advertise.
    #[schema(nullable)]
    pub proximity_uuid: Option<Uuid>,

    /// Major value to advertise.
    #[schema(nullable)]
    pub major: Option<u16>,

    /// Minor value to advertise.
    #[schema(nullable)]
    pub minor: Option<u16>,

    /// Region identifier.
    #[schema(nullable)]
    pub identifier: Option<String>,

    /// Calibrated RSSI at one meter.
    #[schema(nullable, example = json!(-59))]
    pub measured_power_dbm: Option<i8>,
}

impl TransmitRequest {
    fn resolve(self, state: &AppState) -> ApiResult<(Region, i8)> {
        let defaults = &state.config.advertising;
        let beacon = BeaconIdentity::new(
            self.proximity_uuid.unwrap_or(defaults.proximity_uuid),
            self.major.unwrap_or(defaults.major),
            self.minor.unwrap_or(defaults.minor),
        );
        let identifier = self
            .identifier
            .unwrap_or_else(|| defaults.identifier.clone());
        let region = Region::new(RegionIdentity::exact(beacon), identifier)?;
        Ok((
            region,
            self.measured_power_dbm.unwrap_or(defaults.measured_power_dbm),
        ))
    }
}

/// Request body for reporting the radio power state.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({ "power": "on" }))]
pub struct RadioStateRequest {
    /// New radio power state.
    pub power: PowerState,
}

// ============================================================================
// Handlers
// ============================================================================

/// Get the advertising state.
#[utoipa::path(
    get,
    path = "/api/advertising",
    tag = "advertising",
    operation_id = "getAdvertising",
    summary = "Get advertising state",
    description = "Returns the requested beacon, the radio power state and whether \
        the payload is currently being transmitted.",
    responses(
        (status = 200, description = "Advertising state", body = AdvertisingResponse)
    )
)]
pub async fn get_advertising(State(state): State<SharedState>) -> Json<AdvertisingResponse> {
    let state_guard = state.read().await;
    let controller = &state_guard.advertising;
    Json(AdvertisingResponse::new(
        controller.status(),
        controller.advertiser().transmissions(),
    ))
}

/// Request transmission of a beacon.
#[utoipa::path(
    post,
    path = "/api/advertising/transmit",
    tag = "advertising",
    operation_id = "transmit",
    summary = "Advertise as an iBeacon",
    description = "Encodes the beacon as an iBeacon payload. It is transmitted \
        immediately if the radio is on, otherwise as soon as the radio reports power on. \
        Replaces any previous request.",
    request_body = TransmitRequest,
    responses(
        (status = 200, description = "Transmission requested", body = AdvertisingResponse),
        (status = 400, description = "Invalid region identifier", body = ErrorResponse)
    )
)]
pub async fn transmit(
    State(state): State<SharedState>,
    Json(request): Json<TransmitRequest>,
) -> ApiResult<Json<AdvertisingResponse>> {
    let mut state_guard = state.write().await;
    let (region, measured_power_dbm) = request.resolve(&state_guard)?;

    let controller = &mut state_guard.advertising;
    let status = controller.request_transmit(&region, Some(measured_power_dbm))?;
    Ok(Json(AdvertisingResponse::new(
        status,
        controller.advertiser().transmissions(),
    )))
}

/// Report the radio power state.
#[utoipa::path(
    put,
    path = "/api/advertising/radio",
    tag = "advertising",
    operation_id = "setRadioState",
    summary = "Report radio power state",
    description = "Powering on starts transmitting a pending payload; powering off \
        stops it. The request is kept across power cycles.",
    request_body = RadioStateRequest,
    responses(
        (status = 200, description = "Radio state applied", body = AdvertisingResponse)
    )
)]
pub async fn set_radio_state(
    State(state): State<SharedState>,
    Json(request): Json<RadioStateRequest>,
) -> Json<AdvertisingResponse> {
    let mut state_guard = state.write().await;
    let controller = &mut state_guard.advertising;
    let status = controller.radio_state_changed(request.power);
    Json(AdvertisingResponse::new(
        status,
        controller.advertiser().transmissions(),
    ))
}

/// Stop advertising.
#[utoipa::path(
    post,
    path = "/api/advertising/stop",
    tag = "advertising",
    operation_id = "stopAdvertising",
    summary = "Stop advertising",
    description = "Takes the payload off the air and drops the transmit request.",
    responses(
        (status = 200, description = "Advertising stopped", body = AdvertisingResponse)
    )
)]
pub async fn stop_advertising(State(state): State<SharedState>) -> Json<AdvertisingResponse> {
    let mut state_guard = state.write().await;
    let controller = &mut state_guard.advertising;
    let status = controller.stop();
    Json(AdvertisingResponse::new(
        status,
        controller.advertiser().transmissions(),
    ))
}

// ============================================================================
// Helpers
// ============================================================================

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
            let _ = write!(out, "{byte:02X}");
            out
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::Config;

    fn app() -> AppState {
        AppState::new(Config::default(), "/tmp/beacon.toml").unwrap()
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[0x4C, 0x00, 0x02, 0x15]), "4C000215");
        assert_eq!(to_hex(&[]), "");
    }

    #[test]
    fn test_transmit_request_falls_back_to_config() {
        let app = app();
        let (region, power) = TransmitRequest::default().resolve(&app).unwrap();

        assert_eq!(region.identifier, app.config.advertising.identifier);
        assert_eq!(region.identity.as_beacon(), Some(app.config.advertising.beacon()));
        assert_eq!(power, -59);
    }

    #[test]
    fn test_transmit_request_overrides() {
        let request: TransmitRequest =
            serde_json::from_str(r#"{"major": 1, "minor": 2, "identifier": "desk"}"#).unwrap();
        let (region, _) = request.resolve(&app()).unwrap();

        let beacon = region.identity.as_beacon().unwrap();
        assert_eq!((beacon.major, beacon.minor), (1, 2));
        assert_eq!(region.identifier, "desk");
    }

    #[test]
    fn test_transmit_waits_for_radio() {
        let state = app().into_shared();

        let request = TransmitRequest::default();
        let Json(pending) = tokio_test::block_on(transmit(State(state.clone()), Json(request)))
            .unwrap();
        assert!(!pending.advertising);
        assert_eq!(pending.transmissions, 0);
        assert!(pending.payload_hex.is_some());

        let radio = RadioStateRequest {
            power: PowerState::On,
        };
        let Json(live) = tokio_test::block_on(set_radio_state(State(state), Json(radio)));
        assert!(live.advertising);
        assert_eq!(live.transmissions, 1);
    }
}
