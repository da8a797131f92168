//! Ranging sample ingestion endpoint.
//!
//! The sensor bridge posts each ranging sample here. Accepted samples update
//! the region's window and may publish a new classification; rejected samples
//! are dropped with a 409 (state race) or 422 (bad data) and change nothing.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use beacon_core::{BeaconIdentity, ClassificationEvent, ProximityClassification, RangingSample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::{ApiResult, ErrorResponse};
use crate::state::SharedState;

/// Creates the samples router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", post(ingest_sample))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// One ranging sample.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "region_id": "com.pubnub.test",
    "proximity_uuid": "0cf052c2-97ca-407c-84f8-b62aac4e9020",
    "major": 6,
    "minor": 9,
    "rssi": -62,
    "observed_at": "2025-01-15T03:30:00Z"
}))]
pub struct SampleRequest {
    /// Region the sample was ranged for.
    #[schema(example = "com.pubnub.test")]
    pub region_id: String,

    /// Proximity UUID of the observed beacon.
    pub proximity_uuid: Uuid,

    /// Major value of the observed beacon.
    #[schema(example = 6)]
    pub major: u16,

    /// Minor value of the observed beacon.
    #[schema(example = 9)]
    pub minor: u16,

    /// Received signal strength in dBm.
    #[schema(example = json!(-62))]
    pub rssi: i16,

    /// When the sensor observed the sample. Defaults to now.
    #[serde(default)]
    #[schema(nullable, example = "2025-01-15T03:30:00Z")]
    pub observed_at: Option<DateTime<Utc>>,
}

impl SampleRequest {
    fn into_sample(self, now: DateTime<Utc>) -> RangingSample {
        RangingSample {
            region_id: self.region_id,
            beacon: BeaconIdentity::new(self.proximity_uuid, self.major, self.minor),
            rssi: self.rssi,
            observed_at: self.observed_at.unwrap_or(now),
        }
    }
}

/// Outcome of an accepted sample.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "accepted": true,
    "classification": { "tier": "near", "distance_m": 2.0 },
    "smoothed_rssi": -65.0,
    "published": null
}))]
pub struct SampleResponse {
    /// Always `true`; rejected samples answer with an error.
    pub accepted: bool,

    /// Classification of the window after this sample.
    pub classification: ProximityClassification,

    /// Median RSSI of the window after this sample.
    #[schema(nullable, example = json!(-65.0))]
    pub smoothed_rssi: Option<f64>,

    /// Event published to the consumer because of this sample, if any.
    #[schema(nullable)]
    pub published: Option<ClassificationEvent>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Ingest a ranging sample.
#[utoipa::path(
    post,
    path = "/api/samples",
    tag = "proximity",
    operation_id = "ingestSample",
    summary = "Ingest a ranging sample",
    description = "Validates a ranging sample and adds it to the region's smoothing \
        window. A classification is published to the consumer only once a tier change \
        has been confirmed by consecutive samples.",
    request_body = SampleRequest,
    responses(
        (status = 200, description = "Sample accepted", body = SampleResponse),
        (status = 409, description = "Region is not ranging, or the sample is stale", body = ErrorResponse),
        (status = 422, description = "Beacon outside the region, or implausible RSSI", body = ErrorResponse)
    )
)]
pub async fn ingest_sample(
    State(state): State<SharedState>,
    Json(request): Json<SampleRequest>,
) -> ApiResult<Json<SampleResponse>> {
    let sample = request.into_sample(Utc::now());

    let mut state_guard = state.write().await;
    let engine = &mut state_guard.engine;
    let published = engine.ingest(&sample)?;

    Ok(Json(SampleResponse {
        accepted: true,
        classification: engine.classify(&sample.region_id),
        smoothed_rssi: engine.smoothed_rssi(&sample.region_id),
        published,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sample_request_defaults_observed_at() {
        let json = r#"{
            "region_id": "lobby",
            "proximity_uuid": "0cf052c2-97ca-407c-84f8-b62aac4e9020",
            "major": 6,
            "minor": 9,
            "rssi": -62
        }"#;
        let request: SampleRequest = serde_json::from_str(json).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 3, 30, 0).unwrap();

        let sample = request.into_sample(now);
        assert_eq!(sample.observed_at, now);
        assert_eq!(sample.beacon.major, 6);
        assert_eq!(sample.rssi, -62);
    }

    #[test]
    fn test_sample_request_keeps_observed_at() {
        let json = r#"{
            "region_id": "lobby",
            "proximity_uuid": "0cf052c2-97ca-407c-84f8-b62aac4e9020",
            "major": 6,
            "minor": 9,
            "rssi": -62,
            "observed_at": "2024-06-01T12:00:00Z"
        }"#;
        let request: SampleRequest = serde_json::from_str(json).unwrap();

        let sample = request.into_sample(Utc::now());
        assert_eq!(sample.observed_at.to_rfc3339(), "2024-06-01T12:00:00+00:00");
    }
}
