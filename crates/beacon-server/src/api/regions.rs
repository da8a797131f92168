//! Region monitoring API endpoints.
//!
//! These endpoints stand in for the platform location sensor: a bridge process
//! (or an operator) reports monitoring starts, region entries and exits, and
//! monitoring failures here. Each call drives the region tracking state
//! machine and answers with the resulting transition.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use beacon_core::{
    ProximityClassification, ProximityTier, RangingCommand, Region, RegionIdentity,
    RegionSnapshot, RegionTrackingState, Transition,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::state::{Engine, SharedState};

/// Creates the regions router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_regions).post(start_monitoring))
        .route("/{id}", get(get_region).delete(stop_monitoring))
        .route("/{id}/enter", post(region_entered))
        .route("/{id}/exit", post(region_exited))
        .route("/{id}/fail", post(monitoring_failed))
        .route("/{id}/classification", get(get_classification))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// A monitored region and its tracking state.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "identifier": "com.pubnub.test",
    "proximity_uuid": "0cf052c2-97ca-407c-84f8-b62aac4e9020",
    "major": null,
    "minor": null,
    "state": "ranging",
    "since": "2025-01-15T03:30:00Z",
    "published_tier": "near"
}))]
pub struct RegionResponse {
    /// Region identifier.
    #[schema(example = "com.pubnub.test")]
    pub identifier: String,

    /// Proximity UUID the region matches.
    pub proximity_uuid: Uuid,

    /// Major value the region matches, or any.
    #[schema(nullable)]
    pub major: Option<u16>,

    /// Minor value the region matches, or any.
    #[schema(nullable)]
    pub minor: Option<u16>,

    /// Current tracking state.
    pub state: RegionTrackingState,

    /// UTC timestamp when the region entered its current state.
    #[schema(example = "2025-01-15T03:30:00Z")]
    pub since: String,

    /// Last tier published to the consumer.
    #[schema(nullable)]
    pub published_tier: Option<ProximityTier>,
}

impl RegionResponse {
    fn from_snapshot(snapshot: &RegionSnapshot, engine: &Engine) -> Self {
        let identity = snapshot.region.identity;
        Self {
            identifier: snapshot.region.identifier.clone(),
            proximity_uuid: identity.proximity_uuid,
            major: identity.major,
            minor: identity.minor,
            state: snapshot.state,
            since: snapshot.since.to_rfc3339(),
            published_tier: engine.published_tier(&snapshot.region.identifier),
        }
    }
}

/// All monitored regions.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegionsResponse {
    /// Monitored regions ordered by identifier.
    pub regions: Vec<RegionResponse>,

    /// Number of monitored regions.
    #[schema(example = 1)]
    pub total: usize,
}

/// Request body for starting to monitor a region.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "identifier": "com.pubnub.test",
    "proximity_uuid": "0cf052c2-97ca-407c-84f8-b62aac4e9020",
    "major": 6
}))]
pub struct StartMonitoringRequest {
    /// Region identifier. Letters, digits, '.', '_' or '-'.
    #[schema(example = "com.pubnub.test", min_length = 1, max_length = 128)]
    pub identifier: String,

    /// Proximity UUID to match.
    pub proximity_uuid: Uuid,

    /// Major value to match. Omit to match any.
    #[serde(default)]
    pub major: Option<u16>,

    /// Minor value to match. Requires `major`.
    #[serde(default)]
    pub minor: Option<u16>,
}

/// Ranging subscription change caused by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RangingAction {
    /// Ranging was started.
    Started,
    /// Ranging was stopped.
    Stopped,
}

/// Result of a region event.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "region_id": "com.pubnub.test",
    "from": "entered",
    "to": "ranging",
    "changed": true,
    "ranging": "started"
}))]
pub struct TransitionResponse {
    /// Region the event concerned.
    #[schema(example = "com.pubnub.test")]
    pub region_id: String,

    /// State before the event.
    pub from: RegionTrackingState,

    /// State after the event.
    pub to: RegionTrackingState,

    /// Whether the state changed. Events that do not apply are ignored.
    pub changed: bool,

    /// Ranging subscription change, if any.
    #[schema(nullable)]
    pub ranging: Option<RangingAction>,
}

impl From<Transition> for TransitionResponse {
    fn from(transition: Transition) -> Self {
        let changed = transition.is_change();
        Self {
            region_id: transition.region_id,
            from: transition.from,
            to: transition.to,
            changed,
            ranging: transition.command.map(|command| match command {
                RangingCommand::Start(_) => RangingAction::Started,
                RangingCommand::Stop(_) => RangingAction::Stopped,
            }),
        }
    }
}

/// Request body for reporting a monitoring failure.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({ "reason": "bluetooth-off" }))]
pub struct MonitoringFailureRequest {
    /// Failure reason reported by the sensor.
    #[schema(example = "bluetooth-off", min_length = 1)]
    pub reason: String,
}

/// Current classification of a region.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "region_id": "com.pubnub.test",
    "state": "ranging",
    "classification": { "tier": "immediate", "distance_m": 0.25 },
    "smoothed_rssi": -47.0,
    "published_tier": "immediate"
}))]
pub struct ClassificationResponse {
    /// Region identifier.
    #[schema(example = "com.pubnub.test")]
    pub region_id: String,

    /// Current tracking state.
    pub state: RegionTrackingState,

    /// Classification of the current window, before hysteresis.
    pub classification: ProximityClassification,

    /// Median RSSI of the current window.
    #[schema(nullable, example = json!(-47.0))]
    pub smoothed_rssi: Option<f64>,

    /// Last tier published to the consumer.
    #[schema(nullable)]
    pub published_tier: Option<ProximityTier>,
}

// ============================================================================
// Handlers
// ============================================================================

/// List monitored regions.
#[utoipa::path(
    get,
    path = "/api/regions",
    tag = "regions",
    operation_id = "listRegions",
    summary = "List monitored regions",
    description = "Returns every monitored region with its tracking state. \
        Unmonitored regions are not listed.",
    responses(
        (status = 200, description = "Regions retrieved", body = RegionsResponse)
    )
)]
pub async fn list_regions(State(state): State<SharedState>) -> Json<RegionsResponse> {
    let state_guard = state.read().await;
    let engine = &state_guard.engine;

    let regions: Vec<RegionResponse> = engine
        .regions()
        .map(|snapshot| RegionResponse::from_snapshot(snapshot, engine))
        .collect();

    Json(RegionsResponse {
        total: regions.len(),
        regions,
    })
}

/// Start monitoring a region.
#[utoipa::path(
    post,
    path = "/api/regions",
    tag = "regions",
    operation_id = "startMonitoring",
    summary = "Start monitoring a region",
    description = "Begins monitoring a beacon region. The region enters the `entered` \
        state and waits for a region entry before ranging starts. Starting an already \
        monitored region with the same identity is a no-op.",
    request_body = StartMonitoringRequest,
    responses(
        (status = 200, description = "Monitoring started", body = TransitionResponse),
        (status = 400, description = "Invalid region definition"),
        (status = 409, description = "Identifier already monitored with a different identity")
    )
)]
pub async fn start_monitoring(
    State(state): State<SharedState>,
    Json(request): Json<StartMonitoringRequest>,
) -> ApiResult<Json<TransitionResponse>> {
    let identity = RegionIdentity::partial(request.proximity_uuid, request.major, request.minor)?;
    let region = Region::new(identity, request.identifier)?;

    let mut state_guard = state.write().await;
    if let Some(existing) = state_guard.engine.region(&region.identifier) {
        if existing.region != region {
            return Err(ApiError::Conflict {
                error_code: "region_identity_conflict".to_string(),
                message: format!(
                    "Region '{}' is already monitored with a different identity",
                    region.identifier
                ),
                region_id: Some(region.identifier),
            });
        }
    }

    Ok(Json(state_guard.engine.start_monitoring(region).into()))
}

/// Get a monitored region.
#[utoipa::path(
    get,
    path = "/api/regions/{id}",
    tag = "regions",
    operation_id = "getRegion",
    summary = "Get a monitored region",
    description = "Returns the tracking state of a single monitored region.",
    params(("id" = String, Path, description = "Region identifier")),
    responses(
        (status = 200, description = "Region retrieved", body = RegionResponse),
        (status = 404, description = "Region is not monitored")
    )
)]
pub async fn get_region(
    State(state): State<SharedState>,
    Path(region_id): Path<String>,
) -> ApiResult<Json<RegionResponse>> {
    let state_guard = state.read().await;
    let engine = &state_guard.engine;

    engine
        .region(&region_id)
        .map(|snapshot| Json(RegionResponse::from_snapshot(snapshot, engine)))
        .ok_or_else(|| ApiError::region_not_found(&region_id))
}

/// Stop monitoring a region.
#[utoipa::path(
    delete,
    path = "/api/regions/{id}",
    tag = "regions",
    operation_id = "stopMonitoring",
    summary = "Stop monitoring a region",
    description = "Stops monitoring and destroys all state for the region. Samples \
        for the region are rejected from now on. Stopping an unmonitored region is a no-op.",
    params(("id" = String, Path, description = "Region identifier")),
    responses(
        (status = 200, description = "Monitoring stopped", body = TransitionResponse)
    )
)]
pub async fn stop_monitoring(
    State(state): State<SharedState>,
    Path(region_id): Path<String>,
) -> Json<TransitionResponse> {
    let mut state_guard = state.write().await;
    Json(state_guard.engine.stop_monitoring(&region_id).into())
}

/// Report a region entry.
#[utoipa::path(
    post,
    path = "/api/regions/{id}/enter",
    tag = "regions",
    operation_id = "regionEntered",
    summary = "Report a region entry",
    description = "The sensor detected the region's beacons. Ranging starts when the \
        region is `entered` or `exited`; otherwise the event is ignored.",
    params(("id" = String, Path, description = "Region identifier")),
    responses(
        (status = 200, description = "Event applied", body = TransitionResponse)
    )
)]
pub async fn region_entered(
    State(state): State<SharedState>,
    Path(region_id): Path<String>,
) -> Json<TransitionResponse> {
    let mut state_guard = state.write().await;
    Json(state_guard.engine.region_entry_detected(&region_id).into())
}

/// Report a region exit.
#[utoipa::path(
    post,
    path = "/api/regions/{id}/exit",
    tag = "regions",
    operation_id = "regionExited",
    summary = "Report a region exit",
    description = "The sensor lost the region's beacons. Ranging stops, the sample \
        window is discarded and an `unknown` classification is published. Exits \
        outside the `ranging` state are ignored.",
    params(("id" = String, Path, description = "Region identifier")),
    responses(
        (status = 200, description = "Event applied", body = TransitionResponse)
    )
)]
pub async fn region_exited(
    State(state): State<SharedState>,
    Path(region_id): Path<String>,
) -> Json<TransitionResponse> {
    let mut state_guard = state.write().await;
    Json(state_guard.engine.region_exit_detected(&region_id).into())
}

/// Report a monitoring failure.
#[utoipa::path(
    post,
    path = "/api/regions/{id}/fail",
    tag = "regions",
    operation_id = "monitoringFailed",
    summary = "Report a monitoring failure",
    description = "The sensor could not monitor the region. The region is reset to \
        `unmonitored` and a `monitoring_failed` event is delivered to the consumer. \
        Monitoring may be started again.",
    params(("id" = String, Path, description = "Region identifier")),
    request_body = MonitoringFailureRequest,
    responses(
        (status = 200, description = "Failure recorded", body = TransitionResponse),
        (status = 400, description = "Empty failure reason")
    )
)]
pub async fn monitoring_failed(
    State(state): State<SharedState>,
    Path(region_id): Path<String>,
    Json(request): Json<MonitoringFailureRequest>,
) -> ApiResult<Json<TransitionResponse>> {
    let reason = request.reason.trim();
    if reason.is_empty() {
        return Err(ApiError::BadRequest {
            error_code: "empty_failure_reason".to_string(),
            message: "A failure reason is required".to_string(),
        });
    }

    let mut state_guard = state.write().await;
    Ok(Json(
        state_guard
            .engine
            .monitoring_did_fail(&region_id, reason)
            .into(),
    ))
}

/// Get the current classification of a region.
#[utoipa::path(
    get,
    path = "/api/regions/{id}/classification",
    tag = "proximity",
    operation_id = "getClassification",
    summary = "Get a region's proximity classification",
    description = "Classifies the region's current sample window. This is the raw \
        smoothed classification; `published_tier` is what the consumer last received \
        after hysteresis.",
    params(("id" = String, Path, description = "Region identifier")),
    responses(
        (status = 200, description = "Classification computed", body = ClassificationResponse),
        (status = 404, description = "Region is not monitored")
    )
)]
pub async fn get_classification(
    State(state): State<SharedState>,
    Path(region_id): Path<String>,
) -> ApiResult<Json<ClassificationResponse>> {
    let state_guard = state.read().await;
    let engine = &state_guard.engine;

    let snapshot = engine
        .region(&region_id)
        .ok_or_else(|| ApiError::region_not_found(&region_id))?;

    Ok(Json(ClassificationResponse {
        state: snapshot.state,
        classification: engine.classify(&region_id),
        smoothed_rssi: engine.smoothed_rssi(&region_id),
        published_tier: engine.published_tier(&region_id),
        region_id,
    }))
}
